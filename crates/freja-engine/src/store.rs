// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! In-memory session registry.
//!
//! Sessions are created on the first turn and expired after an idle
//! timeout.  This store is transport-side plumbing: it mints ids and keeps
//! snapshots between turns.  Restart durability is out of scope — put a
//! real store behind the same surface if you need one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

use freja_config::SessionConfig;

use crate::session::Session;

struct Stored {
    session: Session,
    last_access: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Stored>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_secs))
    }

    /// Register a session and mint its id.
    pub fn insert(&self, session: Session) -> String {
        let id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(
            id.clone(),
            Stored { session, last_access: Instant::now() },
        );
        debug!(session_id = %id, "session created");
        id
    }

    /// Fetch a session snapshot by id.
    ///
    /// Returns `None` for unknown or expired ids; expired sessions are
    /// removed on access.
    pub fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let stored = sessions.get_mut(id)?;
        if stored.last_access.elapsed() > self.timeout {
            sessions.remove(id);
            debug!(session_id = %id, "session expired on access");
            return None;
        }
        stored.last_access = Instant::now();
        Some(stored.session.clone())
    }

    /// Persist the new snapshot for an existing session.
    /// Returns `false` when the id is unknown (or already expired).
    pub fn save(&self, id: &str, session: Session) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(id) {
            Some(stored) => {
                stored.session = session;
                stored.last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Delete a session.  Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions.lock().unwrap().remove(id).is_some()
    }

    /// Remove all expired sessions, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, stored| stored.last_access.elapsed() <= self.timeout);
        before - sessions.len()
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use freja_form::FormDefinition;

    fn session() -> Session {
        Session::new(
            FormDefinition::parse(
                "---\ntitle: T\nfields:\n  - id: a\n    type: text\n    required: true\n---\nbody",
            )
            .unwrap(),
        )
    }

    #[test]
    fn insert_mints_unique_ids() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = store.insert(session());
        let b = store.insert(session());
        assert_ne!(a, b);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn get_returns_stored_snapshot() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(session());
        assert!(store.get(&id).is_some());
        assert!(store.get("unknown").is_none());
    }

    #[test]
    fn save_replaces_the_snapshot() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(session());
        let mut updated = store.get(&id).unwrap();
        updated.store_answer("a", "x".into());
        assert!(store.save(&id, updated));
        assert_eq!(store.get(&id).unwrap().answers["a"].as_text(), Some("x"));
    }

    #[test]
    fn save_unknown_id_is_rejected() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(!store.save("nope", session()));
    }

    #[test]
    fn expired_sessions_vanish_on_access() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.insert(session());
        assert!(store.get(&id).is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn cleanup_sweeps_expired_sessions() {
        let store = SessionStore::new(Duration::ZERO);
        store.insert(session());
        store.insert(session());
        assert_eq!(store.cleanup_expired(), 2);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn remove_reports_existence() {
        let store = SessionStore::new(Duration::from_secs(60));
        let id = store.insert(session());
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
    }
}
