// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use freja_form::{FieldType, FormDefinition};

use crate::action::{Action, AskKind};
use crate::answer::AnswerValue;
use crate::payload::LlmPayload;

/// Role of a conversation history entry.
///
/// `Directive` entries are engine-generated guidance (`[SYSTEM: …]`,
/// serialized tool results).  They are stored with their own role but ride
/// the user channel when the model message list is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
    Directive,
}

/// One entry in the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: HistoryRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: HistoryRole::Assistant, content: content.into() }
    }

    pub fn directive(content: impl Into<String>) -> Self {
        Self { role: HistoryRole::Directive, content: content.into() }
    }
}

/// A tool result handed back by the host application.  The engine never
/// executes tools; it only consumes their results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub result: Value,
}

/// Input for one conversation turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub user_message: String,
    pub tool_results: Vec<ToolResult>,
}

impl TurnInput {
    /// A plain user message turn.
    pub fn message(text: impl Into<String>) -> Self {
        Self { user_message: text.into(), tool_results: Vec::new() }
    }

    /// A tool-results turn (no user message).
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self { user_message: String::new(), tool_results: results }
    }
}

/// The complete state of one form-filling conversation.
///
/// A session mutates only inside a turn: the engine clones the current
/// snapshot, drives the node chain on the clone, and returns it as the new
/// snapshot.  Concurrent turns for the same session are the transport's
/// responsibility to prevent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Immutable over the session's lifetime; shared between snapshots.
    pub form: Arc<FormDefinition>,

    // ── Accumulated state ────────────────────────────────────────────────────
    pub answers: BTreeMap<String, AnswerValue>,
    pub history: Vec<HistoryEntry>,

    // ── Derived views (computed once at creation) ────────────────────────────
    pub required_fields: Vec<String>,
    pub required_by_step: BTreeMap<u32, Vec<String>>,
    pub field_types: BTreeMap<String, FieldType>,
    pub prompt_map: BTreeMap<String, String>,

    // ── Step progress ────────────────────────────────────────────────────────
    pub current_step: u32,
    pub max_step: u32,
    pub completed_steps: BTreeSet<u32>,

    // ── Phase tracking ───────────────────────────────────────────────────────
    pub initial_extraction_done: bool,
    pub awaiting_step_confirmation: bool,
    pub allow_answered_field_update: bool,
    /// Field whose answer the next user message resolves; set iff the
    /// previous turn emitted an ASK_ action for it.
    pub pending_field_id: Option<String>,
    pub pending_action_type: Option<AskKind>,
    /// A text answer held for the model's contextual ruling; resolved in
    /// finalize, never elsewhere.
    pub pending_text_value: Option<String>,
    pub pending_text_field_id: Option<String>,
    /// Last tool requested, awaiting results from the host.
    pub pending_tool_name: Option<String>,

    // ── Intra-turn scratch (reset at every turn start) ───────────────────────
    #[serde(skip)]
    pub(crate) action: Option<Action>,
    #[serde(skip)]
    pub(crate) parsed_llm_response: Option<LlmPayload>,
    #[serde(skip)]
    pub(crate) user_message_added: bool,
    #[serde(skip)]
    pub(crate) skip_conversation_turn: bool,
    /// Set by the validation node when a pending field failed its format
    /// check this turn; arms the verbatim re-ask guard.
    #[serde(skip)]
    pub(crate) reask_field_id: Option<String>,
}

impl Session {
    /// Create a session for a parsed form definition, materializing the
    /// derived views.
    pub fn new(form: FormDefinition) -> Self {
        let required_fields = form.required_field_ids();
        let required_by_step = form.required_by_step();
        let field_types = form.field_types();
        let prompt_map = form.prompt_map();
        let max_step = form.max_step();
        Self {
            form: Arc::new(form),
            answers: BTreeMap::new(),
            history: Vec::new(),
            required_fields,
            required_by_step,
            field_types,
            prompt_map,
            current_step: 1,
            max_step,
            completed_steps: BTreeSet::new(),
            initial_extraction_done: false,
            awaiting_step_confirmation: false,
            allow_answered_field_update: false,
            pending_field_id: None,
            pending_action_type: None,
            pending_text_value: None,
            pending_text_field_id: None,
            pending_tool_name: None,
            action: None,
            parsed_llm_response: None,
            user_message_added: false,
            skip_conversation_turn: false,
            reask_field_id: None,
        }
    }

    /// Reset the ephemeral intra-turn fields at the start of a turn.
    pub(crate) fn begin_turn(&mut self) {
        self.action = None;
        self.parsed_llm_response = None;
        self.user_message_added = false;
        self.skip_conversation_turn = false;
        self.allow_answered_field_update = false;
        self.reask_field_id = None;
    }

    /// Required field ids not yet answered, in definition order.
    pub fn missing_required(&self) -> Vec<&str> {
        self.required_fields
            .iter()
            .filter(|id| !self.answers.contains_key(*id))
            .map(String::as_str)
            .collect()
    }

    /// The next required field to collect, if any.
    pub fn next_required(&self) -> Option<&str> {
        self.missing_required().into_iter().next()
    }

    /// True once every required field has a value.
    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Store an answer.  The caller guarantees the id belongs to the form.
    pub(crate) fn store_answer(&mut self, field_id: impl Into<String>, value: AnswerValue) {
        self.answers.insert(field_id.into(), value);
    }

    /// Clear the pending-ask tracking fields.
    pub(crate) fn clear_pending_ask(&mut self) {
        self.pending_field_id = None;
        self.pending_action_type = None;
    }

    /// The answers map as a JSON object, for FORM_COMPLETE payloads.
    pub fn answers_json(&self) -> BTreeMap<String, Value> {
        self.answers
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Human prompt for a field, falling back to a label derived from the id.
    pub fn prompt_for(&self, field_id: &str) -> String {
        self.prompt_map
            .get(field_id)
            .cloned()
            .unwrap_or_else(|| id_to_label(field_id))
    }
}

/// Convert camelCase/snake_case ids to readable labels.
pub(crate) fn id_to_label(field_id: &str) -> String {
    let spaced = field_id.replace('_', " ");
    let mut out = String::with_capacity(spaced.len() + 4);
    let mut prev_lower = false;
    for c in spaced.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    let mut chars = out.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormDefinition {
        FormDefinition::parse(
            "---\ntitle: T\nfields:\n  - id: a\n    type: text\n    required: true\n    prompt: \"Ask a\"\n  - id: b\n    type: date\n    required: true\n    step: 2\n  - id: c\n    type: text\n---\nbody",
        )
        .unwrap()
    }

    #[test]
    fn new_session_materializes_views() {
        let s = Session::new(form());
        assert_eq!(s.required_fields, vec!["a", "b"]);
        assert_eq!(s.required_by_step[&1], vec!["a"]);
        assert_eq!(s.required_by_step[&2], vec!["b"]);
        assert_eq!(s.max_step, 2);
        assert_eq!(s.current_step, 1);
        assert_eq!(s.field_types["b"], FieldType::Date);
    }

    #[test]
    fn missing_required_tracks_answers() {
        let mut s = Session::new(form());
        assert_eq!(s.missing_required(), vec!["a", "b"]);
        s.store_answer("a", "x".into());
        assert_eq!(s.missing_required(), vec!["b"]);
        assert_eq!(s.next_required(), Some("b"));
        assert!(!s.is_complete());
        s.store_answer("b", "2026-01-15".into());
        assert!(s.is_complete());
    }

    #[test]
    fn begin_turn_clears_scratch_fields() {
        let mut s = Session::new(form());
        s.action = Some(Action::message("x"));
        s.user_message_added = true;
        s.skip_conversation_turn = true;
        s.allow_answered_field_update = true;
        s.reask_field_id = Some("a".into());
        s.begin_turn();
        assert!(s.action.is_none());
        assert!(!s.user_message_added);
        assert!(!s.skip_conversation_turn);
        assert!(!s.allow_answered_field_update);
        assert!(s.reask_field_id.is_none());
    }

    #[test]
    fn prompt_for_prefers_defined_prompt() {
        let s = Session::new(form());
        assert_eq!(s.prompt_for("a"), "Ask a");
    }

    #[test]
    fn prompt_for_derives_label_from_id() {
        let s = Session::new(form());
        assert_eq!(s.prompt_for("injuryDate"), "Injury date");
        assert_eq!(s.prompt_for("leave_type"), "Leave type");
    }

    #[test]
    fn session_serializes_without_scratch_fields() {
        let mut s = Session::new(form());
        s.store_answer("a", "hello".into());
        s.history.push(HistoryEntry::assistant("hi"));
        s.action = Some(Action::message("ephemeral"));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("ephemeral"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.answers["a"].as_text(), Some("hello"));
        assert_eq!(back.history, s.history);
        assert!(back.action.is_none());
    }

    #[test]
    fn turn_input_constructors() {
        let t = TurnInput::message("hi");
        assert_eq!(t.user_message, "hi");
        assert!(t.tool_results.is_empty());
        let t = TurnInput::tool_results(vec![ToolResult {
            tool_name: "t".into(),
            result: serde_json::json!({}),
        }]);
        assert!(t.user_message.is_empty());
        assert_eq!(t.tool_results.len(), 1);
    }
}
