// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;

use crate::{CompletionRequest, ModelProvider};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        let reply = req.last_user_text().unwrap_or("[no input]");
        Ok(format!("MOCK: {reply}"))
    }
}

/// A pre-scripted mock provider.  Each call to `complete` pops the next
/// response from the front of the queue.  This lets tests specify the exact
/// text the model "returns" on each call — including malformed JSON and
/// contract violations — without network access.
///
/// Every request is recorded so tests can inspect the composed prompts and
/// the corrective messages appended by the retry loop.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<String>>>,
    /// All `CompletionRequest`s seen by this provider, in call order.
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    /// Build a provider from an ordered list of canned responses.
    pub fn new<S: Into<String>>(scripts: Vec<S>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().map(Into::into).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The request made by the `n`-th completion call (0-based).
    pub fn request(&self, n: usize) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().get(n).cloned()
    }

    /// The most recent completion request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Remaining unconsumed scripts.
    pub fn remaining(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(req);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Default fallback when all scripts are consumed
            Ok("[no more scripts]".into())
        } else {
            Ok(scripts.remove(0))
        }
    }
}

/// A provider whose every call fails.  Exercises transport-failure fallbacks.
pub struct FailingProvider;

#[async_trait]
impl ModelProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing-mock"
    }
    fn model_name(&self) -> &str {
        "failing-mock-model"
    }

    async fn complete(&self, _req: CompletionRequest) -> anyhow::Result<String> {
        bail!("simulated transport failure")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
