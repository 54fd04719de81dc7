// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use tracing::debug;

use freja_config::EngineConfig;
use freja_form::FormDefinition;
use freja_model::ModelProvider;

use crate::action::Action;
use crate::error::EngineError;
use crate::nodes;
use crate::nodes::conversation::FALLBACK_TEXT;
use crate::router::{route_entry, Node};
use crate::session::{Session, TurnInput};

/// The conversation engine.  Owns the model handle and the engine knobs;
/// session state lives outside and is passed through [`Engine::step`].
///
/// The engine is shared freely across sessions.  A single session must not
/// have two in-flight turns — serializing turns per session id is the
/// transport's responsibility.
pub struct Engine {
    provider: Arc<dyn ModelProvider>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(provider: Arc<dyn ModelProvider>, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    /// Parse a form definition and materialize an initial session.
    ///
    /// Fails only on a malformed definition; the engine refuses to start a
    /// conversation it cannot account for.
    pub fn create_session(&self, form_definition: &str) -> Result<Session, EngineError> {
        let form = FormDefinition::parse(form_definition)?;
        Ok(Session::new(form))
    }

    /// Run one conversation turn.
    ///
    /// The current snapshot is cloned and the node chain runs on the clone,
    /// so a cancelled turn (dropped future) leaves the caller's session
    /// untouched and the new snapshot becomes visible atomically on return.
    /// Every branch yields an action; nothing escapes.
    pub async fn step(&self, session: &Session, input: TurnInput) -> (Action, Session) {
        let mut draft = session.clone();
        draft.begin_turn();

        let mut node = route_entry(&draft, &input);
        debug!(entry = ?node, "routing turn");
        loop {
            node = match node {
                Node::Greeting => {
                    nodes::greeting::run(&mut draft);
                    Node::End
                }
                Node::ToolHandler => {
                    nodes::tool_handler::run(&mut draft, &input);
                    Node::Conversation
                }
                Node::StepConfirmation => {
                    nodes::step_confirmation::run(&mut draft, &input);
                    if draft.skip_conversation_turn {
                        Node::End
                    } else {
                        Node::Conversation
                    }
                }
                Node::Validation => {
                    nodes::validation::run(&mut draft, &input);
                    Node::Conversation
                }
                Node::Extraction => {
                    nodes::extraction::run(&mut draft, &input, self.provider.as_ref(), &self.config)
                        .await;
                    if draft.parsed_llm_response.is_some() {
                        Node::Finalize
                    } else {
                        Node::Conversation
                    }
                }
                Node::Conversation => {
                    nodes::conversation::run(
                        &mut draft,
                        &input,
                        self.provider.as_ref(),
                        &self.config,
                    )
                    .await;
                    if draft.parsed_llm_response.is_some() {
                        Node::Finalize
                    } else {
                        Node::End
                    }
                }
                Node::Finalize => {
                    nodes::finalize::run(&mut draft);
                    Node::End
                }
                Node::End => break,
            };
        }

        let action = draft
            .action
            .take()
            .unwrap_or_else(|| Action::message(FALLBACK_TEXT));
        (action, draft)
    }
}
