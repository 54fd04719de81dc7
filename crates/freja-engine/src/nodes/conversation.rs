// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::warn;

use freja_config::EngineConfig;
use freja_model::{Message, ModelProvider};

use crate::action::Action;
use crate::llm::{call_with_guards, GuardContext};
use crate::prompts;
use crate::session::{HistoryEntry, HistoryRole, Session, TurnInput};

/// Fallback text when the model fails the whole retry budget.
pub(crate) const FALLBACK_TEXT: &str =
    "Sorry, I had trouble understanding that. Could you try again in one short sentence?";

/// How many recent assistant messages feed the verbatim re-ask guard.
const REASK_MEMORY: usize = 4;

/// Run a conversation turn: compose the system prompt from the current
/// session, send the recent history, and obtain the next action through the
/// guarded caller.
pub(crate) async fn run(
    session: &mut Session,
    input: &TurnInput,
    provider: &dyn ModelProvider,
    config: &EngineConfig,
) {
    // Add the user message to history if no prior node already has.
    if !session.user_message_added && !input.user_message.trim().is_empty() {
        session.history.push(HistoryEntry::user(input.user_message.clone()));
        session.user_message_added = true;
    }

    let context = prompts::form_context(&session.form, config);
    let system = prompts::conversation_prompt(&context, &session.answers, &session.required_fields);

    let mut messages = vec![Message::system(system)];
    let start = session
        .history
        .len()
        .saturating_sub(config.max_history_messages);
    for entry in &session.history[start..] {
        match entry.role {
            // Directives ride the user channel.
            HistoryRole::User | HistoryRole::Directive => {
                messages.push(Message::user(entry.content.clone()));
            }
            HistoryRole::Assistant => {
                messages.push(Message::assistant(entry.content.clone()));
            }
        }
    }

    let parsed = {
        let recent_assistant_texts: Vec<String> = session
            .history
            .iter()
            .rev()
            .filter(|e| e.role == HistoryRole::Assistant)
            .take(REASK_MEMORY)
            .map(|e| e.content.clone())
            .collect();
        let ctx = GuardContext {
            answers: &session.answers,
            required_fields: &session.required_fields,
            initial_extraction_done: session.initial_extraction_done,
            allow_answered_field_update: session.allow_answered_field_update,
            reask_field_id: session.reask_field_id.as_deref(),
            recent_assistant_texts,
        };
        call_with_guards(provider, &mut messages, &ctx, config.max_llm_attempts).await
    };

    match parsed {
        Some(payload) => {
            session.parsed_llm_response = Some(payload);
        }
        None => {
            // Model completely failed — end the turn with the fallback.
            // Pending fields stay untouched so the user can simply retry.
            warn!("model failed the retry budget, emitting fallback message");
            session.history.push(HistoryEntry::assistant(FALLBACK_TEXT));
            session.action = Some(Action::message(FALLBACK_TEXT));
            session.parsed_llm_response = None;
        }
    }
}
