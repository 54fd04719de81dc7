// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use tracing::{info, warn};

use freja_config::EngineConfig;
use freja_form::FieldType;
use freja_model::{Message, ModelProvider};

use crate::action::AskKind;
use crate::answer::AnswerValue;
use crate::llm::{call_with_guards, GuardContext};
use crate::payload::LlmPayload;
use crate::prompts;
use crate::session::{HistoryEntry, Session, TurnInput};
use crate::validate::validate_answer_for_ask;

/// Entered exactly once, on the first real user message: parse as many
/// field values as possible out of the free-text description.
///
/// A `multi_answer` result merges validated answers and chains to the
/// conversation node for the next question; a direct action chains to
/// finalize; a failed call falls back to conversation.
pub(crate) async fn run(
    session: &mut Session,
    input: &TurnInput,
    provider: &dyn ModelProvider,
    config: &EngineConfig,
) {
    session.initial_extraction_done = true;
    session.user_message_added = true;
    if !input.user_message.trim().is_empty() {
        session.history.push(HistoryEntry::user(input.user_message.clone()));
    }

    let context = prompts::form_context(&session.form, config);
    let mut messages = vec![
        Message::system(prompts::extraction_prompt(&context)),
        Message::user(input.user_message.clone()),
    ];

    let parsed = {
        let ctx = GuardContext {
            answers: &session.answers,
            required_fields: &session.required_fields,
            initial_extraction_done: true,
            allow_answered_field_update: false,
            reask_field_id: None,
            recent_assistant_texts: Vec::new(),
        };
        call_with_guards(provider, &mut messages, &ctx, config.max_llm_attempts).await
    };

    match parsed {
        Some(LlmPayload::MultiAnswer { answers, message }) => {
            for (field_id, value) in &answers {
                let Some(field_type) = session.field_types.get(field_id).copied() else {
                    warn!(field_id = %field_id, "extraction returned a field not in the form, dropping");
                    continue;
                };
                if let (FieldType::Date | FieldType::Datetime, Some(text)) =
                    (field_type, value.as_str())
                {
                    let kind = AskKind::for_field_type(field_type);
                    if let Err(reason) = validate_answer_for_ask(kind, text) {
                        warn!(field_id = %field_id, %reason, "extraction rejected value");
                        continue;
                    }
                }
                session.store_answer(field_id, AnswerValue::from_json(value));
            }
            info!(
                extracted = session.answers.len(),
                "bulk extraction merged answers"
            );
            if let Some(msg) = message {
                if !msg.trim().is_empty() {
                    session.history.push(HistoryEntry::assistant(msg));
                }
            }
            // No action yet — conversation picks the next question.
        }
        Some(payload @ LlmPayload::Act(_)) => {
            // Direct action (e.g. TOOL_CALL) — finalize post-processes it.
            session.parsed_llm_response = Some(payload);
        }
        None => {
            // Extraction failed — conversation is the fallback.
        }
    }
}
