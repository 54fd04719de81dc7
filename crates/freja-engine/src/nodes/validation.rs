// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Validation of user replies to pending ASK_ actions.
//!
//! Two strategies:
//! 1. Format validation (ASK_DATE, ASK_DATETIME): deterministic check
//!    before storing — reject immediately if the format is wrong.
//! 2. Context validation (ASK_TEXT): hold the answer and let the model
//!    judge whether it fits.  The model either accepts (moves to the next
//!    field) or rejects (re-asks the same field); finalize resolves it.

use tracing::{info, warn};

use crate::action::AskKind;
use crate::answer::AnswerValue;
use crate::session::{HistoryEntry, Session, TurnInput};
use crate::validate::validate_answer_for_ask;

pub(crate) fn run(session: &mut Session, input: &TurnInput) {
    let Some(field_id) = session.pending_field_id.clone() else {
        return;
    };
    let kind = session.pending_action_type.unwrap_or(AskKind::Text);
    let raw = input.user_message.trim().to_string();
    session.user_message_added = true;

    if kind == AskKind::Text {
        // Context validation path — don't store yet, the model decides.
        info!(field_id = %field_id, "holding text answer for model validation");
        session.history.push(HistoryEntry::user(input.user_message.clone()));
        session.history.push(HistoryEntry::directive(format!(
            "[SYSTEM: The user answered '{raw}' for field '{field_id}'. \
             VALIDATE this answer: Is it relevant and appropriate for the \
             question asked? Does it make sense in context? \
             If YES — proceed to the NEXT unanswered field. \
             If NO (gibberish, irrelevant, nonsensical, or clearly wrong \
             context) — re-ask the SAME field '{field_id}' using ASK_TEXT. \
             Politely tell the user why their answer doesn't fit and ask \
             again in a clearer way.]"
        )));
        session.pending_text_value = Some(raw);
        session.pending_text_field_id = Some(field_id);
        session.clear_pending_ask();
        return;
    }

    // Format validation path — deterministic check before storage.
    match validate_answer_for_ask(kind, &raw) {
        Ok(()) => {
            info!(field_id = %field_id, "auto-stored answer");
            session.store_answer(&field_id, AnswerValue::Text(raw));
            session.history.push(HistoryEntry::user(input.user_message.clone()));
            session.clear_pending_ask();
        }
        Err(reason) => {
            warn!(field_id = %field_id, kind = %kind, %reason, "answer failed validation");
            session.history.push(HistoryEntry::user(input.user_message.clone()));
            session.history.push(HistoryEntry::directive(format!(
                "[SYSTEM: The user's answer '{raw}' for field '{field_id}' is \
                 INVALID. {reason} You MUST re-ask this field using {kind} \
                 with field_id '{field_id}'. Tell the user their input was \
                 not valid and ask again.]"
            )));
            // The pending field is kept — the model must re-ask it.
            session.reask_field_id = Some(field_id);
        }
    }
}
