// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Post-processing of the model's chosen action.
//!
//! Resolves held text answers, commits explicit values, tracks the new
//! pending field, backfills FORM_COMPLETE data, records the assistant
//! message, and applies the multi-step checkpoint override.

use tracing::{info, warn};

use crate::action::Action;
use crate::answer::AnswerValue;
use crate::session::{HistoryEntry, Session};
use crate::payload::LlmPayload;

pub(crate) fn run(session: &mut Session) {
    let Some(payload) = session.parsed_llm_response.take() else {
        return;
    };
    let mut action = match payload {
        LlmPayload::Act(action) => action,
        // multi_answer is consumed by the extraction node and never routed
        // here; dropping it ends the turn on the engine fallback.
        LlmPayload::MultiAnswer { .. } => return,
    };

    // ── Resolve the held text answer (model contextual validation) ───────────
    // A re-ask of the same field means the model rejected the answer;
    // anything else means it moved on, so the held value is committed.
    if let (Some(value), Some(field_id)) = (
        session.pending_text_value.take(),
        session.pending_text_field_id.take(),
    ) {
        let is_reask = action.is_ask() && action.field_id() == Some(field_id.as_str());
        if is_reask {
            info!(field_id = %field_id, "model rejected held text answer, discarding");
        } else {
            info!(field_id = %field_id, "model accepted held text answer");
            session.store_answer(&field_id, AnswerValue::Text(value));
        }
    }

    // ── Commit an explicit value carried on the action ───────────────────────
    if let (Some(field_id), Some(value)) = (action.field_id(), action.value()) {
        if session.field_types.contains_key(field_id) {
            session.store_answer(field_id, AnswerValue::from_json(value));
        } else {
            warn!(field_id, "ignoring value for a field not in the form");
        }
    }

    // ── FORM_COMPLETE: merge its data and backfill from answers ──────────────
    if let Action::FormComplete { data, .. } = &mut action {
        for (field_id, value) in data.iter() {
            if session.field_types.contains_key(field_id) {
                session
                    .answers
                    .insert(field_id.clone(), AnswerValue::from_json(value));
            } else {
                warn!(field_id = %field_id, "FORM_COMPLETE carried a field not in the form, dropping");
            }
        }
        if data.is_empty() {
            *data = session.answers_json();
        }
    }

    // ── Track the new pending field / tool ───────────────────────────────────
    if let (Some(kind), Some(field_id)) = (action.ask_kind(), action.field_id()) {
        if session.field_types.contains_key(field_id) {
            info!(field_id, kind = %kind, "now asking field");
            session.pending_field_id = Some(field_id.to_string());
            session.pending_action_type = Some(kind);
        } else {
            warn!(field_id, "model asked a field not in the form, not tracking");
            session.clear_pending_ask();
        }
        session.pending_tool_name = None;
    } else if let Action::ToolCall { tool_name, .. } = &action {
        info!(tool_name = %tool_name, "pending tool call");
        session.pending_tool_name = Some(tool_name.clone());
        session.clear_pending_ask();
    } else {
        session.clear_pending_ask();
        session.pending_tool_name = None;
    }

    // ── Step checkpoint (human-in-the-loop) ──────────────────────────────────
    // In multi-step forms, once the current step's required fields are all
    // answered, pause and ask the user to confirm before moving on.  Applied
    // here, after the model picked its action, because that action may
    // already be an ASK_ for the next step's first field.  Suppressed during
    // an edit turn: the step fields are still "complete" with the old values
    // and re-summarizing would swallow the edit re-ask.
    let step = session.current_step;
    let step_required = session
        .required_by_step
        .get(&step)
        .cloned()
        .unwrap_or_default();
    let is_multi_step = !session.required_by_step.is_empty() && session.max_step > 1;
    let step_complete = !step_required.is_empty()
        && step_required.iter().all(|id| session.answers.contains_key(id));
    let is_last_step = step >= session.max_step;
    let editing = session.allow_answered_field_update;

    if is_multi_step && step_complete && !session.completed_steps.contains(&step) && !is_last_step && !editing {
        info!(step, "step complete, requesting confirmation");
        let summary = build_step_summary(session, step, &step_required);
        session.clear_pending_ask();
        session.pending_tool_name = None;
        session.awaiting_step_confirmation = true;
        session.history.push(HistoryEntry::assistant(summary.clone()));
        session.action = Some(Action::message(summary));
        return;
    }

    // ── Record the assistant message and emit the action ─────────────────────
    if let Some(msg) = action.message_text() {
        if !msg.trim().is_empty() {
            session.history.push(HistoryEntry::assistant(msg.to_string()));
        }
    }
    session.action = Some(action);
}

fn build_step_summary(session: &Session, step: u32, field_ids: &[String]) -> String {
    let mut lines = vec![format!("Step {step} is complete. Here is a quick summary:")];
    for field_id in field_ids {
        let label = session.prompt_for(field_id);
        let value = session
            .answers
            .get(field_id)
            .map(AnswerValue::display_text)
            .unwrap_or_default();
        lines.push(format!("- {label}: {value}"));
    }
    lines.push(
        "Please confirm to continue to the next step, \
         or tell me what you want to change in this step."
            .to_string(),
    );
    lines.join("\n")
}
