// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The human-in-the-loop checkpoint between steps.
//!
//! When a step's required fields are complete, finalize emits a summary and
//! arms `awaiting_step_confirmation`.  The user's next message lands here
//! and is classified as a confirmation, an edit request, or neither.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::info;

use freja_form::FieldType;

use crate::action::{Action, AskKind};
use crate::session::{HistoryEntry, Session, TurnInput};

const CONFIRM_WORDS: &[&str] = &[
    "yes", "ok", "okay", "confirm", "confirmed", "continue", "proceed",
    "looks good", "all good", "correct", "approved",
    "نعم", "ايوه", "ايوا", "تمام", "موافق", "اكمل", "استمر",
];

const EDIT_WORDS: &[&str] = &[
    "change", "update", "edit", "modify", "fix", "wrong", "not correct",
    "تعديل", "غير", "غيّر", "عدل", "صحح", "خطأ", "مو صحيح",
];

pub(crate) fn run(session: &mut Session, input: &TurnInput) {
    let user_message = input.user_message.trim().to_string();
    let text = user_message.to_lowercase();
    let step = session.current_step;

    session.user_message_added = true;
    session.history.push(HistoryEntry::user(user_message));

    if is_confirm(&text) {
        info!(step, "step confirmed");
        session.completed_steps.insert(step);
        session.awaiting_step_confirmation = false;
        session.allow_answered_field_update = false;
        session.clear_pending_ask();
        if step < session.max_step {
            session.current_step = step + 1;
        }
        // Lightweight directive so conversation naturally starts the next step.
        session.history.push(HistoryEntry::directive(format!(
            "[SYSTEM: The user confirmed Step {step}. Proceed to the next \
             step now. Ask the next required unanswered field.]"
        )));
        return;
    }

    if is_edit_request(&text) {
        info!(step, "edit requested before confirmation");
        session.awaiting_step_confirmation = false;
        session.allow_answered_field_update = true;
        session.clear_pending_ask();

        let step_fields = session
            .required_by_step
            .get(&step)
            .cloned()
            .unwrap_or_default();

        if let Some(field_id) = infer_requested_field(&text, &step_fields, &session.prompt_map) {
            let kind = edit_ask_kind(session.field_types.get(&field_id).copied());
            let prompt_text = session
                .prompt_map
                .get(&field_id)
                .cloned()
                .unwrap_or_else(|| format!("Please share the updated value for {field_id}."));
            let ask_message = format!("Sure, let's update that. {prompt_text}");
            session.action = Some(Action::ask(
                kind,
                &field_id,
                Some(prompt_text),
                Some(ask_message.clone()),
            ));
            session.pending_field_id = Some(field_id);
            session.pending_action_type = Some(kind);
            session.skip_conversation_turn = true;
            session.history.push(HistoryEntry::assistant(ask_message));
            return;
        }

        // Could not tell which field — hand the edit to the model.
        session.history.push(HistoryEntry::directive(format!(
            "[SYSTEM: The user requested changes before confirming Step {step}. \
             Step {step} fields: [{}]. Help them update the requested item. \
             Do NOT move to the next step yet. Once Step {step} is complete \
             again, provide a new summary and ask for confirmation.]",
            step_fields.join(", ")
        )));
        return;
    }

    // Unclear answer — keep waiting for an explicit confirm or edit request.
    let msg = format!(
        "Step {step} is ready. Please confirm to continue, \
         or tell me what you'd like to update in this step."
    );
    session.action = Some(Action::message(msg.clone()));
    session.allow_answered_field_update = false;
    session.history.push(HistoryEntry::assistant(msg));
    session.skip_conversation_turn = true;
}

fn is_confirm(text: &str) -> bool {
    CONFIRM_WORDS.iter().any(|token| has_token(text, token))
}

fn is_edit_request(text: &str) -> bool {
    EDIT_WORDS.iter().any(|token| has_token(text, token))
}

/// Short latin words match on word boundaries so "my" never matches "y";
/// longer tokens and non-ASCII variants use plain substring matching.
fn has_token(text: &str, token: &str) -> bool {
    if token.is_ascii() && token.chars().all(|c| c.is_ascii_alphabetic()) && token.len() <= 3 {
        let pattern = format!(r"\b{}\b", regex::escape(token));
        return Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false);
    }
    text.contains(token)
}

/// Best-effort inference of which field the user wants to change: the field
/// id as a substring, then significant words from its prompt label.
fn infer_requested_field(
    text: &str,
    step_fields: &[String],
    prompt_map: &BTreeMap<String, String>,
) -> Option<String> {
    for field_id in step_fields {
        if text.contains(&field_id.to_lowercase()) {
            return Some(field_id.clone());
        }
        if let Some(label) = prompt_map.get(field_id) {
            let label = label.to_lowercase();
            if important_words(&label).iter().any(|w| text.contains(w.as_str())) {
                return Some(field_id.clone());
            }
        }
    }
    None
}

/// Words of 4+ letters from a label, minus filler verbs.
fn important_words(label: &str) -> Vec<String> {
    let word = Regex::new(r"[a-zA-Z]{4,}").unwrap();
    word.find_iter(label)
        .map(|m| m.as_str().to_string())
        .filter(|w| !matches!(w.as_str(), "please" | "provide" | "share"))
        .collect()
}

/// ASK_ kind used for a direct edit re-ask.  Choice fields fall back to
/// text: their options may need a tool call the model must decide on.
fn edit_ask_kind(field_type: Option<FieldType>) -> AskKind {
    match field_type {
        Some(FieldType::Date) => AskKind::Date,
        Some(FieldType::Datetime) => AskKind::Datetime,
        Some(FieldType::Location) => AskKind::Location,
        _ => AskKind::Text,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_words_match() {
        assert!(is_confirm("yes"));
        assert!(is_confirm("ok, looks good"));
        assert!(is_confirm("تمام"));
    }

    #[test]
    fn short_tokens_need_word_boundaries() {
        // "ok" must not match inside "tokyo"
        assert!(!is_confirm("tokyo"));
        assert!(is_confirm("ok"));
        assert!(is_confirm("ok then"));
    }

    #[test]
    fn edit_words_match() {
        assert!(is_edit_request("i want to change the date"));
        assert!(is_edit_request("that's wrong"));
        assert!(!is_edit_request("yes"));
    }

    #[test]
    fn infer_by_field_id_substring() {
        let fields = vec!["startDate".to_string(), "reason".to_string()];
        let prompts = BTreeMap::new();
        assert_eq!(
            infer_requested_field("change the startdate please", &fields, &prompts),
            Some("startDate".to_string())
        );
    }

    #[test]
    fn infer_by_label_keyword() {
        let fields = vec!["est".to_string()];
        let mut prompts = BTreeMap::new();
        prompts.insert("est".to_string(), "Which establishment is it?".to_string());
        assert_eq!(
            infer_requested_field("the establishment is wrong", &fields, &prompts),
            Some("est".to_string())
        );
    }

    #[test]
    fn infer_returns_none_when_nothing_matches() {
        let fields = vec!["salary".to_string()];
        let prompts = BTreeMap::new();
        assert!(infer_requested_field("change something", &fields, &prompts).is_none());
    }

    #[test]
    fn edit_ask_kind_maps_types() {
        assert_eq!(edit_ask_kind(Some(FieldType::Date)), AskKind::Date);
        assert_eq!(edit_ask_kind(Some(FieldType::Dropdown)), AskKind::Text);
        assert_eq!(edit_ask_kind(None), AskKind::Text);
    }
}
