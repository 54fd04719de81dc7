// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Model invocation with JSON extraction and behavioural guards.
//!
//! Raw model output is never trusted: each turn runs a bounded retry loop
//! that extracts JSON, validates it against the closed payload set, and
//! applies behaviour guards.  Every violation appends a blunt corrective
//! message to the turn's scratch buffer and retries; exhaustion degrades to
//! the caller's fallback.  The corrective tone is deliberate — small models
//! need direct instructions.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use freja_model::{CompletionRequest, Message, ModelProvider};

use crate::action::Action;
use crate::answer::AnswerValue;
use crate::payload::{validate_payload, LlmPayload};

/// Corrective sent when model output is not valid JSON.
pub(crate) const JSON_RETRY_PROMPT: &str = "WRONG. Your response was NOT valid JSON. \
     You MUST respond with ONLY a JSON object like: \
     {\"action\": \"MESSAGE\", \"text\": \"hello\"} \
     NO explanations. NO markdown. NO plain text. ONLY JSON. Try again now.";

/// Marker used to limit the MESSAGE-during-filling retry to a single round.
const MESSAGE_RETRY_MARKER: &str = "Do NOT use MESSAGE to ask questions";

/// Session views the guards check a candidate payload against.
pub(crate) struct GuardContext<'a> {
    pub answers: &'a BTreeMap<String, AnswerValue>,
    pub required_fields: &'a [String],
    pub initial_extraction_done: bool,
    /// Loosens the answered-field guard for the current turn (edit subflow).
    pub allow_answered_field_update: bool,
    /// Field re-asked after a failed format validation this turn; arms the
    /// verbatim re-ask guard.
    pub reask_field_id: Option<&'a str>,
    /// Recent assistant messages, for verbatim re-ask detection.
    pub recent_assistant_texts: Vec<String>,
}

/// Extract a JSON object from model output.
///
/// Tries, in order: a direct parse, each fenced code block, and the widest
/// `{…}` substring.
pub fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }

    if trimmed.contains("```") {
        for part in trimmed.split("```") {
            let mut candidate = part.trim();
            candidate = candidate.strip_prefix("json").unwrap_or(candidate).trim();
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() {
                    return Some(value);
                }
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// Call the model and parse its JSON response, with retries and guards.
///
/// `messages` is the turn's scratch buffer: corrective messages are
/// appended to it between attempts, so callers pass a fresh sequence per
/// turn.  Returns `None` when the attempt budget is exhausted.
pub(crate) async fn call_with_guards(
    provider: &dyn ModelProvider,
    messages: &mut Vec<Message>,
    ctx: &GuardContext<'_>,
    max_attempts: u32,
) -> Option<LlmPayload> {
    for attempt in 1..=max_attempts {
        info!(attempt, max_attempts, messages = messages.len(), "calling model");
        let content = match provider
            .complete(CompletionRequest::new(messages.clone()))
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!(attempt, error = %e, "model call failed");
                continue;
            }
        };

        if content.is_empty() {
            warn!(attempt, "model returned empty output");
            messages.push(Message::system(JSON_RETRY_PROMPT));
            continue;
        }
        debug!(
            raw = %content.chars().take(500).collect::<String>(),
            "model raw response"
        );

        let Some(raw) = extract_json(&content) else {
            warn!(attempt, "model returned invalid JSON");
            messages.push(Message::system(JSON_RETRY_PROMPT));
            continue;
        };

        let payload = match validate_payload(&raw) {
            Ok(payload) => payload,
            Err(reason) => {
                warn!(attempt, %reason, "payload failed validation");
                messages.push(Message::system(format!(
                    "WRONG. {reason}. Respond with ONLY one valid JSON action object. Try again now."
                )));
                continue;
            }
        };

        if let Some(correction) = check_guards(&payload, ctx, messages) {
            messages.push(Message::system(correction));
            continue;
        }

        info!(kind = payload_kind(&payload), "model returned valid payload");
        return Some(payload);
    }

    error!(max_attempts, "all model attempts failed to produce a valid payload");
    None
}

fn payload_kind(payload: &LlmPayload) -> &'static str {
    match payload {
        LlmPayload::MultiAnswer { .. } => "multi_answer",
        LlmPayload::Act(action) => action.kind_str(),
    }
}

/// Apply the behaviour guards in order.  Returns the corrective message for
/// the first violation, or `None` when the payload is acceptable.
fn check_guards(
    payload: &LlmPayload,
    ctx: &GuardContext<'_>,
    messages: &[Message],
) -> Option<String> {
    let action = match payload {
        LlmPayload::Act(action) => action,
        LlmPayload::MultiAnswer { .. } => return None,
    };

    let answered = || {
        ctx.answers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let next_missing = || {
        ctx.required_fields
            .iter()
            .find(|id| !ctx.answers.contains_key(*id))
            .map(String::as_str)
    };

    // Re-ask of an already answered field — the model is circling instead of
    // moving forward.  Skipped while an edit subflow is active.
    if let Some(field_id) = action.field_id() {
        if ctx.answers.contains_key(field_id) && !ctx.allow_answered_field_update {
            warn!(field_id, "model re-asked an answered field");
            let next_hint = next_missing()
                .map(|next| format!(" The next unanswered required field is '{next}'."))
                .unwrap_or_default();
            return Some(format!(
                "WRONG. The field '{field_id}' is already answered. \
                 Already answered fields: [{}]. \
                 Ask the NEXT unanswered field instead.{next_hint}",
                answered()
            ));
        }
    }

    // MESSAGE during active form filling — a question asked outside the
    // ASK_* protocol would never set the pending field, so answers would be
    // lost.  Retried once; the marker scan prevents an infinite loop.
    if matches!(action, Action::Message { .. })
        && ctx.initial_extraction_done
        && !ctx.answers.is_empty()
    {
        let already_retried = messages.iter().any(|m| m.content.contains(MESSAGE_RETRY_MARKER));
        if !already_retried {
            warn!("model returned MESSAGE during active form filling");
            return Some(format!(
                "WRONG format. You returned MESSAGE but you should be asking for \
                 the next unanswered form field. Already answered: [{}]. \
                 Find the next unanswered field and use the correct format: \
                 ASK_TEXT, ASK_DATE, ASK_DROPDOWN, etc. with a field_id. \
                 {MESSAGE_RETRY_MARKER}.",
                answered()
            ));
        }
    }

    // Empty dropdown/checkbox options — the model skipped the tool call
    // that provides them.
    if let Some(options) = action.options() {
        if options.is_empty() {
            warn!(
                field_id = action.field_id().unwrap_or("?"),
                kind = action.kind_str(),
                "model returned a choice ask with empty options"
            );
            return Some(
                "WRONG. You returned ASK_DROPDOWN with empty options. \
                 You do NOT have the options yet. \
                 You MUST return a TOOL_CALL first to fetch the data. \
                 Check the form: which tool provides data for this field? \
                 Return a TOOL_CALL for that tool NOW."
                    .into(),
            );
        }
    }

    // Premature FORM_COMPLETE — required fields are still missing.
    if matches!(action, Action::FormComplete { .. }) {
        let missing: Vec<&str> = ctx
            .required_fields
            .iter()
            .filter(|id| !ctx.answers.contains_key(*id))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            warn!(missing = missing.len(), "model returned FORM_COMPLETE too early");
            let next_field = missing[0];
            return Some(format!(
                "WRONG. You returned FORM_COMPLETE but these required fields are \
                 still unanswered: [{}]. \
                 Ask the NEXT missing field: '{next_field}'. \
                 Check the form definition for how to ask it.",
                missing.join(", ")
            ));
        }
    }

    // Verbatim re-ask after a failed answer — the user already saw this
    // wording and it did not work.
    if let (Some(reask_field), Some(field_id)) = (ctx.reask_field_id, action.field_id()) {
        if field_id == reask_field {
            if let Some(text) = action.message_text() {
                let repeated = ctx
                    .recent_assistant_texts
                    .iter()
                    .any(|t| t.trim() == text.trim());
                if repeated {
                    warn!(field_id, "model repeated a re-ask verbatim");
                    return Some(format!(
                        "WRONG. You repeated the exact same question for \
                         '{field_id}'. The user already saw that wording. \
                         Re-ask the field with DIFFERENT, clearer phrasing."
                    ));
                }
            }
        }
    }

    None
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use freja_model::ScriptedMockProvider;

    fn empty_ctx<'a>(
        answers: &'a BTreeMap<String, AnswerValue>,
        required: &'a [String],
    ) -> GuardContext<'a> {
        GuardContext {
            answers,
            required_fields: required,
            initial_extraction_done: true,
            allow_answered_field_update: false,
            reask_field_id: None,
            recent_assistant_texts: Vec::new(),
        }
    }

    fn seed() -> Vec<Message> {
        vec![Message::system("sys"), Message::user("hello")]
    }

    // ── JSON extraction ──────────────────────────────────────────────────────

    #[test]
    fn extract_json_direct_parse() {
        let v = extract_json(r#"{"action": "MESSAGE", "text": "hi"}"#).unwrap();
        assert_eq!(v["action"], "MESSAGE");
    }

    #[test]
    fn extract_json_from_fenced_block() {
        let content = "Here you go:\n```json\n{\"action\": \"MESSAGE\", \"text\": \"hi\"}\n```";
        let v = extract_json(content).unwrap();
        assert_eq!(v["text"], "hi");
    }

    #[test]
    fn extract_json_from_surrounding_prose() {
        let content = "Sure! {\"action\": \"MESSAGE\", \"text\": \"hi\"} Hope that helps.";
        let v = extract_json(content).unwrap();
        assert_eq!(v["text"], "hi");
    }

    #[test]
    fn extract_json_rejects_non_objects() {
        assert!(extract_json("\"just a string\"").is_none());
        assert!(extract_json("[1, 2, 3]").is_none());
        assert!(extract_json("no json at all").is_none());
    }

    // ── Retry loop ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn invalid_json_retries_with_corrective() {
        let provider = ScriptedMockProvider::new(vec![
            "I think you should tell me more!",
            r#"{"action": "MESSAGE", "text": "ok"}"#,
        ]);
        let answers = BTreeMap::new();
        let required: Vec<String> = Vec::new();
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        assert_eq!(payload.as_action(), Some(&Action::message("ok")));
        // The corrective was appended to the scratch buffer and sent.
        let second = provider.request(1).unwrap();
        assert!(second
            .messages
            .iter()
            .any(|m| m.content.contains("NOT valid JSON")));
    }

    #[tokio::test]
    async fn exhaustion_returns_none() {
        let provider = ScriptedMockProvider::new(vec!["junk", "junk", "junk", "junk"]);
        let answers = BTreeMap::new();
        let required: Vec<String> = Vec::new();
        let mut messages = seed();
        let payload =
            call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4).await;
        assert!(payload.is_none());
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn reask_of_answered_field_is_rejected_once() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "ASK_DROPDOWN", "field_id": "leave_type", "options": ["Annual", "Sick"]}"#,
            r#"{"action": "ASK_DATE", "field_id": "start_date"}"#,
        ]);
        let mut answers = BTreeMap::new();
        answers.insert("leave_type".to_string(), AnswerValue::Text("Annual".into()));
        let required = vec!["leave_type".to_string(), "start_date".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        assert_eq!(payload.as_action().unwrap().field_id(), Some("start_date"));
        let second = provider.request(1).unwrap();
        let corrective = &second.messages.last().unwrap().content;
        assert!(corrective.contains("'leave_type' is already answered"));
        assert!(corrective.contains("start_date"));
    }

    #[tokio::test]
    async fn answered_field_guard_skipped_during_edit() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "ASK_TEXT", "field_id": "name", "message": "New name?"}"#,
        ]);
        let mut answers = BTreeMap::new();
        answers.insert("name".to_string(), AnswerValue::Text("Bob".into()));
        let required = vec!["name".to_string()];
        let mut ctx = empty_ctx(&answers, &required);
        ctx.allow_answered_field_update = true;
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &ctx, 4).await.unwrap();
        assert_eq!(payload.as_action().unwrap().field_id(), Some("name"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn message_during_filling_retried_exactly_once() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "MESSAGE", "text": "what else?"}"#,
            r#"{"action": "MESSAGE", "text": "still chatting"}"#,
        ]);
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), AnswerValue::Text("x".into()));
        let required = vec!["a".to_string(), "b".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        // Second MESSAGE is let through — the guard only retries once.
        assert_eq!(payload.as_action(), Some(&Action::message("still chatting")));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_options_force_tool_call_retry() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "ASK_DROPDOWN", "field_id": "est", "options": []}"#,
            r#"{"action": "TOOL_CALL", "tool_name": "get_establishments"}"#,
        ]);
        let answers = BTreeMap::new();
        let required = vec!["est".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        assert_eq!(payload.as_action().unwrap().kind_str(), "TOOL_CALL");
        let req = provider.request(1).unwrap();
        let corrective = &req.messages.last().unwrap().content;
        assert!(corrective.contains("TOOL_CALL first"));
    }

    #[tokio::test]
    async fn premature_form_complete_names_missing_and_next() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "FORM_COMPLETE", "data": {"a": "x"}}"#,
            r#"{"action": "ASK_TEXT", "field_id": "b"}"#,
        ]);
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), AnswerValue::Text("x".into()));
        let required = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        assert_eq!(payload.as_action().unwrap().field_id(), Some("b"));
        let req = provider.request(1).unwrap();
        let corrective = &req.messages.last().unwrap().content;
        assert!(corrective.contains("[b, c]"));
        assert!(corrective.contains("'b'"));
    }

    #[tokio::test]
    async fn verbatim_reask_is_rejected() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"action": "ASK_DATE", "field_id": "d", "message": "When did it happen?"}"#,
            r#"{"action": "ASK_DATE", "field_id": "d", "message": "Could you give me the date, e.g. 2026-01-15?"}"#,
        ]);
        let answers = BTreeMap::new();
        let required = vec!["d".to_string()];
        let mut ctx = empty_ctx(&answers, &required);
        ctx.reask_field_id = Some("d");
        ctx.recent_assistant_texts = vec!["When did it happen?".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &ctx, 4).await.unwrap();
        assert!(payload
            .as_action()
            .unwrap()
            .message_text()
            .unwrap()
            .contains("2026-01-15"));
        let req = provider.request(1).unwrap();
        let corrective = &req.messages.last().unwrap().content;
        assert!(corrective.contains("DIFFERENT"));
    }

    #[tokio::test]
    async fn multi_answer_bypasses_action_guards() {
        let provider = ScriptedMockProvider::new(vec![
            r#"{"intent": "multi_answer", "answers": {"a": "x"}}"#,
        ]);
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), AnswerValue::Text("old".into()));
        let required = vec!["a".to_string()];
        let mut messages = seed();
        let payload = call_with_guards(&provider, &mut messages, &empty_ctx(&answers, &required), 4)
            .await
            .unwrap();
        assert!(matches!(payload, LlmPayload::MultiAnswer { .. }));
    }
}
