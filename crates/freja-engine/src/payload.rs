// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Validation and normalization of raw model JSON payloads.
//!
//! Model output is strongly typed here, at the boundary; the rest of the
//! engine never branches on raw JSON shape.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::action::Action;

/// Action tags the model may return.
pub const VALID_ACTION_TYPES: &[&str] = &[
    "MESSAGE",
    "ASK_DROPDOWN",
    "ASK_CHECKBOX",
    "ASK_TEXT",
    "ASK_DATE",
    "ASK_DATETIME",
    "ASK_LOCATION",
    "TOOL_CALL",
    "FORM_COMPLETE",
];

/// A validated model payload.
///
/// `intent` and `action` are orthogonal tags: `multi_answer` only appears
/// during bulk extraction, everything else is an action.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmPayload {
    MultiAnswer {
        answers: BTreeMap<String, Value>,
        message: Option<String>,
    },
    Act(Action),
}

impl LlmPayload {
    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Act(action) => Some(action),
            Self::MultiAnswer { .. } => None,
        }
    }

    /// The conversational text of this payload, if any.
    pub fn message_text(&self) -> Option<&str> {
        match self {
            Self::MultiAnswer { message, .. } => message.as_deref(),
            Self::Act(action) => action.message_text(),
        }
    }
}

/// Validate a raw JSON object against the closed payload set, normalizing
/// synonymous keys.  Returns the typed payload or a human-readable reason.
pub fn validate_payload(raw: &Value) -> Result<LlmPayload, String> {
    let obj = raw
        .as_object()
        .ok_or_else(|| "payload must be a JSON object".to_string())?;

    let intent = obj.get("intent").and_then(Value::as_str).unwrap_or_default();
    if intent == "multi_answer" {
        let answers = match obj.get("answers") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Some(_) => return Err("'answers' must be a JSON object".into()),
        };
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(LlmPayload::MultiAnswer { answers, message });
    }

    let action = obj.get("action").and_then(Value::as_str).unwrap_or_default();
    if action.is_empty() {
        return Err("payload must contain a valid 'action' or intent='multi_answer'".into());
    }

    if !VALID_ACTION_TYPES.contains(&action) {
        // Unknown action with textual content is coerced to MESSAGE;
        // otherwise it is gibberish.
        if let Some(text) = textual_content(obj) {
            return Ok(LlmPayload::Act(Action::message(text)));
        }
        return Err(format!("unknown action '{action}' with no usable text"));
    }

    let normalized = normalize(obj, action)?;
    serde_json::from_value::<Action>(Value::Object(normalized))
        .map(LlmPayload::Act)
        .map_err(|e| format!("{action}: {e}"))
}

fn textual_content(obj: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["text", "message"] {
        if let Some(text) = obj.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Apply the per-action normalizations before typed deserialization:
/// promote `message` to `text` for MESSAGE, default null/missing containers,
/// stringify non-string option entries.
fn normalize(
    obj: &serde_json::Map<String, Value>,
    action: &str,
) -> Result<serde_json::Map<String, Value>, String> {
    let mut out = obj.clone();

    match action {
        "MESSAGE" => {
            let has_text = matches!(out.get("text"), Some(Value::String(s)) if !s.is_empty());
            if !has_text {
                let promoted = match out.get("message") {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    _ => None,
                };
                match promoted {
                    Some(text) => {
                        out.insert("text".into(), Value::String(text));
                    }
                    None => return Err("MESSAGE must include 'text' or 'message'".into()),
                }
            }
        }
        "ASK_DROPDOWN" | "ASK_CHECKBOX" => {
            let options = match out.get("options") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.iter().map(stringify).collect(),
                Some(other) => vec![stringify(other)],
            };
            out.insert("options".into(), Value::Array(options.into_iter().map(Value::String).collect()));
        }
        "TOOL_CALL" => {
            if !matches!(out.get("tool_args"), Some(Value::Object(_))) {
                out.insert("tool_args".into(), Value::Object(Default::default()));
            }
        }
        "FORM_COMPLETE" => {
            if !matches!(out.get("data"), Some(Value::Object(_))) {
                out.insert("data".into(), Value::Object(Default::default()));
            }
        }
        _ => {}
    }

    // Null label/message/value deserialize as None already; nothing to do.
    Ok(out)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
