// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;
use tracing::debug;

use crate::session::{HistoryEntry, Session, TurnInput};

/// Entered when the host hands back tool results: serialize each result
/// into a directive entry so the model can use the data next turn.
///
/// When option strings can be extracted from the payload, the directive
/// pins the model to an ASK_DROPDOWN with exactly those options; otherwise
/// it degrades to a generic "use this data" instruction.
pub(crate) fn run(session: &mut Session, input: &TurnInput) {
    for result in &input.tool_results {
        let serialized =
            serde_json::to_string(&result.result).unwrap_or_else(|_| "{}".to_string());
        let mut directive = format!("[Tool result for {}]: {serialized}", result.tool_name);

        match extract_options_hint(&result.result) {
            Some(hint) => {
                debug!(tool = %result.tool_name, options = %hint, "extracted options from tool result");
                directive.push_str(&format!(
                    "\n\n[INSTRUCTION: Use the data above. \
                     Return ASK_DROPDOWN with these options: {hint}]"
                ));
            }
            None => {
                directive.push_str(
                    "\n\n[INSTRUCTION: Use the data above to continue the form. \
                     Return the appropriate JSON action.]",
                );
            }
        }
        session.history.push(HistoryEntry::directive(directive));
    }

    if !input.user_message.trim().is_empty() {
        session.history.push(HistoryEntry::user(input.user_message.clone()));
    }
    session.pending_tool_name = None;
    session.user_message_added = true;
}

/// Try to extract human-readable option names from a tool result.
///
/// Scans a bounded set of shapes: arrays of objects carrying `name`
/// (plain or bilingual `{english: …}`), `value.english`, or one of
/// `label`/`title`/`text`/`description`.  Returns a JSON list of option
/// strings, or `None` when nothing recognizable is found.
pub(crate) fn extract_options_hint(data: &Value) -> Option<String> {
    let obj = data.as_object()?;
    let mut options: Vec<String> = Vec::new();

    for value in obj.values() {
        let Some(items) = value.as_array() else {
            continue;
        };
        for item in items {
            let Some(map) = item.as_object() else {
                continue;
            };

            let mut found = None;
            if let Some(name) = map.get("name") {
                if let Some(english) = name.get("english").and_then(Value::as_str) {
                    // Bilingual name — prefer English.
                    if !english.is_empty() {
                        found = Some(english.to_string());
                    }
                } else if let Some(s) = name.as_str() {
                    found = Some(s.to_string());
                }
            }
            if found.is_none() {
                if let Some(english) = map
                    .get("value")
                    .and_then(|v| v.get("english"))
                    .and_then(Value::as_str)
                {
                    if !english.is_empty() {
                        found = Some(english.to_string());
                    }
                }
            }
            if found.is_none() {
                for key in ["label", "title", "text", "description"] {
                    if let Some(s) = map.get(key).and_then(Value::as_str) {
                        if !s.is_empty() {
                            found = Some(s.to_string());
                            break;
                        }
                    }
                }
            }
            if let Some(option) = found {
                options.push(option);
            }
        }
    }

    if options.is_empty() {
        None
    } else {
        serde_json::to_string(&options).ok()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
