// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored answer value.
///
/// The answers map is heterogeneous: free text and choices are strings,
/// checkbox selections are string lists, locations are lat/lng pairs.
/// Variant order matters for the untagged representation: maps must be
/// tried before lists and scalars before text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Location { lat: f64, lng: f64 },
    List(Vec<String>),
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AnswerValue {
    /// Convert an arbitrary model-provided JSON value into an answer.
    ///
    /// Shapes outside the supported set degrade to their JSON text rather
    /// than being dropped; the form owner sees what the model said.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or_default()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(map) => {
                let lat = map.get("lat").and_then(Value::as_f64);
                let lng = map.get("lng").and_then(Value::as_f64);
                match (lat, lng) {
                    (Some(lat), Some(lng)) => Self::Location { lat, lng },
                    _ => Self::Text(value.to_string()),
                }
            }
            Value::Null => Self::Text(String::new()),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Render the answer for prompt context and summaries.
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
            Self::Location { lat, lng } => format!("({lat}, {lng})"),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
