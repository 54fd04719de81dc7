// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The outbound action protocol.
//!
//! Every turn produces exactly one action.  The host application reads the
//! action JSON and renders the matching widget or behaviour: ASK_* actions
//! render input controls, TOOL_CALL asks the host to execute a data fetch,
//! FORM_COMPLETE carries the collected answers, MESSAGE is plain
//! conversation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use freja_form::FieldType;

/// The six ASK_ action kinds, one per field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AskKind {
    #[serde(rename = "ASK_TEXT")]
    Text,
    #[serde(rename = "ASK_DATE")]
    Date,
    #[serde(rename = "ASK_DATETIME")]
    Datetime,
    #[serde(rename = "ASK_LOCATION")]
    Location,
    #[serde(rename = "ASK_DROPDOWN")]
    Dropdown,
    #[serde(rename = "ASK_CHECKBOX")]
    Checkbox,
}

impl AskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "ASK_TEXT",
            Self::Date => "ASK_DATE",
            Self::Datetime => "ASK_DATETIME",
            Self::Location => "ASK_LOCATION",
            Self::Dropdown => "ASK_DROPDOWN",
            Self::Checkbox => "ASK_CHECKBOX",
        }
    }

    /// The ASK_ kind used to collect a field of the given type.
    pub fn for_field_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => Self::Text,
            FieldType::Date => Self::Date,
            FieldType::Datetime => Self::Datetime,
            FieldType::Location => Self::Location,
            FieldType::Dropdown => Self::Dropdown,
            FieldType::Checkbox => Self::Checkbox,
        }
    }
}

impl std::fmt::Display for AskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of outbound actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    /// A conversational message (clarification, error, greeting, summary).
    #[serde(rename = "MESSAGE")]
    Message { text: String },

    /// Ask for a free-text field.
    #[serde(rename = "ASK_TEXT")]
    AskText {
        field_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Ask for a date.
    #[serde(rename = "ASK_DATE")]
    AskDate {
        field_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Ask for a date and time.
    #[serde(rename = "ASK_DATETIME")]
    AskDatetime {
        field_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Ask for a location.
    #[serde(rename = "ASK_LOCATION")]
    AskLocation {
        field_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Ask for a single-select choice.
    #[serde(rename = "ASK_DROPDOWN")]
    AskDropdown {
        field_id: String,
        #[serde(default)]
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Ask for a multi-select choice.
    #[serde(rename = "ASK_CHECKBOX")]
    AskCheckbox {
        field_id: String,
        #[serde(default)]
        options: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },

    /// Request data from the host application.
    #[serde(rename = "TOOL_CALL")]
    ToolCall {
        tool_name: String,
        #[serde(default)]
        tool_args: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// All required fields are filled.  Carries the final data.
    #[serde(rename = "FORM_COMPLETE")]
    FormComplete {
        #[serde(default)]
        data: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Action {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    /// Build the ASK_ action for a field, without options.
    pub fn ask(kind: AskKind, field_id: impl Into<String>, label: Option<String>, message: Option<String>) -> Self {
        let field_id = field_id.into();
        match kind {
            AskKind::Text => Self::AskText { field_id, label, message, value: None },
            AskKind::Date => Self::AskDate { field_id, label, message, value: None },
            AskKind::Datetime => Self::AskDatetime { field_id, label, message, value: None },
            AskKind::Location => Self::AskLocation { field_id, label, message, value: None },
            AskKind::Dropdown => Self::AskDropdown { field_id, options: Vec::new(), label, message, value: None },
            AskKind::Checkbox => Self::AskCheckbox { field_id, options: Vec::new(), label, message, value: None },
        }
    }

    /// The wire tag for this action.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Message { .. } => "MESSAGE",
            Self::AskText { .. } => "ASK_TEXT",
            Self::AskDate { .. } => "ASK_DATE",
            Self::AskDatetime { .. } => "ASK_DATETIME",
            Self::AskLocation { .. } => "ASK_LOCATION",
            Self::AskDropdown { .. } => "ASK_DROPDOWN",
            Self::AskCheckbox { .. } => "ASK_CHECKBOX",
            Self::ToolCall { .. } => "TOOL_CALL",
            Self::FormComplete { .. } => "FORM_COMPLETE",
        }
    }

    /// The ASK_ kind, when this is an ASK_ action.
    pub fn ask_kind(&self) -> Option<AskKind> {
        match self {
            Self::AskText { .. } => Some(AskKind::Text),
            Self::AskDate { .. } => Some(AskKind::Date),
            Self::AskDatetime { .. } => Some(AskKind::Datetime),
            Self::AskLocation { .. } => Some(AskKind::Location),
            Self::AskDropdown { .. } => Some(AskKind::Dropdown),
            Self::AskCheckbox { .. } => Some(AskKind::Checkbox),
            _ => None,
        }
    }

    pub fn is_ask(&self) -> bool {
        self.ask_kind().is_some()
    }

    /// The field id carried by ASK_ actions.
    pub fn field_id(&self) -> Option<&str> {
        match self {
            Self::AskText { field_id, .. }
            | Self::AskDate { field_id, .. }
            | Self::AskDatetime { field_id, .. }
            | Self::AskLocation { field_id, .. }
            | Self::AskDropdown { field_id, .. }
            | Self::AskCheckbox { field_id, .. } => Some(field_id),
            _ => None,
        }
    }

    /// Options carried by dropdown/checkbox asks.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::AskDropdown { options, .. } | Self::AskCheckbox { options, .. } => Some(options),
            _ => None,
        }
    }

    /// An explicit value the model attached to an ASK_ action, if any.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::AskText { value, .. }
            | Self::AskDate { value, .. }
            | Self::AskDatetime { value, .. }
            | Self::AskLocation { value, .. }
            | Self::AskDropdown { value, .. }
            | Self::AskCheckbox { value, .. } => value.as_ref(),
            _ => None,
        }
    }

    /// The conversational text of this action: `text` for MESSAGE,
    /// `message` for everything else.
    pub fn message_text(&self) -> Option<&str> {
        match self {
            Self::Message { text } => Some(text),
            Self::AskText { message, .. }
            | Self::AskDate { message, .. }
            | Self::AskDatetime { message, .. }
            | Self::AskLocation { message, .. }
            | Self::AskDropdown { message, .. }
            | Self::AskCheckbox { message, .. }
            | Self::ToolCall { message, .. }
            | Self::FormComplete { message, .. } => message.as_deref(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_action_tag() {
        let json = serde_json::to_value(Action::message("hello")).unwrap();
        assert_eq!(json["action"], "MESSAGE");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn ask_dropdown_carries_options() {
        let action = Action::AskDropdown {
            field_id: "color".into(),
            options: vec!["Red".into(), "Blue".into()],
            label: Some("Pick a color".into()),
            message: None,
            value: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "ASK_DROPDOWN");
        assert_eq!(json["options"][1], "Blue");
        assert_eq!(json["label"], "Pick a color");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn form_complete_round_trips() {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), Value::from("Bob"));
        let action = Action::FormComplete { data, message: Some("done".into()) };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn tool_call_defaults_empty_args() {
        let action: Action =
            serde_json::from_value(serde_json::json!({"action": "TOOL_CALL", "tool_name": "t"}))
                .unwrap();
        match action {
            Action::ToolCall { tool_name, tool_args, .. } => {
                assert_eq!(tool_name, "t");
                assert!(tool_args.is_empty());
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn ask_constructor_picks_the_right_variant() {
        let a = Action::ask(AskKind::Date, "start", Some("When?".into()), None);
        assert_eq!(a.kind_str(), "ASK_DATE");
        assert_eq!(a.field_id(), Some("start"));
    }

    #[test]
    fn ask_kind_maps_each_field_type() {
        assert_eq!(AskKind::for_field_type(FieldType::Dropdown), AskKind::Dropdown);
        assert_eq!(AskKind::for_field_type(FieldType::Datetime), AskKind::Datetime);
        assert_eq!(AskKind::for_field_type(FieldType::Text), AskKind::Text);
    }

    #[test]
    fn message_text_reads_both_channels() {
        assert_eq!(Action::message("hi").message_text(), Some("hi"));
        let ask = Action::ask(AskKind::Text, "f", None, Some("please".into()));
        assert_eq!(ask.message_text(), Some("please"));
    }

    #[test]
    fn ask_field_id_absent_for_message() {
        assert!(Action::message("x").field_id().is_none());
        assert!(!Action::message("x").is_ask());
    }
}
