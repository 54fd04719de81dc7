// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported form field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldType {
    Text,
    Date,
    Datetime,
    Location,
    Dropdown,
    Checkbox,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Location => "location",
            Self::Dropdown => "dropdown",
            Self::Checkbox => "checkbox",
        }
    }

    /// Field types whose options come from a static list in the definition
    /// or a tool call at runtime.
    pub fn has_options(&self) -> bool {
        matches!(self, Self::Dropdown | Self::Checkbox)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Type strings in definitions are matched case-insensitively.
impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::Datetime),
            "location" => Ok(Self::Location),
            "dropdown" => Ok(Self::Dropdown),
            "checkbox" => Ok(Self::Checkbox),
            other => Err(D::Error::custom(format!("unknown field type '{other}'"))),
        }
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Whether a field must be answered.
///
/// `Conditional` fields depend on runtime conditions the model evaluates;
/// they are carried through but never enter the required set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    Required,
    #[default]
    Optional,
    Conditional,
}

impl Requirement {
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

// `required:` accepts YAML booleans and the case-insensitive strings
// "true" / "false" / "conditional".  Anything else means optional.
impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Self::Required,
            Raw::Bool(false) => Self::Optional,
            Raw::Str(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Self::Required,
                "conditional" => Self::Conditional,
                _ => Self::Optional,
            },
        })
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Required => serializer.serialize_bool(true),
            Self::Optional => serializer.serialize_bool(false),
            Self::Conditional => serializer.serialize_str("conditional"),
        }
    }
}

/// Definition of a single form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    /// Unique field identifier
    pub id: String,
    /// The widget type for this field
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Whether this field must be answered
    #[serde(default)]
    pub required: Requirement,
    /// The question to ask the user for this field
    #[serde(default)]
    pub prompt: String,
    /// Step this field belongs to in multi-step forms.
    /// Missing or unparseable values default to step 1.
    #[serde(default = "default_step", deserialize_with = "de_step")]
    pub step: u32,
    /// Static options for dropdown/checkbox fields.  `None` means the
    /// options must be fetched with a tool call at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

fn default_step() -> u32 {
    1
}

fn de_step<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
        Other(serde_yaml::Value),
    }
    let step = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n,
        Raw::Str(s) => s.trim().parse::<i64>().unwrap_or(1),
        Raw::Other(_) => 1,
    };
    Ok(step.max(1) as u32)
}

/// A data-fetch tool named in the form header.  The host application
/// executes tools; the engine only names them to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub purpose: String,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn field(yaml: &str) -> FormField {
        serde_yaml::from_str(yaml).unwrap()
    }

    // ── Field types ──────────────────────────────────────────────────────────

    #[test]
    fn field_type_parses_case_insensitively() {
        let f = field("id: a\ntype: DropDown");
        assert_eq!(f.field_type, FieldType::Dropdown);
    }

    #[test]
    fn unknown_field_type_is_an_error() {
        let r: Result<FormField, _> = serde_yaml::from_str("id: a\ntype: slider");
        assert!(r.is_err());
    }

    #[test]
    fn field_type_serializes_lowercase() {
        assert_eq!(serde_yaml::to_string(&FieldType::Datetime).unwrap().trim(), "datetime");
    }

    // ── Requirement coercion ─────────────────────────────────────────────────

    #[test]
    fn required_accepts_boolean() {
        assert!(field("id: a\ntype: text\nrequired: true").required.is_required());
        assert!(!field("id: a\ntype: text\nrequired: false").required.is_required());
    }

    #[test]
    fn required_accepts_string_true_case_insensitively() {
        assert!(field("id: a\ntype: text\nrequired: \"True\"").required.is_required());
    }

    #[test]
    fn conditional_is_not_required() {
        let f = field("id: a\ntype: text\nrequired: conditional");
        assert_eq!(f.required, Requirement::Conditional);
        assert!(!f.required.is_required());
    }

    #[test]
    fn missing_required_defaults_to_optional() {
        assert_eq!(field("id: a\ntype: text").required, Requirement::Optional);
    }

    // ── Step coercion ────────────────────────────────────────────────────────

    #[test]
    fn step_defaults_to_one() {
        assert_eq!(field("id: a\ntype: text").step, 1);
    }

    #[test]
    fn step_parses_numeric_strings() {
        assert_eq!(field("id: a\ntype: text\nstep: \"2\"").step, 2);
    }

    #[test]
    fn nonsense_step_falls_back_to_one() {
        assert_eq!(field("id: a\ntype: text\nstep: soon").step, 1);
        assert_eq!(field("id: a\ntype: text\nstep: 0").step, 1);
        assert_eq!(field("id: a\ntype: text\nstep: -3").step, 1);
    }

    // ── Options ──────────────────────────────────────────────────────────────

    #[test]
    fn static_options_are_carried() {
        let f = field("id: a\ntype: dropdown\noptions: [Red, Blue]");
        assert_eq!(f.options.as_deref(), Some(&["Red".to_string(), "Blue".to_string()][..]));
    }

    #[test]
    fn has_options_only_for_choice_types() {
        assert!(FieldType::Dropdown.has_options());
        assert!(FieldType::Checkbox.has_options());
        assert!(!FieldType::Text.has_options());
        assert!(!FieldType::Date.has_options());
    }
}
