// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! System prompt builders.
//!
//! The model receives the condensed form context plus an explicit state
//! block every turn; the behavioural rules are restated each time because
//! small models drift without them.

use std::collections::BTreeMap;

use freja_config::EngineConfig;
use freja_form::{condense, FieldType, FormDefinition, Requirement};

use crate::answer::AnswerValue;
use crate::session::id_to_label;

/// Maximum lines of the field catalog injected into prompts.
const MAX_CATALOG_LINES: usize = 64;

/// Condensed form context: field catalog plus the (possibly condensed)
/// markdown body.
pub(crate) fn form_context(form: &FormDefinition, cfg: &EngineConfig) -> String {
    let catalog = field_catalog(form);
    let body = condense(
        &form.body,
        cfg.condense_threshold_lines,
        cfg.condense_keep_lines,
    );
    if body.trim().is_empty() {
        catalog
    } else {
        format!("{catalog}\n\n{body}")
    }
}

/// One line per field: id, type, requiredness, step, prompt.
fn field_catalog(form: &FormDefinition) -> String {
    let mut lines = vec![format!("# {}", form.title), String::new(), "## Fields".into()];
    let shown = form.fields.len().min(MAX_CATALOG_LINES);
    for field in &form.fields[..shown] {
        let required = match field.required {
            Requirement::Required => ", required",
            Requirement::Conditional => ", conditional",
            Requirement::Optional => "",
        };
        let step = if field.step > 1 {
            format!(", step {}", field.step)
        } else {
            String::new()
        };
        let options = match &field.options {
            Some(options) if !options.is_empty() => format!(" [options: {}]", options.join(", ")),
            _ => String::new(),
        };
        lines.push(format!(
            "- {} ({}{required}{step}): {}{options}",
            field.id, field.field_type, field.prompt
        ));
    }
    if form.fields.len() > shown {
        lines.push(format!("... and {} more fields", form.fields.len() - shown));
    }
    if !form.tools.is_empty() {
        lines.push(String::new());
        lines.push("## Tools".into());
        for tool in &form.tools {
            lines.push(format!("- {}: {}", tool.name, tool.purpose));
        }
    }
    lines.join("\n")
}

/// System prompt for the bulk extraction phase.
pub(crate) fn extraction_prompt(context: &str) -> String {
    format!(
        "You are Freja, a conversational form-filling assistant. The user has \
         provided a free-text description of data they want to fill in. Your job \
         is to extract as many field values as possible from their message, based \
         on the form described below.\n\
         \n\
         ## Rules\n\
         1. ONLY extract values that the user explicitly stated. NEVER assume or fabricate.\n\
         2. Match extracted values to the correct field IDs from the form definition.\n\
         3. For fields with fixed options, map the user's text to the closest valid option.\n\
         4. Allowed value shapes per field type: text → string; date → \"YYYY-MM-DD\"; \
         datetime → \"YYYY-MM-DD HH:MM\"; dropdown → one option string; \
         checkbox → list of option strings; location → {{\"lat\": <number>, \"lng\": <number>}}.\n\
         5. Skip any field where you are NOT confident about the user's intent.\n\
         6. Some fields may require tool calls to get options — do NOT extract those.\n\
         \n\
         ## Your Response Format\n\
         Respond with a single JSON object:\n\
         {{\"intent\": \"multi_answer\", \"answers\": {{\"<field_id>\": <value>}}, \
         \"message\": \"<friendly summary of what you extracted>\"}}\n\
         \n\
         If you cannot extract ANY values, return empty answers:\n\
         {{\"intent\": \"multi_answer\", \"answers\": {{}}, \"message\": \"<ask for clearer info>\"}}\n\
         \n\
         ## Form Definition\n\
         {context}\n"
    )
}

/// System prompt for regular conversation turns.
pub(crate) fn conversation_prompt(
    context: &str,
    answers: &BTreeMap<String, AnswerValue>,
    required_fields: &[String],
) -> String {
    let state_block = state_block(answers);
    let required_block = still_required_block(answers, required_fields);
    format!(
        "You are Freja, a conversational form-filling assistant. You guide the \
         user through the form described below. The user may speak any language — \
         respond in the same language they use.\n\
         \n\
         ## Rules\n\
         1. Follow the form definition EXACTLY.\n\
         2. Ask one field at a time. Never skip ahead or batch questions.\n\
         3. NEVER assume, guess, or fabricate values. Only use what the user provides.\n\
         4. NEVER ask about a field that is already answered. The answered list below is authoritative.\n\
         5. Never use MESSAGE to ask for a field value — always use the matching ASK_* action with a field_id.\n\
         6. When a dropdown's options are not listed in the form, return TOOL_CALL to fetch them BEFORE asking.\n\
         7. When the app returns tool results, use that data to present options to the user.\n\
         8. NEVER return FORM_COMPLETE while required fields are missing.\n\
         9. When re-asking a field after an invalid answer, rephrase the question — do not repeat the same wording.\n\
         10. If the user wants to correct a previous answer, handle it gracefully.\n\
         \n\
         ## Your Response Format\n\
         You MUST respond with a single valid JSON object. Choose ONE of these:\n\
         \n\
         Ask for a field (single-select dropdown):\n\
         {{\"action\": \"ASK_DROPDOWN\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"options\": [\"option1\", \"option2\"], \"message\": \"<friendly message>\"}}\n\
         \n\
         Ask for a field (multi-select checkboxes):\n\
         {{\"action\": \"ASK_CHECKBOX\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"options\": [\"option1\", \"option2\"], \"message\": \"<friendly message>\"}}\n\
         \n\
         Ask for a free-text field:\n\
         {{\"action\": \"ASK_TEXT\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"message\": \"<friendly message>\"}}\n\
         \n\
         Ask for a date:\n\
         {{\"action\": \"ASK_DATE\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"message\": \"<friendly message>\"}}\n\
         \n\
         Ask for a date and time:\n\
         {{\"action\": \"ASK_DATETIME\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"message\": \"<friendly message>\"}}\n\
         \n\
         Ask for a location:\n\
         {{\"action\": \"ASK_LOCATION\", \"field_id\": \"<field_id>\", \"label\": \"<question>\", \
         \"message\": \"<friendly message>\"}}\n\
         \n\
         Request data from the app (tool call):\n\
         {{\"action\": \"TOOL_CALL\", \"tool_name\": \"<tool_name>\", \"tool_args\": {{}}, \
         \"message\": \"<what you're doing>\"}}\n\
         \n\
         Send a conversational message (greeting, clarification, error):\n\
         {{\"action\": \"MESSAGE\", \"text\": \"<your message>\"}}\n\
         \n\
         Form complete (all required fields filled):\n\
         {{\"action\": \"FORM_COMPLETE\", \"data\": {{\"<field_id>\": \"<value>\"}}, \
         \"message\": \"<summary message>\"}}\n\
         \n\
         ## Form Definition\n\
         {context}\n\
         \n\
         ## Current State\n\
         {state_block}\n\
         \n\
         ## Still Required\n\
         {required_block}\n"
    )
}

/// The answered-fields block of the conversation prompt.
fn state_block(answers: &BTreeMap<String, AnswerValue>) -> String {
    if answers.is_empty() {
        return "No fields answered yet.".into();
    }
    let mut lines = vec!["Answered fields:".to_string()];
    for (field_id, value) in answers {
        lines.push(format!("  - {field_id}: {}", value.display_text()));
    }
    lines.join("\n")
}

/// The missing-required block, naming the single next field to ask.
fn still_required_block(answers: &BTreeMap<String, AnswerValue>, required_fields: &[String]) -> String {
    let missing: Vec<&String> = required_fields
        .iter()
        .filter(|id| !answers.contains_key(*id))
        .collect();
    if missing.is_empty() {
        return "All required fields are answered. Return FORM_COMPLETE with the collected data."
            .into();
    }
    let mut lines = Vec::with_capacity(missing.len());
    for (i, id) in missing.iter().enumerate() {
        if i == 0 {
            lines.push(format!("- {id}   <- ask this field next"));
        } else {
            lines.push(format!("- {id}"));
        }
    }
    lines.join("\n")
}

/// The initial greeting: form title plus a warm summary of the required
/// fields grouped by type.
pub(crate) fn greeting(form: &FormDefinition) -> String {
    match summarize_required_fields(form) {
        Some(summary) => format!(
            "Hi there! I'm Freja, and I'll be helping you fill out the \
             **{}** form.\n\n{summary}.\n\nFeel free to tell me everything you \
             know in one message — I'll extract what I can and only ask about \
             the rest!",
            form.title
        ),
        None => format!(
            "Hi there! I'm Freja, and I'll be helping you fill out the \
             **{}** form.\n\nGo ahead and describe all the information you \
             have — I'll take care of filling in the form and only ask about \
             anything that's missing!",
            form.title
        ),
    }
}

/// Group required field labels by kind for the greeting.
fn summarize_required_fields(form: &FormDefinition) -> Option<String> {
    let mut dates = Vec::new();
    let mut choices = Vec::new();
    let mut locations = Vec::new();
    let mut details = Vec::new();

    for field in form.fields.iter().filter(|f| f.required.is_required()) {
        let label = id_to_label(&field.id);
        match field.field_type {
            FieldType::Date | FieldType::Datetime => dates.push(label),
            FieldType::Dropdown | FieldType::Checkbox => choices.push(label),
            FieldType::Location => locations.push(label),
            FieldType::Text => details.push(label),
        }
    }

    let mut groups = Vec::new();
    if !dates.is_empty() {
        groups.push(format!("a few dates ({})", dates.join(", ")));
    }
    if !choices.is_empty() {
        groups.push(format!("some selections ({})", choices.join(", ")));
    }
    if !details.is_empty() {
        groups.push(format!("some details ({})", details.join(", ")));
    }
    if !locations.is_empty() {
        groups.push(format!("a location ({})", locations.join(", ")));
    }
    if groups.is_empty() {
        return None;
    }
    Some(format!("To complete it I'll need {}", groups.join(", ")))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> FormDefinition {
        FormDefinition::parse(
            "---\ntitle: Leave Request\nfields:\n  - id: leave_type\n    type: dropdown\n    required: true\n    prompt: \"What type of leave?\"\n  - id: start_date\n    type: date\n    required: true\n    prompt: \"When does it start?\"\n  - id: reason\n    type: text\n    prompt: \"Why?\"\ntools:\n  - name: get_leave_types\n    purpose: \"Fetch leave types\"\n---\nShort body.",
        )
        .unwrap()
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn context_contains_catalog_and_body() {
        let ctx = form_context(&form(), &cfg());
        assert!(ctx.contains("# Leave Request"));
        assert!(ctx.contains("- leave_type (dropdown, required): What type of leave?"));
        assert!(ctx.contains("- start_date (date, required): When does it start?"));
        assert!(ctx.contains("get_leave_types"));
        assert!(ctx.contains("Short body."));
    }

    #[test]
    fn extraction_prompt_demands_multi_answer_shape() {
        let prompt = extraction_prompt("CONTEXT");
        assert!(prompt.contains(r#""intent": "multi_answer""#));
        assert!(prompt.contains("NEVER assume or fabricate"));
        assert!(prompt.contains("CONTEXT"));
    }

    #[test]
    fn conversation_prompt_lists_answered_fields() {
        let mut answers = BTreeMap::new();
        answers.insert("leave_type".to_string(), AnswerValue::Text("Annual".into()));
        let prompt = conversation_prompt("CTX", &answers, &["leave_type".into(), "start_date".into()]);
        assert!(prompt.contains("- leave_type: Annual"));
        assert!(prompt.contains("- start_date   <- ask this field next"));
        assert!(!prompt.contains("- leave_type   <-"));
    }

    #[test]
    fn conversation_prompt_announces_completion_when_nothing_missing() {
        let mut answers = BTreeMap::new();
        answers.insert("a".to_string(), AnswerValue::Text("x".into()));
        let prompt = conversation_prompt("CTX", &answers, &["a".into()]);
        assert!(prompt.contains("All required fields are answered"));
    }

    #[test]
    fn conversation_prompt_carries_behavioural_rules() {
        let prompt = conversation_prompt("CTX", &BTreeMap::new(), &[]);
        assert!(prompt.contains("NEVER ask about a field that is already answered"));
        assert!(prompt.contains("Never use MESSAGE to ask for a field value"));
        assert!(prompt.contains("TOOL_CALL to fetch them BEFORE asking"));
        assert!(prompt.contains("NEVER return FORM_COMPLETE while required fields are missing"));
    }

    #[test]
    fn conversation_prompt_shows_all_nine_payloads() {
        let prompt = conversation_prompt("CTX", &BTreeMap::new(), &[]);
        for tag in [
            "ASK_DROPDOWN",
            "ASK_CHECKBOX",
            "ASK_TEXT",
            "ASK_DATE",
            "ASK_DATETIME",
            "ASK_LOCATION",
            "TOOL_CALL",
            "MESSAGE",
            "FORM_COMPLETE",
        ] {
            assert!(prompt.contains(tag), "missing payload example for {tag}");
        }
    }

    #[test]
    fn greeting_names_form_and_groups_fields() {
        let text = greeting(&form());
        assert!(text.contains("**Leave Request**"));
        assert!(text.contains("a few dates (Start date)"));
        assert!(text.contains("some selections (Leave type)"));
    }

    #[test]
    fn greeting_without_required_fields_uses_open_invitation() {
        let form = FormDefinition::parse(
            "---\ntitle: Open Form\nfields:\n  - id: note\n    type: text\n---\nbody",
        )
        .unwrap();
        let text = greeting(&form);
        assert!(text.contains("describe all the information"));
    }

    #[test]
    fn field_catalog_is_bounded() {
        let mut yaml = String::from("---\ntitle: Big\nfields:\n");
        for i in 0..100 {
            yaml.push_str(&format!("  - id: f{i}\n    type: text\n"));
        }
        yaml.push_str("---\nbody");
        let form = FormDefinition::parse(&yaml).unwrap();
        let catalog = field_catalog(&form);
        assert!(catalog.lines().count() < 100);
        assert!(catalog.contains("more fields"));
    }
}
