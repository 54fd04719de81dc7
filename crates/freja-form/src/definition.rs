// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::schema::{FieldType, FormField, ToolSpec};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("malformed form definition: {0}")]
    MalformedDefinition(String),
}

/// Frontmatter header as it appears in the YAML block.
#[derive(Debug, Deserialize)]
struct Header {
    form_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    fields: Vec<FormField>,
    #[serde(default)]
    tools: Vec<ToolSpec>,
}

/// A parsed form definition: the structured field list from the frontmatter
/// header plus the markdown body used as model context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDefinition {
    pub form_id: Option<String>,
    pub title: String,
    pub fields: Vec<FormField>,
    pub tools: Vec<ToolSpec>,
    /// The markdown body below the frontmatter, verbatim.
    pub body: String,
}

impl FormDefinition {
    /// Parse a form definition string (frontmatter header + markdown body).
    pub fn parse(content: &str) -> Result<Self, FormError> {
        let (yaml_block, body) = split_frontmatter(content)
            .ok_or_else(|| FormError::MalformedDefinition("missing frontmatter header".into()))?;

        let header: Header = serde_yaml::from_str(yaml_block)
            .map_err(|e| FormError::MalformedDefinition(e.to_string()))?;

        if header.fields.is_empty() {
            return Err(FormError::MalformedDefinition(
                "form defines no fields".into(),
            ));
        }

        let mut seen = HashSet::new();
        for field in &header.fields {
            if field.id.trim().is_empty() {
                return Err(FormError::MalformedDefinition(
                    "field with empty id".into(),
                ));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(FormError::MalformedDefinition(format!(
                    "duplicate field id '{}'",
                    field.id
                )));
            }
        }

        let title = header
            .title
            .or_else(|| header.form_id.clone())
            .unwrap_or_else(|| "Untitled Form".into());

        debug!(
            title = %title,
            fields = header.fields.len(),
            tools = header.tools.len(),
            "parsed form definition"
        );

        Ok(Self {
            form_id: header.form_id,
            title,
            fields: header.fields,
            tools: header.tools,
            body: body.to_string(),
        })
    }

    /// Look up a field by its id.
    pub fn field(&self, id: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Ids of all required fields, in definition order.
    pub fn required_field_ids(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.required.is_required())
            .map(|f| f.id.clone())
            .collect()
    }

    /// Required field ids grouped by step number.
    pub fn required_by_step(&self) -> BTreeMap<u32, Vec<String>> {
        let mut by_step: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for field in self.fields.iter().filter(|f| f.required.is_required()) {
            by_step.entry(field.step).or_default().push(field.id.clone());
        }
        by_step
    }

    /// Map of field id → type.
    pub fn field_types(&self) -> BTreeMap<String, FieldType> {
        self.fields
            .iter()
            .map(|f| (f.id.clone(), f.field_type))
            .collect()
    }

    /// Map of field id → human prompt label, for fields that have one.
    pub fn prompt_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .filter(|f| !f.prompt.trim().is_empty())
            .map(|f| (f.id.clone(), f.prompt.trim().to_string()))
            .collect()
    }

    /// Highest step number used by any field (1 for single-step forms).
    pub fn max_step(&self) -> u32 {
        self.fields.iter().map(|f| f.step).max().unwrap_or(1)
    }

    pub fn is_multi_step(&self) -> bool {
        self.max_step() > 1
    }
}

/// Split `---`-delimited YAML frontmatter from the markdown body.
/// Returns `None` when no frontmatter block is found.
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let stripped = content.trim_start();
    let rest = stripped.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let yaml_block = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('-').trim();
    Some((yaml_block, body))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
