// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Form-definition parsing.
//!
//! A form definition is a YAML frontmatter header (fields, tools, metadata
//! that code parses deterministically) followed by a markdown body that is
//! handed to the language model as rich conversational context:
//!
//! ```text
//! ---
//! form_id: my_form
//! title: My Form
//! fields:
//!   - id: name
//!     type: text
//!     required: true
//!     prompt: "What is your name?"
//! tools:
//!   - name: get_data
//!     purpose: "Fetch options"
//! ---
//! # My Form
//! ... markdown body for the LLM ...
//! ```

mod condense;
mod definition;
mod schema;

pub use condense::condense;
pub use definition::{FormDefinition, FormError};
pub use schema::{FieldType, FormField, Requirement, ToolSpec};
