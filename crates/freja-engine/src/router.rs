// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Turn routing.
//!
//! The conversation flow is an explicit state machine:
//!
//! ```text
//! entry -> {greeting, tool_handler, step_confirmation, validation,
//!           extraction, conversation}
//! greeting          -> end
//! tool_handler      -> conversation
//! step_confirmation -> end (short-circuit) | conversation
//! validation        -> conversation
//! extraction        -> finalize (direct action) | conversation
//! conversation      -> finalize (success) | end (model failure)
//! finalize          -> end
//! ```

use crate::session::{Session, TurnInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Node {
    Greeting,
    ToolHandler,
    StepConfirmation,
    Validation,
    Extraction,
    Conversation,
    Finalize,
    End,
}

/// Pick the entry node for a turn.  First match wins.
pub(crate) fn route_entry(session: &Session, input: &TurnInput) -> Node {
    let message = input.user_message.trim();

    // New session with an empty message — greet.
    if session.history.is_empty() && message.is_empty() {
        return Node::Greeting;
    }
    // Tool results from the host — process them first.
    if !input.tool_results.is_empty() {
        return Node::ToolHandler;
    }
    // A step summary is awaiting the user's confirm/edit.
    if session.awaiting_step_confirmation && !message.is_empty() {
        return Node::StepConfirmation;
    }
    // The user answered a pending field — validate the answer.
    if session.pending_field_id.is_some() && !message.is_empty() {
        return Node::Validation;
    }
    // First real user message — run bulk extraction.
    if !session.initial_extraction_done {
        return Node::Extraction;
    }
    Node::Conversation
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AskKind;
    use crate::session::{HistoryEntry, ToolResult};
    use freja_form::FormDefinition;

    fn session() -> Session {
        Session::new(
            FormDefinition::parse(
                "---\ntitle: T\nfields:\n  - id: a\n    type: text\n    required: true\n---\nbody",
            )
            .unwrap(),
        )
    }

    #[test]
    fn fresh_session_with_empty_message_greets() {
        assert_eq!(route_entry(&session(), &TurnInput::default()), Node::Greeting);
    }

    #[test]
    fn tool_results_win_over_everything_after_greeting() {
        let mut s = session();
        s.history.push(HistoryEntry::assistant("hi"));
        s.awaiting_step_confirmation = true;
        s.pending_field_id = Some("a".into());
        let input = TurnInput {
            user_message: "yes".into(),
            tool_results: vec![ToolResult {
                tool_name: "t".into(),
                result: serde_json::json!({}),
            }],
        };
        assert_eq!(route_entry(&s, &input), Node::ToolHandler);
    }

    #[test]
    fn awaiting_confirmation_routes_to_step_confirmation() {
        let mut s = session();
        s.history.push(HistoryEntry::assistant("summary"));
        s.awaiting_step_confirmation = true;
        s.pending_field_id = Some("a".into());
        assert_eq!(
            route_entry(&s, &TurnInput::message("yes")),
            Node::StepConfirmation
        );
    }

    #[test]
    fn pending_field_routes_to_validation() {
        let mut s = session();
        s.history.push(HistoryEntry::assistant("hi"));
        s.initial_extraction_done = true;
        s.pending_field_id = Some("a".into());
        s.pending_action_type = Some(AskKind::Text);
        assert_eq!(route_entry(&s, &TurnInput::message("Bob")), Node::Validation);
    }

    #[test]
    fn first_real_message_routes_to_extraction() {
        let mut s = session();
        s.history.push(HistoryEntry::assistant("hi"));
        assert_eq!(
            route_entry(&s, &TurnInput::message("I'm Bob")),
            Node::Extraction
        );
    }

    #[test]
    fn default_routes_to_conversation() {
        let mut s = session();
        s.history.push(HistoryEntry::assistant("hi"));
        s.initial_extraction_done = true;
        assert_eq!(
            route_entry(&s, &TurnInput::message("tell me more")),
            Node::Conversation
        );
    }
}
