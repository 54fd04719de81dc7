use serde::{Deserialize, Serialize};

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: text.into() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Request sent to a model provider.
///
/// Providers return the complete response text in one piece; the engine
/// extracts a JSON action from it, so there is nothing to stream.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// The last user message in the request, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The system message in the request, if any.
    pub fn system_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
