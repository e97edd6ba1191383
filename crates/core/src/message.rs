//! Message domain types.
//!
//! These are the value objects that flow between a conversation, its
//! memory and the language model: a turn is recorded as a `Message`, memory
//! blocks digest batches of them, and prompts are assembled from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Privileged context (instructions, remembered facts)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Render messages as a `role: content` transcript, one turn per line.
pub fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello there");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello there");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn message_ids_are_unique() {
        let a = Message::assistant("one");
        let b = Message::assistant("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn deserialize_minimal_message() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"user","content":"My name is Dana"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "My name is Dana");
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn transcript_formats_roles() {
        let msgs = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(transcript(&msgs), "user: hi\nassistant: hello");
    }
}
