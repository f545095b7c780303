//! Message, Thread and Conversation identity types.
//!
//! These are the value objects handed to the engine by the message-posting
//! path: a learner posts a message → the engine decides whether the assistant
//! contributes → a reply is generated and delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (study thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human participant
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single message in a conversation. Immutable once handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The text content
    pub text: String,

    /// Platform user ID of the sender
    pub sender_id: String,

    /// Who authored the message
    #[serde(default = "default_role")]
    pub role: Role,

    /// When the message was posted
    pub timestamp: DateTime<Utc>,
}

fn default_role() -> Role {
    Role::User
}

impl Message {
    /// A message from a human participant, stamped now.
    pub fn user(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::user_at(sender_id, text, Utc::now())
    }

    /// A message from a human participant at a fixed time.
    pub fn user_at(
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            text: text.into(),
            sender_id: sender_id.into(),
            role: Role::User,
            timestamp,
        }
    }

    /// A message authored by the assistant.
    pub fn assistant_at(
        sender_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            text: text.into(),
            sender_id: sender_id.into(),
            role: Role::Assistant,
            timestamp,
        }
    }

    pub fn is_from_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// A study thread: the conversation a message was posted in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: ConversationId,

    /// Human participant IDs
    #[serde(default)]
    pub participants: Vec<String>,
}

impl Thread {
    pub fn new(id: ConversationId, participants: Vec<String>) -> Self {
        Self { id, participants }
    }

    /// A thread with a single learner.
    pub fn solo(id: ConversationId, learner: impl Into<String>) -> Self {
        Self::new(id, vec![learner.into()])
    }

    /// Number of distinct participants, never less than one.
    pub fn participant_count(&self) -> usize {
        let mut ids: Vec<&str> = self.participants.iter().map(|p| p.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("alice", "What is a derivative?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.sender_id, "alice");
        assert!(!msg.is_from_assistant());
    }

    #[test]
    fn participant_count_ignores_duplicates() {
        let thread = Thread::new(
            ConversationId::from("t1"),
            vec!["alice".into(), "bob".into(), "alice".into()],
        );
        assert_eq!(thread.participant_count(), 2);
    }

    #[test]
    fn empty_thread_counts_as_solo() {
        let thread = Thread::new(ConversationId::from("t1"), vec![]);
        assert_eq!(thread.participant_count(), 1);
    }

    #[test]
    fn role_defaults_to_user_when_missing() {
        let json = r#"{"text":"hi","sender_id":"bob","timestamp":"2026-03-01T10:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.role, Role::User);
    }
}
