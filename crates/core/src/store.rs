//! MessageStore trait: where generated replies are persisted.
//!
//! The document store behind the study platform is an external collaborator;
//! the engine only ever appends the assistant's reply to a conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{ConversationId, Role};

/// Identifier assigned by the store to a persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Append a message to a conversation and return its ID.
    async fn save_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        role: Role,
    ) -> std::result::Result<MessageId, StoreError>;
}
