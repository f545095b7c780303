//! In-memory message store, useful for tests and the CLI.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use studyhall_core::error::StoreError;
use studyhall_core::message::{ConversationId, Role};
use studyhall_core::store::{MessageId, MessageStore};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A message as persisted by [`InMemoryMessageStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub text: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Keeps every saved message in a map keyed by conversation.
pub struct InMemoryMessageStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<StoredMessage>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Messages saved to `conversation_id`, oldest first.
    pub async fn messages(&self, conversation_id: &ConversationId) -> Vec<StoredMessage> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total messages across all conversations.
    pub async fn count(&self) -> usize {
        self.conversations.read().await.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        role: Role,
    ) -> Result<MessageId, StoreError> {
        if conversation_id.is_empty() {
            return Err(StoreError::Storage("conversation id is empty".into()));
        }

        let id = MessageId(Uuid::new_v4().to_string());
        self.conversations
            .write()
            .await
            .entry(conversation_id.clone())
            .or_default()
            .push(StoredMessage {
                id: id.clone(),
                text: text.to_string(),
                role,
                created_at: Utc::now(),
            });
        Ok(id)
    }
}
