//! Job model: one pending assistant contribution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studyhall_core::{ChannelId, ConversationId, Message};
use studyhall_decision::{Decision, PriorityLevel};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::QueueError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle: `pending` → `processing` → `completed` or `failed`. A retried
/// job goes back to `pending` until its backoff elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Everything a worker needs to produce and deliver one reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    /// Already authorized by the caller
    pub conversation_id: ConversationId,

    /// Where the reply is broadcast
    pub channel_id: ChannelId,

    /// The message the assistant is answering
    pub message: Message,

    pub decision: Decision,

    /// Conversation history, oldest first
    #[serde(default)]
    pub recent_messages: Vec<Message>,

    /// Defaults to "intermediate" when absent
    #[serde(default)]
    pub learner_level: Option<String>,
}

impl JobPayload {
    /// Reject payloads no worker could act on.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.conversation_id.is_empty() {
            return Err(QueueError::InvalidInput("conversation id is empty".into()));
        }
        if self.channel_id.0.trim().is_empty() {
            return Err(QueueError::InvalidInput("channel id is empty".into()));
        }
        if self.message.text.trim().is_empty() {
            return Err(QueueError::InvalidInput("message text is empty".into()));
        }
        Ok(())
    }

    /// Cache key for this payload's conversational context.
    pub fn fingerprint(&self) -> String {
        let topic = self.decision.context.primary_topic();
        studyhall_memory::fingerprint(
            self.decision.participant_count,
            topic.as_ref().map(|t| t.as_str()),
            self.learner_level.as_deref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub text: String,
    pub tokens_used: u32,
    pub model_id: String,
    /// Served from the response cache without calling the completion API
    pub cached: bool,
}

/// A job as held in the live table.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub priority: PriorityLevel,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub payload: Arc<JobPayload>,
    pub result: Option<JobResult>,
    /// User-facing text of the last failure
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Submission order, for FIFO within a priority bucket
    pub(crate) seq: u64,
    /// When the job reached a terminal state
    pub(crate) retired_at: Option<Instant>,
}

impl Job {
    pub(crate) fn new(payload: JobPayload, priority: PriorityLevel, max_attempts: u32) -> Self {
        Self {
            id: JobId::new(),
            priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            payload: Arc::new(payload),
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            seq: 0,
            retired_at: None,
        }
    }

    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            priority: self.priority,
            status: self.status,
            attempts: self.attempts,
            error: self.error.clone(),
            result: self.result.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Read-only snapshot returned by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub priority: PriorityLevel,
    pub status: JobStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use studyhall_decision::{ConversationContext, DecisionEngine};

    pub(crate) fn payload(text: &str) -> JobPayload {
        let decision =
            DecisionEngine::default().decide_text(text, 1, ConversationContext::empty());
        JobPayload {
            conversation_id: ConversationId::from("thread-1"),
            channel_id: ChannelId::from("thread-1"),
            message: Message::user("alice", text),
            decision,
            recent_messages: vec![],
            learner_level: None,
        }
    }

    #[test]
    fn empty_text_is_invalid() {
        assert!(payload("what is a vector?").validate().is_ok());
        assert!(matches!(
            payload("   ").validate(),
            Err(QueueError::InvalidInput(_))
        ));
    }

    #[test]
    fn empty_conversation_is_invalid() {
        let mut p = payload("what is a vector?");
        p.conversation_id = ConversationId::from("");
        assert!(p.validate().is_err());
    }

    #[test]
    fn same_context_shares_a_fingerprint() {
        let a = payload("explain the chain rule");
        let b = payload("what is a derivative in calculus?");
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut c = payload("explain the chain rule");
        c.learner_level = Some("advanced".into());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }
}
