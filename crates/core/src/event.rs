//! Domain event system: lets observers follow jobs without polling.
//!
//! The job queue publishes an event at every lifecycle transition. Nothing in
//! the engine depends on anyone listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A job was accepted into the queue
    JobSubmitted {
        job_id: String,
        conversation_id: String,
        priority: String,
        timestamp: DateTime<Utc>,
    },

    /// A worker slot picked the job up
    JobStarted {
        job_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// The reply was generated (or served from cache) and handed off
    JobCompleted {
        job_id: String,
        cached: bool,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// The attempt failed and another one is scheduled
    JobRetryScheduled {
        job_id: String,
        attempt: u32,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The job gave up for good
    JobFailed {
        job_id: String,
        attempts: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The reply was persisted but nobody live received it
    DeliveryDegraded {
        job_id: String,
        channel: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
