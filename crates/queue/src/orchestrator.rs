//! One-way flow for an incoming message: analyze, decide, prioritize and,
//! when the assistant should speak, enqueue.

use serde::Serialize;
use studyhall_config::AppConfig;
use studyhall_core::{ChannelId, Message, Thread};
use studyhall_decision::{Decision, DecisionEngine, PriorityCalculator, PriorityScore};
use tracing::debug;

use crate::error::QueueError;
use crate::job::{JobId, JobPayload};
use crate::queue::JobQueue;

/// What happened to an incoming message.
#[derive(Debug, Clone, Serialize)]
pub struct HandledMessage {
    pub decision: Decision,
    /// Present when the assistant will respond
    pub priority: Option<PriorityScore>,
    pub job_id: Option<JobId>,
}

pub struct ResponseOrchestrator {
    engine: DecisionEngine,
    calculator: PriorityCalculator,
    queue: JobQueue,
}

impl ResponseOrchestrator {
    pub fn new(config: &AppConfig, queue: JobQueue) -> Self {
        Self {
            engine: DecisionEngine::new(&config.assistant, &config.decision),
            calculator: PriorityCalculator::new(config.priority.clone()),
            queue,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Synchronous verdict, for callers that decide on their own whether to
    /// enqueue.
    pub fn decide(&self, message: &Message, thread: &Thread, recent: &[Message]) -> Decision {
        self.engine.decide(message, thread, recent)
    }

    /// Decide on `message` and enqueue a reply if the assistant should speak.
    ///
    /// Returns as soon as the job is queued; generation and delivery happen
    /// in the background.
    pub fn handle_message(
        &self,
        message: &Message,
        thread: &Thread,
        recent: &[Message],
        learner_level: Option<String>,
    ) -> Result<HandledMessage, QueueError> {
        if message.text.trim().is_empty() {
            return Err(QueueError::InvalidInput("message text is empty".into()));
        }
        if thread.id.is_empty() {
            return Err(QueueError::InvalidInput("thread id is empty".into()));
        }

        let decision = self.engine.decide(message, thread, recent);
        if !decision.should_respond {
            debug!(thread = %thread.id, rule = %decision.rule, "Assistant stays silent");
            return Ok(HandledMessage {
                decision,
                priority: None,
                job_id: None,
            });
        }

        let priority = self.calculator.calculate(&decision);
        let payload = JobPayload {
            conversation_id: thread.id.clone(),
            channel_id: channel_for(thread),
            message: message.clone(),
            decision: decision.clone(),
            recent_messages: recent.to_vec(),
            learner_level,
        };
        let job_id = self.queue.submit(payload, priority.level)?;

        Ok(HandledMessage {
            decision,
            priority: Some(priority),
            job_id: Some(job_id),
        })
    }
}

/// The real-time channel a thread's replies are broadcast on.
pub fn channel_for(thread: &Thread) -> ChannelId {
    ChannelId(thread.id.0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use studyhall_channels::InMemoryTransport;
    use studyhall_core::{
        CompletionError, CompletionRequest, CompletionResponse, ConversationId, Provider,
    };
    use studyhall_memory::InMemoryMessageStore;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                text: "Photosynthesis turns light into chemical energy.".into(),
                tokens_used: 12,
                model: request.model,
            })
        }
    }

    fn orchestrator() -> ResponseOrchestrator {
        let config = AppConfig::default();
        let queue = JobQueue::new(
            &config,
            Arc::new(FixedProvider),
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(InMemoryTransport::new()),
        );
        ResponseOrchestrator::new(&config, queue)
    }

    fn pair() -> Thread {
        Thread::new(
            ConversationId::from("thread-9"),
            vec!["alice".into(), "bob".into()],
        )
    }

    #[tokio::test]
    async fn mention_enqueues_a_job() {
        let orchestrator = orchestrator();
        let message = Message::user("alice", "AI, explain photosynthesis");
        let handled = orchestrator
            .handle_message(&message, &pair(), &[], None)
            .unwrap();

        assert!(handled.decision.should_respond);
        let job_id = handled.job_id.unwrap();
        assert!(orchestrator.queue().get_status(&job_id).is_some());
        assert!(handled.priority.unwrap().priority > 0.0);
    }

    #[tokio::test]
    async fn chatter_enqueues_nothing() {
        let orchestrator = orchestrator();
        let message = Message::user("alice", "how was your weekend?");
        let handled = orchestrator
            .handle_message(&message, &pair(), &[], None)
            .unwrap();

        assert!(!handled.decision.should_respond);
        assert!(handled.job_id.is_none());
        assert_eq!(orchestrator.queue().stats().pending, 0);
    }

    #[tokio::test]
    async fn empty_message_is_invalid_input() {
        let orchestrator = orchestrator();
        let message = Message::user("alice", "  ");
        let err = orchestrator
            .handle_message(&message, &pair(), &[], None)
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidInput(_)));
    }

    #[test]
    fn channel_follows_thread_id() {
        assert_eq!(channel_for(&pair()), ChannelId::from("thread-9"));
    }
}
