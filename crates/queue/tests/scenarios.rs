//! End-to-end flows through the orchestrator and the job queue, with
//! scripted providers and the in-memory store and transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use studyhall_channels::InMemoryTransport;
use studyhall_config::AppConfig;
use studyhall_core::{
    ChannelId, CompletionError, CompletionRequest, CompletionResponse, ConversationId, Message,
    MessageId, MessageStore, Provider, Role, StoreError, SubscriberId, Thread, UserFacingError,
};
use studyhall_decision::{BehaviorMode, PriorityLevel};
use studyhall_memory::InMemoryMessageStore;
use studyhall_queue::{JobId, JobQueue, JobStatus, JobView, ResponseOrchestrator};

/// Answers every request, counting calls and tracking peak concurrency.
#[derive(Default)]
struct CountingProvider {
    delay: Duration,
    calls: Mutex<usize>,
    active: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingProvider {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        *self.calls.lock().unwrap() += 1;
        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(last.clone());

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        Ok(CompletionResponse {
            text: format!("Answer to: {last}"),
            tokens_used: 42,
            model: request.model,
        })
    }
}

/// Fails every call with the same error.
struct FailingProvider {
    error: CompletionError,
    calls: Mutex<usize>,
}

impl FailingProvider {
    fn new(error: CompletionError) -> Self {
        Self {
            error,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        *self.calls.lock().unwrap() += 1;
        Err(self.error.clone())
    }
}

/// Panics on every call.
#[derive(Default)]
struct PanickingProvider {
    calls: Mutex<usize>,
}

#[async_trait]
impl Provider for PanickingProvider {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        *self.calls.lock().unwrap() += 1;
        panic!("provider blew up");
    }
}

/// Writes at once but acknowledges the first write only after `ack_delay`.
struct SlowAckStore {
    inner: InMemoryMessageStore,
    ack_delay: Duration,
    writes: Mutex<usize>,
}

#[async_trait]
impl MessageStore for SlowAckStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn save_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        role: Role,
    ) -> Result<MessageId, StoreError> {
        let id = self.inner.save_message(conversation_id, text, role).await?;
        let first = {
            let mut writes = self.writes.lock().unwrap();
            *writes += 1;
            *writes == 1
        };
        if first {
            tokio::time::sleep(self.ack_delay).await;
        }
        Ok(id)
    }
}

struct Harness {
    orchestrator: ResponseOrchestrator,
    store: Arc<InMemoryMessageStore>,
    transport: Arc<InMemoryTransport>,
}

impl Harness {
    fn queue(&self) -> &JobQueue {
        self.orchestrator.queue()
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.queue.tick_ms = 10;
    config
}

fn harness(config: AppConfig, provider: Arc<dyn Provider>) -> Harness {
    let store = Arc::new(InMemoryMessageStore::new());
    let transport = Arc::new(InMemoryTransport::new());
    let queue = JobQueue::new(&config, provider, store.clone(), transport.clone());
    Harness {
        orchestrator: ResponseOrchestrator::new(&config, queue),
        store,
        transport,
    }
}

fn solo() -> Thread {
    Thread::solo(ConversationId::from("thread-1"), "alice")
}

async fn wait_terminal(queue: &JobQueue, id: &JobId) -> JobView {
    loop {
        let view = queue.get_status(id).expect("job still in table");
        if view.status.is_terminal() {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn ask(h: &Harness, text: &str) -> JobId {
    let message = Message::user("alice", text);
    let handled = h
        .orchestrator
        .handle_message(&message, &solo(), &[], None)
        .unwrap();
    handled.job_id.expect("assistant should respond")
}

#[tokio::test(start_paused = true)]
async fn mention_in_pair_is_answered() {
    let h = harness(config(), Arc::new(CountingProvider::default()));
    let thread = Thread::new(
        ConversationId::from("thread-2"),
        vec!["alice".into(), "bob".into()],
    );
    let message = Message::user("alice", "AI, explain photosynthesis");

    let handled = h
        .orchestrator
        .handle_message(&message, &thread, &[], None)
        .unwrap();
    assert!(handled.decision.should_respond);
    assert!(handled.decision.reason.contains("explicit mention"));
    assert!(handled.decision.confidence >= 0.85);
    assert!(handled.job_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn weekend_chatter_in_group_is_ignored() {
    let h = harness(config(), Arc::new(CountingProvider::default()));
    let thread = Thread::new(
        ConversationId::from("thread-3"),
        vec!["alice".into(), "bob".into(), "carol".into()],
    );
    let message = Message::user("bob", "how was your weekend?");

    let handled = h
        .orchestrator
        .handle_message(&message, &thread, &[], None)
        .unwrap();
    assert!(!handled.decision.should_respond);
    assert!(handled.job_id.is_none());
    assert!(handled.priority.is_none());
}

#[tokio::test(start_paused = true)]
async fn solo_question_gets_a_personal_tutor_reply_delivered() {
    let provider = Arc::new(CountingProvider::default());
    let h = harness(config(), provider.clone());
    let alice = SubscriberId("alice".into());
    let mut inbox = h.transport.connect(alice.clone()).await;
    h.transport
        .subscribe(&ChannelId::from("thread-1"), &alice)
        .await;
    h.queue().start();

    let message = Message::user("alice", "What is the chain rule?");
    let handled = h
        .orchestrator
        .handle_message(&message, &solo(), &[], None)
        .unwrap();
    assert_eq!(handled.decision.behavior_mode, BehaviorMode::PersonalTutor);

    let view = wait_terminal(h.queue(), &handled.job_id.unwrap()).await;
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(provider.calls(), 1);

    let delivered = inbox.recv().await.unwrap();
    assert_eq!(delivered.payload["text"], "Answer to: What is the chain rule?");
    assert_eq!(delivered.payload["cached"], false);

    let saved = h.store.messages(&ConversationId::from("thread-1")).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].text, "Answer to: What is the chain rule?");

    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn repeated_context_is_served_from_cache() {
    let provider = Arc::new(CountingProvider::default());
    let h = harness(config(), provider.clone());
    h.queue().start();

    let first = ask(&h, "What is the chain rule?").await;
    let first = wait_terminal(h.queue(), &first).await;
    assert!(!first.result.unwrap().cached);

    let second = ask(&h, "What is the chain rule?").await;
    let second = wait_terminal(h.queue(), &second).await;
    assert_eq!(second.status, JobStatus::Completed);
    let result = second.result.unwrap();
    assert!(result.cached);
    assert_eq!(result.text, "Answer to: What is the chain rule?");
    assert_eq!(provider.calls(), 1);

    // Cached replies are still persisted
    assert_eq!(h.store.count().await, 2);
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn server_errors_exhaust_attempts_then_fail() {
    let provider = Arc::new(FailingProvider::new(CompletionError::ApiError {
        status_code: 500,
        message: "upstream exploded".into(),
    }));
    let mut config = config();
    config.queue.max_attempts = 3;
    let h = harness(config, provider.clone());
    h.queue().start();

    let id = ask(&h, "What is the chain rule?").await;
    let view = wait_terminal(h.queue(), &id).await;

    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.attempts, 3);
    assert_eq!(provider.calls(), 3);
    assert_eq!(
        view.error.as_deref(),
        Some(UserFacingError::TemporarilyUnavailable.message())
    );
    assert_eq!(h.store.count().await, 0);
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn authentication_failure_is_not_retried() {
    let provider = Arc::new(FailingProvider::new(CompletionError::AuthenticationFailed(
        "invalid api key".into(),
    )));
    let h = harness(config(), provider.clone());
    h.queue().start();

    let id = ask(&h, "What is the chain rule?").await;
    let view = wait_terminal(h.queue(), &id).await;

    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(provider.calls(), 1);
    assert_eq!(
        view.error.as_deref(),
        Some(UserFacingError::AuthenticationFailed.message())
    );
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_completions_time_out_and_retry() {
    let provider = Arc::new(CountingProvider::slow(Duration::from_secs(5)));
    let mut config = config();
    config.queue.job_timeout_secs = 1;
    config.queue.max_attempts = 2;
    let h = harness(config, provider.clone());
    h.queue().start();

    let id = ask(&h, "What is the chain rule?").await;
    let view = wait_terminal(h.queue(), &id).await;

    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(provider.calls(), 2);
    assert_eq!(
        view.error.as_deref(),
        Some(UserFacingError::TemporarilyUnavailable.message())
    );
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn burst_never_exceeds_concurrency() {
    let provider = Arc::new(CountingProvider::slow(Duration::from_millis(500)));
    let mut config = config();
    config.cache.enabled = false;
    let h = harness(config, provider.clone());
    h.queue().start();

    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(ask(&h, &format!("What is question number {i}?")).await);
    }
    for id in &ids {
        assert_eq!(wait_terminal(h.queue(), id).await.status, JobStatus::Completed);
    }

    assert_eq!(provider.calls(), 10);
    assert_eq!(provider.peak.load(Ordering::SeqCst), 3);
    assert_eq!(h.queue().in_flight(), 0);
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn higher_priority_jobs_run_first() {
    let provider = Arc::new(CountingProvider::default());
    let mut config = config();
    config.queue.concurrency = 1;
    config.cache.enabled = false;
    let h = harness(config, provider.clone());

    let payload = |text: &str| {
        let message = Message::user("alice", text);
        studyhall_queue::JobPayload {
            conversation_id: ConversationId::from("thread-1"),
            channel_id: ChannelId::from("thread-1"),
            decision: h.orchestrator.decide(&message, &solo(), &[]),
            message,
            recent_messages: vec![],
            learner_level: None,
        }
    };
    let low = h
        .queue()
        .submit(payload("first but low"), PriorityLevel::Low)
        .unwrap();
    let normal = h
        .queue()
        .submit(payload("second and normal"), PriorityLevel::Normal)
        .unwrap();
    let high = h
        .queue()
        .submit(payload("last but high"), PriorityLevel::High)
        .unwrap();

    h.queue().start();
    for id in [&low, &normal, &high] {
        wait_terminal(h.queue(), id).await;
    }

    let seen = provider.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec!["last but high", "second and normal", "first but low"]
    );
    h.queue().shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_jobs() {
    let provider = Arc::new(CountingProvider::slow(Duration::from_secs(2)));
    let h = harness(config(), provider.clone());
    h.queue().start();

    let id = ask(&h, "What is the chain rule?").await;
    while h.queue().in_flight() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.queue().shutdown().await;

    assert_eq!(h.queue().in_flight(), 0);
    let view = h.queue().get_status(&id).unwrap();
    assert_eq!(view.status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn panicking_provider_fails_the_job_and_frees_its_slot() {
    let provider = Arc::new(PanickingProvider::default());
    let h = harness(config(), provider.clone());
    h.queue().start();

    let id = ask(&h, "What is the chain rule?").await;
    let view = wait_terminal(h.queue(), &id).await;

    assert_eq!(view.status, JobStatus::Failed);
    assert_eq!(view.attempts, 3);
    assert_eq!(*provider.calls.lock().unwrap(), 3);
    assert_eq!(
        view.error.as_deref(),
        Some(UserFacingError::TemporarilyUnavailable.message())
    );

    tokio::time::timeout(Duration::from_secs(5), h.queue().shutdown())
        .await
        .expect("shutdown drains after a panic");
    assert_eq!(h.queue().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_store_acknowledgement_does_not_duplicate_the_reply() {
    let config = config();
    let store = Arc::new(SlowAckStore {
        inner: InMemoryMessageStore::new(),
        ack_delay: config.queue.job_timeout() * 2,
        writes: Mutex::new(0),
    });
    let provider = Arc::new(CountingProvider::default());
    let queue = JobQueue::new(
        &config,
        provider.clone(),
        store.clone(),
        Arc::new(InMemoryTransport::new()),
    );
    let orchestrator = ResponseOrchestrator::new(&config, queue.clone());
    queue.start();

    let message = Message::user("alice", "What is the chain rule?");
    let handled = orchestrator
        .handle_message(&message, &solo(), &[], None)
        .unwrap();
    let view = wait_terminal(&queue, &handled.job_id.unwrap()).await;

    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.attempts, 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(*store.writes.lock().unwrap(), 1);
    assert_eq!(store.inner.count().await, 1);
    queue.shutdown().await;
}
