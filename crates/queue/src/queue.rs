//! The job queue service.
//!
//! Submission only touches the job table and returns at once. A scheduler
//! task wakes on a fixed tick, promotes retries whose backoff elapsed, purges
//! retired jobs and dispatches the best pending jobs while a worker permit is
//! free. Each dispatched job runs on its own task:
//!
//! ```text
//! ┌ job timeout ─────────────────────────────┐
//! │ cache lookup ─hit─────────────────────┐  │
//! │      └─miss─> completion ─────────────┤  │
//! └───────────────────────────────────────┼──┘
//!                                         └─> persist ─> cache fill ─> broadcast
//! ```
//!
//! A failed attempt is retried with exponential backoff while attempts
//! remain and the failure is retryable; otherwise the job fails with a
//! user-facing message. A panic inside an attempt counts as a retryable
//! failure. Once a reply is persisted the attempt is no longer timed, so a
//! slow store never causes the same reply to be saved twice.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use studyhall_channels::Broadcaster;
use studyhall_config::{AppConfig, CacheConfig, QueueConfig};
use studyhall_core::{
    DomainEvent, EventBus, MessageStore, Provider, Role, Transport, exponential_backoff,
};
use studyhall_decision::PriorityLevel;
use studyhall_memory::ResponseCache;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AttemptError, QueueError};
use crate::job::{Job, JobId, JobPayload, JobResult, JobStatus, JobView};
use crate::prompt::{CompletionSettings, build_request};
use crate::table::{Claim, JobTable, QueueStats};

/// Bounded-concurrency job queue. Cloning shares the same queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    table: Mutex<JobTable>,
    permits: Arc<Semaphore>,
    in_flight: AtomicUsize,
    accepting: AtomicBool,
    config: QueueConfig,
    cache_config: CacheConfig,
    settings: CompletionSettings,
    provider: Arc<dyn Provider>,
    store: Arc<dyn MessageStore>,
    broadcaster: Broadcaster,
    cache: ResponseCache<JobResult>,
    events: Arc<EventBus>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn MessageStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let concurrency = config.queue.concurrency.max(1);
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(JobTable::default()),
                permits: Arc::new(Semaphore::new(concurrency)),
                in_flight: AtomicUsize::new(0),
                accepting: AtomicBool::new(true),
                config: config.queue.clone(),
                cache_config: config.cache.clone(),
                settings: CompletionSettings {
                    assistant_name: config.assistant.name.clone(),
                    model: config.completion.model.clone(),
                    temperature: config.completion.temperature,
                    max_tokens: config.completion.max_tokens,
                },
                provider,
                store,
                broadcaster: Broadcaster::new(transport, config.broadcast.event_name.clone()),
                cache: ResponseCache::new(),
                events: Arc::new(EventBus::default()),
                token: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Enqueue a job and return its ID without waiting for it to run.
    pub fn submit(
        &self,
        payload: JobPayload,
        priority: PriorityLevel,
    ) -> Result<JobId, QueueError> {
        if !self.inner.accepting.load(Ordering::SeqCst) {
            return Err(QueueError::ShuttingDown);
        }
        payload.validate()?;

        let conversation_id = payload.conversation_id.to_string();
        let job = Job::new(payload, priority, self.inner.config.max_attempts.max(1));
        let id = self.inner.lock_table().insert(job);

        info!(job_id = %id, conversation = %conversation_id, %priority, "Job submitted");
        self.inner.events.publish(DomainEvent::JobSubmitted {
            job_id: id.to_string(),
            conversation_id,
            priority: priority.to_string(),
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    /// Snapshot of a job, or `None` if unknown or already purged.
    pub fn get_status(&self, id: &JobId) -> Option<JobView> {
        self.inner.lock_table().get(id).map(Job::view)
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock_table().stats()
    }

    /// Jobs currently executing on a worker slot.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn cache(&self) -> &ResponseCache<JobResult> {
        &self.inner.cache
    }

    /// Spawn the scheduler and the cache sweeper.
    pub fn start(&self) {
        let mut tasks = self.inner.lock_tasks();
        if !tasks.is_empty() {
            warn!("Job queue already started");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let token = self.inner.token.clone();
        let tick = self.inner.config.tick().max(Duration::from_millis(1));
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => inner.tick(),
                }
            }
            debug!("Scheduler stopped");
        }));

        if self.inner.cache_config.enabled {
            let sweep = self.inner.cache_config.sweep_interval().max(Duration::from_millis(1));
            tasks.push(
                self.inner
                    .cache
                    .spawn_sweeper(sweep, self.inner.token.child_token()),
            );
        }

        info!(
            concurrency = self.inner.config.concurrency,
            tick_ms = tick.as_millis() as u64,
            "Job queue started"
        );
    }

    /// Stop scheduling, wait for in-flight jobs to finish, then return.
    ///
    /// Pending jobs stay pending and are counted in the final log line;
    /// nothing running is interrupted.
    pub async fn shutdown(&self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.token.cancel();

        let tasks: Vec<JoinHandle<()>> = self.inner.lock_tasks().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        let poll = self.inner.config.tick().max(Duration::from_millis(1));
        while self.in_flight() > 0 {
            tokio::time::sleep(poll).await;
        }
        let pending = self.stats().pending;
        if pending > 0 {
            warn!(pending, "Job queue drained with jobs left pending");
        } else {
            info!("Job queue drained");
        }
    }
}

impl Inner {
    fn lock_table(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One scheduler pass. Never awaits.
    fn tick(self: &Arc<Self>) {
        let now = Instant::now();
        {
            let mut table = self.lock_table();
            table.promote_due(now);
            let purged = table.purge(
                now,
                self.config.completed_retention(),
                self.config.failed_retention(),
            );
            if purged > 0 {
                debug!(purged, live = table.len(), "Purged retired jobs");
            }
        }

        loop {
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                break;
            };
            let Some(claim) = self.lock_table().claim_next() else {
                break;
            };

            let slot = WorkerSlot::occupy(Arc::clone(self), permit);
            tokio::spawn(async move {
                slot.inner.run(claim).await;
                drop(slot);
            });
        }
    }

    async fn run(&self, claim: Claim) {
        debug!(job_id = %claim.id, attempt = claim.attempt, "Job started");
        self.events.publish(DomainEvent::JobStarted {
            job_id: claim.id.to_string(),
            attempt: claim.attempt,
            timestamp: Utc::now(),
        });

        let outcome = AssertUnwindSafe(self.execute(&claim))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(AttemptError::Panicked(panic_message(panic.as_ref()))));
        self.finish(&claim, outcome);
    }

    /// Generation is bounded by the job timeout; once a reply exists it is
    /// persisted and broadcast exactly once for this attempt.
    async fn execute(&self, claim: &Claim) -> Result<JobResult, AttemptError> {
        let limit = self.config.job_timeout();
        let result = match tokio::time::timeout(limit, self.generate(claim)).await {
            Ok(result) => result?,
            Err(_) => return Err(AttemptError::TimedOut(limit)),
        };
        self.persist_and_deliver(claim, result).await
    }

    async fn generate(&self, claim: &Claim) -> Result<JobResult, AttemptError> {
        let payload = &claim.payload;
        let key = payload.fingerprint();

        let cached = if self.cache_config.enabled {
            self.cache.get(&key)
        } else {
            None
        };

        let result = match cached {
            Some(hit) => {
                debug!(job_id = %claim.id, "Cache hit");
                JobResult {
                    cached: true,
                    ..hit
                }
            }
            None => {
                let request = build_request(payload, &self.settings);
                let response = self.provider.complete(request).await?;
                JobResult {
                    text: response.text,
                    tokens_used: response.tokens_used,
                    model_id: response.model,
                    cached: false,
                }
            }
        };
        Ok(result)
    }

    async fn persist_and_deliver(
        &self,
        claim: &Claim,
        result: JobResult,
    ) -> Result<JobResult, AttemptError> {
        let payload = &claim.payload;
        let message_id = self
            .store
            .save_message(&payload.conversation_id, &result.text, Role::Assistant)
            .await?;

        if self.cache_config.enabled && !result.cached {
            self.cache
                .set(payload.fingerprint(), result.clone(), self.cache_config.ttl());
        }

        let body = serde_json::json!({
            "job_id": claim.id,
            "conversation_id": payload.conversation_id,
            "message_id": message_id,
            "text": result.text,
            "cached": result.cached,
            "behavior_mode": payload.decision.behavior_mode,
            "response_type": payload.decision.response_type,
        });
        if let Err(e) = self.broadcaster.deliver(&payload.channel_id, &body).await {
            warn!(
                job_id = %claim.id,
                channel = %payload.channel_id,
                error = %e,
                "Reply persisted but not delivered"
            );
            self.events.publish(DomainEvent::DeliveryDegraded {
                job_id: claim.id.to_string(),
                channel: payload.channel_id.to_string(),
                reason: e.to_string(),
                timestamp: Utc::now(),
            });
        }

        Ok(result)
    }

    fn finish(&self, claim: &Claim, outcome: Result<JobResult, AttemptError>) {
        let now = Instant::now();
        let mut table = self.lock_table();
        let Some(job) = table.get_slot_mut(claim.slot, &claim.id) else {
            warn!(job_id = %claim.id, "Finished job no longer in table");
            return;
        };

        let event = match outcome {
            Ok(result) => {
                info!(
                    job_id = %claim.id,
                    attempt = claim.attempt,
                    cached = result.cached,
                    tokens = result.tokens_used,
                    "Job completed"
                );
                let event = DomainEvent::JobCompleted {
                    job_id: claim.id.to_string(),
                    cached: result.cached,
                    tokens_used: result.tokens_used,
                    timestamp: Utc::now(),
                };
                job.status = JobStatus::Completed;
                job.result = Some(result);
                job.error = None;
                job.completed_at = Some(Utc::now());
                job.retired_at = Some(now);
                event
            }
            Err(e) if e.is_retryable() && job.attempts < job.max_attempts => {
                let delay = exponential_backoff(
                    job.attempts,
                    self.config.backoff_base(),
                    self.config.backoff_max(),
                );
                warn!(
                    job_id = %claim.id,
                    attempt = claim.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Job attempt failed, retrying"
                );
                job.error = Some(e.user_facing().message().to_string());
                let event = DomainEvent::JobRetryScheduled {
                    job_id: claim.id.to_string(),
                    attempt: job.attempts,
                    delay_ms: delay.as_millis() as u64,
                    timestamp: Utc::now(),
                };
                table.schedule_retry(claim.slot, now + delay);
                event
            }
            Err(e) => {
                let message = e.user_facing().message().to_string();
                warn!(
                    job_id = %claim.id,
                    attempts = job.attempts,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Job failed"
                );
                job.status = JobStatus::Failed;
                job.error = Some(message.clone());
                job.completed_at = Some(Utc::now());
                job.retired_at = Some(now);
                DomainEvent::JobFailed {
                    job_id: claim.id.to_string(),
                    attempts: job.attempts,
                    error_message: message,
                    timestamp: Utc::now(),
                }
            }
        };
        drop(table);

        self.events.publish(event);
    }
}

/// Holds a worker permit and the in-flight count for one running job.
/// Released on drop, so a panicking or aborted task still frees its slot.
struct WorkerSlot {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl WorkerSlot {
    fn occupy(inner: Arc<Inner>, permit: OwnedSemaphorePermit) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            inner,
            _permit: permit,
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
