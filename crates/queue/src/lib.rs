//! Asynchronous reply generation for StudyHall.
//!
//! [`JobQueue`] accepts jobs without blocking, runs at most `concurrency` of
//! them at once (highest priority first, FIFO within a priority) and retries
//! transient failures with exponential backoff. [`ResponseOrchestrator`]
//! puts the decision engine in front of it.

pub mod error;
pub mod job;
pub mod orchestrator;
pub mod prompt;
pub mod queue;
mod table;

pub use error::{AttemptError, QueueError};
pub use job::{Job, JobId, JobPayload, JobResult, JobStatus, JobView};
pub use orchestrator::{HandledMessage, ResponseOrchestrator, channel_for};
pub use prompt::{CompletionSettings, build_request};
pub use queue::JobQueue;
pub use table::QueueStats;
