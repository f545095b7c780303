//! Queue error types.

use std::time::Duration;

use studyhall_core::error::{CompletionError, FailureClass, StoreError, UserFacingError};
use thiserror::Error;

/// Errors returned to callers of the submission path.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job queue is shutting down")]
    ShuttingDown,
}

impl From<QueueError> for studyhall_core::Error {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::InvalidInput(msg) => studyhall_core::Error::InvalidInput(msg),
            QueueError::ShuttingDown => studyhall_core::Error::Internal(e.to_string()),
        }
    }
}

/// Why a single job attempt failed.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Persisting the reply failed: {0}")]
    Store(#[from] StoreError),

    #[error("Job attempt timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Job attempt panicked: {0}")]
    Panicked(String),
}

impl AttemptError {
    /// Whether another attempt may succeed.
    ///
    /// A completion client that already exhausted its own retries still
    /// counts: the queue's backoff is much longer.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::Completion(e) => matches!(
                e.failure_class(),
                FailureClass::Transient | FailureClass::Exhausted
            ),
            AttemptError::Store(_) | AttemptError::TimedOut(_) | AttemptError::Panicked(_) => {
                true
            }
        }
    }

    pub fn user_facing(&self) -> UserFacingError {
        match self {
            AttemptError::Completion(e) => e.user_facing(),
            _ => UserFacingError::TemporarilyUnavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_is_final() {
        let e = AttemptError::from(CompletionError::AuthenticationFailed("bad".into()));
        assert!(!e.is_retryable());
        assert_eq!(e.user_facing(), UserFacingError::AuthenticationFailed);
    }

    #[test]
    fn server_errors_timeouts_and_store_failures_retry() {
        let server = AttemptError::from(CompletionError::ApiError {
            status_code: 503,
            message: "down".into(),
        });
        assert!(server.is_retryable());
        assert!(AttemptError::TimedOut(Duration::from_secs(60)).is_retryable());
        assert!(AttemptError::from(StoreError::Storage("disk".into())).is_retryable());
        assert!(AttemptError::Panicked("boom".into()).is_retryable());
        assert_eq!(server.user_facing(), UserFacingError::TemporarilyUnavailable);
    }

    #[test]
    fn exhausted_client_retries_are_retried_by_the_queue() {
        let e = AttemptError::from(CompletionError::RetryExhausted {
            attempts: 3,
            last: Box::new(CompletionError::Network("reset".into())),
        });
        assert!(e.is_retryable());
    }
}
