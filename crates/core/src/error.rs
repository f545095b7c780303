//! Error types for the StudyHall domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error enum; the top-level
//! [`Error`] wraps them.

use thiserror::Error;

/// The top-level error type for StudyHall operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion client errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Real-time delivery errors ---
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    // --- Persistent store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Caller errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Completion client ---

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        last: Box<CompletionError>,
    },
}

/// How a failure should be treated by anything that retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Timeout, network error or 5xx. Worth another attempt after a backoff.
    Transient,
    /// Authentication, authorization or malformed request. Never retried.
    NonRetryable,
    /// A retrying client already gave up on a transient failure.
    Exhausted,
}

impl CompletionError {
    /// Classify this failure for retry decisions.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            CompletionError::Timeout(_) | CompletionError::Network(_) => FailureClass::Transient,
            CompletionError::ApiError { status_code, .. } if *status_code >= 500 => {
                FailureClass::Transient
            }
            CompletionError::RetryExhausted { .. } => FailureClass::Exhausted,
            CompletionError::ApiError { .. }
            | CompletionError::RateLimited { .. }
            | CompletionError::AuthenticationFailed(_)
            | CompletionError::BadRequest(_)
            | CompletionError::NotConfigured(_) => FailureClass::NonRetryable,
        }
    }

    /// Whether a client-level retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        self.failure_class() == FailureClass::Transient
    }

    /// Collapse the upstream failure into the category shown to end users.
    pub fn user_facing(&self) -> UserFacingError {
        match self {
            CompletionError::RateLimited { .. } => UserFacingError::RateLimited,
            CompletionError::AuthenticationFailed(_) => UserFacingError::AuthenticationFailed,
            CompletionError::ApiError { status_code, .. } if *status_code == 429 => {
                UserFacingError::RateLimited
            }
            CompletionError::ApiError { status_code, .. }
                if *status_code == 401 || *status_code == 403 =>
            {
                UserFacingError::AuthenticationFailed
            }
            CompletionError::RetryExhausted { last, .. } => match last.user_facing() {
                UserFacingError::RateLimited => UserFacingError::RateLimited,
                _ => UserFacingError::TemporarilyUnavailable,
            },
            _ => UserFacingError::TemporarilyUnavailable,
        }
    }
}

/// The only failure categories that ever reach an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFacingError {
    RateLimited,
    AuthenticationFailed,
    TemporarilyUnavailable,
}

impl UserFacingError {
    /// Friendly text for this category.
    pub fn message(&self) -> &'static str {
        match self {
            UserFacingError::RateLimited => {
                "The AI assistant is receiving too many requests right now. Please try again in a moment."
            }
            UserFacingError::AuthenticationFailed => {
                "The AI assistant could not authenticate with its provider. Please contact an administrator."
            }
            UserFacingError::TemporarilyUnavailable => {
                "The AI assistant is temporarily unavailable. Please try again later."
            }
        }
    }
}

impl std::fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// --- Real-time transport ---

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("No live subscribers reachable on {channel}")]
    NoRecipients { channel: String },

    #[error("Publish to {channel} failed: {reason}")]
    PublishFailed { channel: String, reason: String },

    #[error("Membership of {channel} unavailable: {reason}")]
    MembershipUnavailable { channel: String, reason: String },
}

// --- Persistent store ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}
