//! Completion client implementations for StudyHall.
//!
//! All providers implement the `studyhall_core::Provider` trait.
//! [`build_provider`] wires the configured endpoint behind the retry policy.

pub mod openai_compat;
pub mod retry;

use std::sync::Arc;

use studyhall_config::AppConfig;
use studyhall_core::CompletionError;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryingProvider};

/// The configured completion client, retries included.
pub fn build_provider(
    config: &AppConfig,
) -> Result<Arc<dyn studyhall_core::Provider>, CompletionError> {
    let client = OpenAiCompatProvider::from_config(config)?;
    Ok(Arc::new(RetryingProvider::new(
        Arc::new(client),
        RetryPolicy::from_config(&config.completion),
    )))
}
