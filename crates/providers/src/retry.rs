//! Retrying completion client: exponential backoff with jitter.
//!
//! Only transient failures (timeouts, network errors, 5xx) are retried.
//! Anything else returns on the first attempt so a bad key or a malformed
//! request never burns retry budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use studyhall_config::CompletionConfig;
use studyhall_core::backoff::exponential_backoff;
use studyhall_core::error::CompletionError;
use studyhall_core::provider::{CompletionRequest, CompletionResponse};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Add up to a quarter of the delay at random
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &CompletionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base(),
            max_delay: config.retry_max(),
            jitter: true,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = exponential_backoff(retry, self.base_delay, self.max_delay);
        if !self.jitter {
            return delay;
        }
        let spread = (delay.as_millis() / 4) as u64;
        if spread == 0 {
            return delay;
        }
        let extra = Duration::from_millis(rand::rng().random_range(0..=spread));
        (delay + extra).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CompletionConfig::default())
    }
}

/// Wraps a provider and retries its transient failures.
pub struct RetryingProvider {
    inner: Arc<dyn studyhall_core::Provider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn studyhall_core::Provider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl studyhall_core::Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let total = self.policy.max_retries + 1;
        let mut attempt = 1;

        loop {
            let error = match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Completion succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !error.is_retryable() {
                warn!(provider = %self.inner.name(), error = %error, "Non-retryable completion failure");
                return Err(error);
            }

            if attempt >= total {
                warn!(
                    provider = %self.inner.name(),
                    attempts = attempt,
                    error = %error,
                    "Completion retries exhausted"
                );
                return Err(CompletionError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay(attempt);
            warn!(
                provider = %self.inner.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient completion failure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use studyhall_core::Provider;

    /// Replays a fixed script of outcomes, then succeeds.
    struct ScriptedProvider {
        script: Mutex<VecDeque<CompletionError>>,
        call_count: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn new(failures: Vec<CompletionError>) -> Self {
            Self {
                script: Mutex::new(failures.into()),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl studyhall_core::Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, CompletionError> {
            *self.call_count.lock().unwrap() += 1;
            match self.script.lock().unwrap().pop_front() {
                Some(e) => Err(e),
                None => Ok(CompletionResponse {
                    text: "ok".into(),
                    tokens_used: 7,
                    model: request.model,
                }),
            }
        }
    }

    fn server_error() -> CompletionError {
        CompletionError::ApiError {
            status_code: 500,
            message: "boom".into(),
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: true,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test-model".into(),
            messages: vec![],
            temperature: 0.7,
            max_tokens: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            server_error(),
            CompletionError::Timeout("slow".into()),
        ]));
        let provider = RetryingProvider::new(inner.clone(), policy(2));

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_is_not_retried() {
        let inner = Arc::new(ScriptedProvider::new(vec![
            CompletionError::AuthenticationFailed("bad key".into()),
        ]));
        let provider = RetryingProvider::new(inner.clone(), policy(3));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::AuthenticationFailed(_)));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_request_and_rate_limit_are_not_retried() {
        for error in [
            CompletionError::BadRequest("nope".into()),
            CompletionError::RateLimited {
                retry_after_secs: 5,
            },
        ] {
            let inner = Arc::new(ScriptedProvider::new(vec![error]));
            let provider = RetryingProvider::new(inner.clone(), policy(3));
            assert!(provider.complete(request()).await.is_err());
            assert_eq!(inner.calls(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_reports_retry_exhausted() {
        let inner = Arc::new(ScriptedProvider::new(vec![server_error(); 5]));
        let provider = RetryingProvider::new(inner.clone(), policy(2));

        let err = provider.complete(request()).await.unwrap_err();
        match err {
            CompletionError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, CompletionError::ApiError { status_code: 500, .. }));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
        assert_eq!(inner.calls(), 3);
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let policy = policy(5);
        for retry in 1..=8 {
            let plain = exponential_backoff(retry, policy.base_delay, policy.max_delay);
            let delay = policy.delay(retry);
            assert!(delay >= plain);
            assert!(delay <= policy.max_delay);
        }
    }

    #[test]
    fn policy_without_jitter_is_plain_backoff() {
        let policy = RetryPolicy {
            jitter: false,
            ..policy(3)
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }
}
