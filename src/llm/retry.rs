//! Bounded exponential backoff around model calls.

use super::{ModelProvider, ModelRequest};
use crate::error::TransportFailure;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget for one kind of model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately; used in tests.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Call the provider, retrying retryable transport errors per `policy`.
///
/// Non-retryable errors fail immediately. The returned failure records how
/// many attempts were made.
pub async fn complete_with_retry(
    provider: &dyn ModelProvider,
    request: &ModelRequest,
    policy: &RetryPolicy,
) -> Result<String, TransportFailure> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match provider.complete(request).await {
            Ok(text) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", request.model, attempt);
                }
                return Ok(text);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{}/{} attempt {}/{} failed: {}; retrying in {:?}",
                    provider.name(),
                    request.model,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(TransportFailure {
                    attempts: attempt,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::mock::MockProvider;

    fn request() -> ModelRequest {
        ModelRequest {
            model: "test-model".to_string(),
            system: "system".to_string(),
            prompt: "prompt".to_string(),
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(4), Duration::from_secs(3));
        assert_eq!(policy.delay_after(40), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let provider = MockProvider::scripted(vec![
            Err(ModelError::Timeout(1)),
            Err(ModelError::Throttled(429)),
            Ok("done".to_string()),
        ]);

        let out = complete_with_retry(&provider, &request(), &RetryPolicy::immediate(3))
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let provider = MockProvider::scripted(vec![
            Err(ModelError::Timeout(1)),
            Err(ModelError::Timeout(1)),
            Err(ModelError::Timeout(1)),
            Ok("too late".to_string()),
        ]);

        let err = complete_with_retry(&provider, &request(), &RetryPolicy::immediate(3))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let provider = MockProvider::scripted(vec![
            Err(ModelError::Rejected {
                status: 404,
                body: "model not found".into(),
            }),
            Ok("unreachable".to_string()),
        ]);

        let err = complete_with_retry(&provider, &request(), &RetryPolicy::immediate(3))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(provider.calls(), 1);
    }
}
