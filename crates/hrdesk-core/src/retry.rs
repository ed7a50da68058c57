//! Timeouts and bounded retries for provider calls.
//!
//! Every embedding and generation request goes through [`RetryPolicy::call`]:
//! each attempt is raced against a timeout, and transient failures are
//! retried with exponential backoff. Store operations are not retried.

use crate::config::{
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF, DEFAULT_PROVIDER_TIMEOUT,
};
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Timeout and backoff settings for one kind of provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts including the first one; `1` disables retries.
    pub max_attempts: u32,
    /// Sleep before the first retry, doubled after each further failure.
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,
    /// Upper bound for a single attempt.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            timeout,
            ..Self::default()
        }
    }

    /// Backoff to sleep after failed attempt number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `operation` names the call in logs and in timeout errors.
    pub async fn call<T, E, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, ProviderError>
    where
        E: Into<ProviderError>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(inner) => inner.map_err(Into::into),
                Err(_) => Err(ProviderError::Timeout {
                    operation,
                    after: self.timeout,
                }),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            attempt += 1;
            if attempt >= attempts || !error.is_transient() {
                return Err(error);
            }

            let backoff = self.backoff_for(attempt - 1);
            warn!(
                operation,
                attempt,
                max_attempts = attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Provider call failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingError, GenerationError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_for(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .call("generate", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(GenerationError::Http {
                            status: 503,
                            message: "overloaded".into(),
                        })
                    } else {
                        Ok("answer")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(5)
            .call("embed", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(EmbeddingError::InferenceFailed("bad weights".into())) }
            })
            .await;
        assert!(matches!(result, Err(ProviderError::Embedding(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy(3)
            .call("generate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GenerationError::Transport("reset".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out() {
        let policy = RetryPolicy::no_retry(Duration::from_secs(5));
        let result: Result<(), _> = policy
            .call("generate", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<(), GenerationError>(())
            })
            .await;
        assert!(matches!(
            result,
            Err(ProviderError::Timeout {
                operation: "generate",
                ..
            })
        ));
    }

    #[test]
    fn test_policy_serializes_millis() {
        let json = serde_json::to_value(fast_policy(2)).unwrap();
        assert_eq!(json["timeout"], 200);
        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, fast_policy(2));
    }
}
