// src/provider/retry.rs — Bounded retry policy for provider calls
//
// Retries transient failures only: rate limits, 5xx-equivalents, timeouts,
// connection resets. Auth failures and malformed responses fail immediately.
// The policy is an explicit value passed into the call site, so it is
// testable with counting closures and no network.

use std::future::Future;
use std::time::Duration;

use crate::infra::config::RetryConfig;
use crate::infra::errors::ArenaError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. 2 means one automatic retry.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// `op` receives the 0-indexed attempt number.
    pub async fn run<T, Fut>(&self, mut op: impl FnMut(u32) -> Fut) -> Result<T, ArenaError>
    where
        Fut: Future<Output = Result<T, ArenaError>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if !e.is_retriable() || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Retrying after error: {}",
                        e
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_backoff(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    fn transient() -> ArenaError {
        ArenaError::Provider {
            provider: "test".into(),
            message: "HTTP 503".into(),
            retriable: true,
        }
    }

    fn permanent() -> ArenaError {
        ArenaError::Provider {
            provider: "test".into(),
            message: "HTTP 401".into(),
            retriable: false,
        }
    }

    #[tokio::test]
    async fn first_attempt_success_makes_one_call() {
        let mut calls = 0u32;
        let result = zero_backoff(2)
            .run(|_| {
                calls += 1;
                async { Ok::<_, ArenaError>(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn transient_failure_retries_once_then_succeeds() {
        let mut calls = 0u32;
        let result = zero_backoff(2)
            .run(|attempt| {
                calls += 1;
                async move {
                    if attempt == 0 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let mut calls = 0u32;
        let result: Result<u32, _> = zero_backoff(2)
            .run(|_| {
                calls += 1;
                async { Err(permanent()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let mut calls = 0u32;
        let result: Result<u32, _> = zero_backoff(2)
            .run(|_| {
                calls += 1;
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn from_config_clamps_zero_attempts_to_one() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 0,
            backoff_ms: 0,
        });
        assert_eq!(policy.max_attempts, 1);

        let mut calls = 0u32;
        let _: Result<(), _> = policy
            .run(|_| {
                calls += 1;
                async { Err(transient()) }
            })
            .await;
        assert_eq!(calls, 1);
    }
}
