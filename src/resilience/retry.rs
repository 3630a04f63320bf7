//! Bounded retry with exponential backoff.
//!
//! Delay before attempt `n + 1` is `min(base * 2^(n-1), max)`. No jitter is
//! added.

use super::clock::{Sleeper, TokioSleeper};
use crate::config::RetryConfig;
use crate::provider::ProviderError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }
}

/// Retry budget. Constant configuration, shared by every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given failed attempt (1-based).
    ///
    /// ```
    /// use concierge::resilience::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
    /// assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
    /// assert_eq!(policy.delay_after(9), Duration::from_millis(10_000));
    /// ```
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs an operation until it succeeds, fails fatally, or the budget runs out.
#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper (tests record delays instead of waiting).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `operation` up to `max_attempts` times.
    ///
    /// Non-retryable errors are returned from the attempt that produced them.
    /// The last retryable error is returned once the budget is exhausted.
    pub async fn run<T, E, F, Fut>(&self, context: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(context, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::warn!(context, attempt, error = %err, "Non-retryable failure");
                    return Err(err);
                }
                Err(err) if attempt >= self.policy.max_attempts => {
                    tracing::warn!(
                        context,
                        attempts = attempt,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        context,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after failure"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    fn executor(policy: RetryPolicy) -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryExecutor::new(policy).with_sleeper(sleeper.clone());
        (executor, sleeper)
    }

    fn transient() -> ProviderError {
        ProviderError::Upstream {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success_does_not_sleep() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result = executor
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>("done")
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backoff_schedule_then_exhaustion() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        assert_eq!(result, Err(transient()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result = executor
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::Timeout(30_000))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(*sleeper.delays.lock().unwrap(), vec![Duration::from_millis(1000)]);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let (executor, sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Upstream {
                    status: 401,
                    message: "bad key".to_string(),
                })
            })
            .await;

        assert!(result.unwrap_err().is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_is_retried() {
        let (executor, _sleeper) = executor(RetryPolicy::default());
        let calls = AtomicU32::new(0);

        let result = executor
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Parse("not json".to_string()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_delays_are_capped() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        };
        let (executor, sleeper) = executor(policy);

        let _: Result<(), _> = executor.run("test", || async { Err(transient()) }).await;

        let delays: Vec<u64> = sleeper
            .delays
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_sleeps() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let (executor, sleeper) = executor(policy);
        let calls = AtomicU32::new(0);

        let _: Result<(), _> = executor
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_attempt_config_clamps_to_one() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 10,
            max_delay_ms: 100,
        });
        assert_eq!(policy.max_attempts, 1);
    }

    proptest! {
        /// Delays never exceed the cap and never shrink from one attempt to the next.
        #[test]
        fn prop_delay_bounded_and_monotonic(
            base_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            attempt in 1u32..64,
        ) {
            let policy = RetryPolicy {
                max_attempts: 64,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(base_ms + extra_ms),
            };

            let current = policy.delay_after(attempt);
            let next = policy.delay_after(attempt + 1);
            prop_assert!(current <= policy.max_delay);
            prop_assert!(current >= policy.base_delay);
            prop_assert!(next >= current);
        }

        /// The operation runs exactly `max_attempts` times against a persistent transient failure.
        #[test]
        fn prop_attempts_match_budget(max_attempts in 1u32..8) {
            let policy = RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(10),
            };
            let (executor, sleeper) = executor(policy);
            let calls = AtomicU32::new(0);

            let _: Result<(), _> = tokio_test::block_on(executor.run("prop", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            }));

            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
            prop_assert_eq!(sleeper.delays.lock().unwrap().len() as u32, max_attempts - 1);
        }
    }
}
