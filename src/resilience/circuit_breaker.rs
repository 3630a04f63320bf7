//! Circuit breaker for a single dependency path.
//!
//! ```text
//!            failure_count >= threshold
//!   Closed ─────────────────────────────▶ Open
//!     ▲                                   │  ▲
//!     │ success                 timeout   │  │ failure
//!     │                         elapsed   ▼  │
//!     └────────────────────────────── HalfOpen
//! ```
//!
//! While open, calls fail with [`CircuitOpenError`] without touching the
//! network. State lives behind a mutex that is released before the wrapped
//! operation is awaited, so concurrent callers never hold it across I/O.

use super::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Raised instead of calling the dependency while the circuit is open.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circuit '{breaker}' is open; next trial in {}ms", retry_in.as_millis())]
pub struct CircuitOpenError {
    pub breaker: String,
    pub retry_in: Duration,
}

/// Point-in-time copy of the breaker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Guards one dependency path (one instance per provider).
///
/// Shared as `Arc<CircuitBreaker>` by every in-flight request on that path.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            clock: Arc::new(SystemClock),
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Replace the time source (tests drive this with a `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure: inner.last_failure,
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns `E::from(CircuitOpenError)` without invoking `operation` while
    /// the circuit is open. Otherwise the operation's own result is returned
    /// unchanged after the outcome has been recorded.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError> + fmt::Display,
    {
        self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let now = self.clock.now();
        let mut inner = self.lock();

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner
            .last_failure
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(self.reset_timeout);

        if elapsed < self.reset_timeout {
            return Err(CircuitOpenError {
                breaker: self.name.clone(),
                retry_in: self.reset_timeout - elapsed,
            });
        }

        inner.state = CircuitState::HalfOpen;
        tracing::info!(
            breaker = %self.name,
            failure_count = inner.failure_count,
            "Circuit breaker transitioned to HALF-OPEN"
        );
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
            tracing::info!(breaker = %self.name, "Circuit breaker closed after successful trial call");
        }
    }

    fn record_failure(&self, error: &dyn fmt::Display) {
        let now = self.clock.now();
        let mut inner = self.lock();

        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(now);

        if inner.state != CircuitState::Open && inner.failure_count >= self.failure_threshold {
            let previous = inner.state;
            inner.state = CircuitState::Open;
            tracing::error!(
                breaker = %self.name,
                from = %previous,
                failure_count = inner.failure_count,
                error = %error,
                "Circuit breaker OPENED"
            );
        } else {
            tracing::debug!(
                breaker = %self.name,
                failure_count = inner.failure_count,
                error = %error,
                "Circuit breaker recorded failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Open,
        Boom,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl From<CircuitOpenError> for TestError {
        fn from(_: CircuitOpenError) -> Self {
            TestError::Open
        }
    }

    fn breaker(threshold: u32, clock: Arc<ManualClock>) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            &CircuitBreakerConfig {
                failure_threshold: threshold,
                reset_timeout_seconds: 60,
            },
        )
        .with_clock(clock)
    }

    async fn fail(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<(), TestError> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError::Boom)
        })
        .await
    }

    async fn succeed(cb: &CircuitBreaker, calls: &AtomicU32) -> Result<u32, TestError> {
        cb.execute(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>(7)
        })
        .await
    }

    #[tokio::test]
    async fn test_starts_closed() {
        let cb = breaker(5, Arc::new(ManualClock::new()));
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.last_failure, None);
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        let cb = breaker(5, Arc::new(ManualClock::new()));
        let calls = AtomicU32::new(0);

        assert_eq!(fail(&cb, &calls).await, Err(TestError::Boom));
        assert_eq!(cb.snapshot().failure_count, 1);
        assert!(cb.snapshot().last_failure.is_some());
    }

    #[tokio::test]
    async fn test_opens_on_threshold_and_short_circuits() {
        let cb = breaker(5, Arc::new(ManualClock::new()));
        let calls = AtomicU32::new(0);

        for i in 1..=4 {
            let _ = fail(&cb, &calls).await;
            assert_eq!(cb.state(), CircuitState::Closed, "still closed after {}", i);
        }
        let _ = fail(&cb, &calls).await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // Sixth call: rejected without invoking the operation
        assert_eq!(succeed(&cb, &calls).await, Err(TestError::Open));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_open_error_reports_remaining_time() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(1, clock.clone());
        let calls = AtomicU32::new(0);

        let _ = fail(&cb, &calls).await;
        clock.advance(Duration::from_secs(45));

        let result: Result<(), CircuitOpenError> = cb.execute(|| async { Ok(()) }).await;
        let err = result.unwrap_err();
        assert_eq!(err.breaker, "test");
        assert_eq!(err.retry_in, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_half_open_success_closes_and_resets() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(5, clock.clone());
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = fail(&cb, &calls).await;
        }
        clock.advance(Duration::from_secs(60));

        assert_eq!(succeed(&cb, &calls).await, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(5, clock.clone());
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = fail(&cb, &calls).await;
        }
        let opened_at = cb.snapshot().last_failure.unwrap();
        clock.advance(Duration::from_secs(61));

        assert_eq!(fail(&cb, &calls).await, Err(TestError::Boom));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(snapshot.last_failure.unwrap() > opened_at);

        // The fresh timestamp restarts the cooldown
        assert_eq!(succeed(&cb, &calls).await, Err(TestError::Open));
    }

    #[tokio::test]
    async fn test_success_while_closed_keeps_count() {
        let cb = breaker(5, Arc::new(ManualClock::new()));
        let calls = AtomicU32::new(0);

        let _ = fail(&cb, &calls).await;
        let _ = succeed(&cb, &calls).await;

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failure_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_all_counted() {
        let cb = Arc::new(breaker(1000, Arc::new(ManualClock::new())));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..200 {
            let cb = Arc::clone(&cb);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                let _ = cb
                    .execute(|| async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Err::<(), _>(TestError::Boom)
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cb.snapshot().failure_count, 200);
        assert_eq!(calls.load(Ordering::SeqCst), 200);
    }
}
