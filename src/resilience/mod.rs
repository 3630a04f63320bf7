//! Reliability primitives for outbound provider calls.
//!
//! - [`CircuitBreaker`] stops calling a dependency after repeated failures
//! - [`RetryExecutor`] retries retryable failures with exponential backoff
//! - [`Clock`] and [`Sleeper`] make both deterministic under test
//!
//! The orchestrator composes them as `breaker.execute(|| retry.run(..))`, so a
//! whole retry sequence counts as a single call from the breaker's view.

pub mod circuit_breaker;
pub mod clock;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitOpenError, CircuitSnapshot, CircuitState};
pub use clock::{Clock, ManualClock, Sleeper, SystemClock, TokioSleeper};
pub use retry::{RetryExecutor, RetryPolicy, Retryable};
