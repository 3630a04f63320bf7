//! Circuit breaker and retry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker settings for the primary provider path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a trial call is allowed
    pub reset_timeout_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_seconds: 60,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_seconds)
    }
}

/// Retry budget for a single provider path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}
