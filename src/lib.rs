//! Concierge - resilient AI request orchestration
//!
//! Turns unreliable, rate-limited model providers into a dependable chat,
//! embedding and document-analysis service: a circuit breaker and bounded
//! retry on the primary provider, a single-attempt fallback provider, a
//! deterministic degraded answer when both fail, and per-call cost metering.

pub mod cli;
pub mod config;
pub mod knowledge;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod resilience;
