//! Error types for orchestrator operations.

use crate::provider::ProviderError;
use crate::resilience::{CircuitOpenError, Retryable};
use thiserror::Error;

/// Errors returned by `embed` and `analyze_document`.
///
/// `chat` never returns these; it degrades instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Primary path short-circuited by its breaker.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Primary path and fallback both failed.
    #[error("All providers failed (primary: {primary}; fallback: {fallback})")]
    AllProvidersFailed {
        primary: Box<OrchestratorError>,
        fallback: ProviderError,
    },
}

impl OrchestratorError {
    /// Short label for metric records and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::CircuitOpen(_) => "circuit_open",
            OrchestratorError::Provider(e) => e.kind(),
            OrchestratorError::AllProvidersFailed { .. } => "all_providers_failed",
        }
    }
}

impl Retryable for OrchestratorError {
    fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}
