//! Error types for provider operations.

use thiserror::Error;

/// Errors that can occur while calling a model provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network connectivity error (DNS, connection refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Provider returned an error response (4xx, 5xx).
    #[error("Provider error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Provider output did not match the expected shape.
    #[error("Failed to parse provider output: {0}")]
    Parse(String),

    /// Operation not offered by this provider.
    #[error("Operation '{0}' not supported by this provider")]
    Unsupported(&'static str),

    /// Provider configuration error (missing key, bad URL).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// True for authentication/authorization rejections (401/403).
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Upstream { status: 401 | 403, .. })
    }

    /// Whether a fresh attempt against the same provider could succeed.
    ///
    /// Timeouts, 5xx, 408, 429, connection failures and malformed output are
    /// worth another attempt. Other 4xx rejections (auth, bad request),
    /// configuration errors and unsupported operations fail the same way
    /// every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Upstream { status, .. } => {
                *status >= 500 || matches!(status, 408 | 429)
            }
            ProviderError::Network(_) | ProviderError::Timeout(_) | ProviderError::Parse(_) => {
                true
            }
            ProviderError::Unsupported(_) | ProviderError::Configuration(_) => false,
        }
    }

    /// Short machine-friendly label used in metric records and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Timeout(_) => "timeout",
            ProviderError::Upstream { .. } if self.is_auth() => "auth",
            ProviderError::Upstream { .. } => "upstream",
            ProviderError::Parse(_) => "parse",
            ProviderError::Unsupported(_) => "unsupported",
            ProviderError::Configuration(_) => "configuration",
        }
    }

    /// Map a reqwest transport failure the way every client in this crate does.
    pub(crate) fn from_transport(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout_ms)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}
