//! Configuration module for Concierge
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONCIERGE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use concierge::config::ConciergeConfig;
//!
//! // Load defaults
//! let config = ConciergeConfig::default();
//! assert_eq!(config.circuit_breaker.failure_threshold, 5);
//!
//! // Parse from TOML
//! let toml = r#"
//! [retry]
//! max_attempts = 4
//! "#;
//! let config: ConciergeConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.retry.max_attempts, 4);
//! ```

pub mod error;
pub mod escalation;
pub mod knowledge;
pub mod logging;
pub mod provider;
pub mod resilience;

pub use error::ConfigError;
pub use escalation::EscalationConfig;
pub use knowledge::KnowledgeConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use provider::{ProviderConfig, ProviderKind};
pub use resilience::{CircuitBreakerConfig, RetryConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unified configuration for the orchestration layer.
///
/// # Example
///
/// ```rust
/// use concierge::config::{ConciergeConfig, ProviderKind};
///
/// let config = ConciergeConfig::default();
/// assert_eq!(config.primary.kind, ProviderKind::OpenAI);
/// assert_eq!(config.fallback.kind, ProviderKind::Anthropic);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConciergeConfig {
    /// Provider tried first, behind the circuit breaker and retry budget
    pub primary: ProviderConfig,
    /// Provider tried once after the primary path gives up
    pub fallback: ProviderConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub knowledge: KnowledgeConfig,
    pub escalation: EscalationConfig,
    /// Cost overrides in USD per 1K tokens, keyed by model id
    pub pricing: HashMap<String, f64>,
    pub logging: LoggingConfig,
}

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::default_primary(),
            fallback: ProviderConfig::default_fallback(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            knowledge: KnowledgeConfig::default(),
            escalation: EscalationConfig::default(),
            pricing: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ConciergeConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supports CONCIERGE_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("CONCIERGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONCIERGE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(contact) = std::env::var("CONCIERGE_ESCALATION_CONTACT") {
            if !contact.trim().is_empty() {
                self.escalation.contact = contact;
            }
        }

        if let Ok(model) = std::env::var("CONCIERGE_PRIMARY_MODEL") {
            if !model.trim().is_empty() {
                self.primary.model = model;
            }
        }
        if let Ok(model) = std::env::var("CONCIERGE_FALLBACK_MODEL") {
            if !model.trim().is_empty() {
                self.fallback.model = model;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, provider) in [("primary", &self.primary), ("fallback", &self.fallback)] {
            if provider.base_url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("{}.base_url", section),
                    message: "URL cannot be empty".to_string(),
                });
            }
            if provider.model.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("{}.model", section),
                    message: "model cannot be empty".to_string(),
                });
            }
            if provider.api_key.is_none() && provider.api_key_env.is_none() {
                return Err(ConfigError::MissingField(format!(
                    "{}.api_key or {}.api_key_env",
                    section, section
                )));
            }
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Validation {
                field: "circuit_breaker.failure_threshold".to_string(),
                message: "threshold must be at least 1".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "retry.max_attempts".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Validation {
                field: "retry.base_delay_ms".to_string(),
                message: "base delay cannot exceed max_delay_ms".to_string(),
            });
        }

        if let Some((model, rate)) = self.pricing.iter().find(|(_, rate)| **rate < 0.0) {
            return Err(ConfigError::Validation {
                field: format!("pricing.{}", model),
                message: format!("rate cannot be negative ({})", rate),
            });
        }

        Ok(())
    }
}
