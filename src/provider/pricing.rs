//! Cost estimation for model calls.
//!
//! Every model is billed at a single blended rate in USD per 1K tokens, which is
//! what the metrics collector needs to put a dollar figure on each call.
//! Built-in rates are hardcoded and must be manually updated when providers
//! change their pricing; deployments can override or extend them through the
//! `[pricing]` config section.
//!
//! ## Example
//!
//! ```rust
//! use concierge::provider::pricing::ModelCostTable;
//!
//! let table = ModelCostTable::new();
//! let cost = table.estimate_cost("gpt-4o", 2000);
//! assert_eq!(cost, Some(0.01)); // (2000/1000) * $0.005
//! ```

use std::collections::HashMap;
use std::sync::Arc;

/// Cost-per-1K-token table shared by every metric finalization.
///
/// Initialized once at startup; cloning is cheap (the map sits behind an `Arc`).
#[derive(Debug, Clone)]
pub struct ModelCostTable {
    rates: Arc<HashMap<String, f64>>,
}

impl ModelCostTable {
    /// Create a table with the built-in rates.
    pub fn new() -> Self {
        let mut rates = HashMap::new();

        // OpenAI
        rates.insert("gpt-4o".to_string(), 0.005);
        rates.insert("gpt-4o-mini".to_string(), 0.0003);
        rates.insert("gpt-4-turbo".to_string(), 0.01);
        rates.insert("text-embedding-3-small".to_string(), 0.00002);
        rates.insert("text-embedding-3-large".to_string(), 0.00013);

        // Anthropic
        rates.insert("claude-3-5-sonnet-20241022".to_string(), 0.003);
        rates.insert("claude-3-5-haiku-20241022".to_string(), 0.0008);
        rates.insert("claude-3-haiku-20240307".to_string(), 0.00025);

        Self {
            rates: Arc::new(rates),
        }
    }

    /// Build a table from explicit rates only (no built-ins).
    pub fn from_rates(rates: HashMap<String, f64>) -> Self {
        Self {
            rates: Arc::new(rates),
        }
    }

    /// Return a copy of this table with `overrides` layered on top.
    pub fn with_overrides(&self, overrides: &HashMap<String, f64>) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        let mut rates = (*self.rates).clone();
        for (model, rate) in overrides {
            rates.insert(model.clone(), *rate);
        }
        Self {
            rates: Arc::new(rates),
        }
    }

    /// Estimate cost in USD for `tokens` billed against `model`.
    ///
    /// Returns `None` if the model is not in the table.
    pub fn estimate_cost(&self, model: &str, tokens: u32) -> Option<f64> {
        self.rates
            .get(model)
            .map(|rate| (tokens as f64 / 1000.0) * rate)
    }

    /// Rate per 1K tokens for a model.
    pub fn rate(&self, model: &str) -> Option<f64> {
        self.rates.get(model).copied()
    }

    pub fn has_pricing(&self, model: &str) -> bool {
        self.rates.contains_key(model)
    }
}

impl Default for ModelCostTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_derivation() {
        let table = ModelCostTable::from_rates(HashMap::from([("m".to_string(), 0.005)]));

        // (2000/1000) * 0.005 = 0.01
        let cost = table.estimate_cost("m", 2000).unwrap();
        assert!((cost - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model() {
        let table = ModelCostTable::new();
        assert_eq!(table.estimate_cost("unknown-model", 1000), None);
        assert!(!table.has_pricing("unknown-model"));
    }

    #[test]
    fn test_zero_tokens() {
        let table = ModelCostTable::new();
        assert_eq!(table.estimate_cost("gpt-4o", 0), Some(0.0));
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let table = ModelCostTable::new();
        let overrides = HashMap::from([
            ("gpt-4o".to_string(), 0.0025),
            ("local-llama".to_string(), 0.0),
        ]);

        let merged = table.with_overrides(&overrides);

        assert_eq!(merged.rate("gpt-4o"), Some(0.0025));
        assert_eq!(merged.rate("local-llama"), Some(0.0));
        assert!(merged.has_pricing("claude-3-haiku-20240307"));
        // Original untouched
        assert_eq!(table.rate("gpt-4o"), Some(0.005));
    }
}
