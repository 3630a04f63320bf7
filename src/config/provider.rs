//! Provider configuration

use crate::provider::ProviderTimeouts;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI or any OpenAI-compatible endpoint
    #[serde(alias = "open_ai")]
    OpenAI,
    /// Anthropic Messages API
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "open_ai" => Ok(ProviderKind::OpenAI),
            "anthropic" => Ok(ProviderKind::Anthropic),
            _ => Err(format!("Invalid provider kind: {}", s)),
        }
    }
}

/// One model provider (primary or fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub name: String,
    pub base_url: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,
    /// Inline API key. Prefer `api_key_env` outside of tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_timeout_seconds: u64,
    #[serde(default = "default_document_timeout")]
    pub document_timeout_seconds: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_completion_timeout() -> u64 {
    30
}

fn default_embedding_timeout() -> u64 {
    10
}

fn default_document_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1024
}

impl ProviderConfig {
    /// Default primary: OpenAI with embeddings and vision.
    pub fn default_primary() -> Self {
        Self {
            kind: ProviderKind::OpenAI,
            name: "openai-primary".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            embedding_model: Some("text-embedding-3-small".to_string()),
            vision_model: Some("gpt-4o".to_string()),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            completion_timeout_seconds: default_completion_timeout(),
            embedding_timeout_seconds: default_embedding_timeout(),
            document_timeout_seconds: default_document_timeout(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Default fallback: Anthropic, a different model family from the primary.
    pub fn default_fallback() -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            name: "anthropic-fallback".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-haiku-20241022".to_string(),
            embedding_model: None,
            vision_model: Some("claude-3-5-sonnet-20241022".to_string()),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            completion_timeout_seconds: default_completion_timeout(),
            embedding_timeout_seconds: default_embedding_timeout(),
            document_timeout_seconds: default_document_timeout(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn timeouts(&self) -> ProviderTimeouts {
        ProviderTimeouts {
            completion: Duration::from_secs(self.completion_timeout_seconds),
            embedding: Duration::from_secs(self.embedding_timeout_seconds),
            document: Duration::from_secs(self.document_timeout_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!(ProviderKind::from_str("OpenAI").unwrap(), ProviderKind::OpenAI);
        assert_eq!(
            ProviderKind::from_str("anthropic").unwrap(),
            ProviderKind::Anthropic
        );
        assert!(ProviderKind::from_str("cohere").is_err());
    }

    #[test]
    fn test_provider_config_timeout_defaults() {
        let toml = r#"
        kind = "anthropic"
        name = "claude"
        base_url = "https://api.anthropic.com"
        model = "claude-3-haiku-20240307"
        "#;

        let config: ProviderConfig = toml::from_str(toml).unwrap();
        let timeouts = config.timeouts();
        assert_eq!(timeouts.completion, Duration::from_secs(30));
        assert_eq!(timeouts.embedding, Duration::from_secs(10));
        assert!(timeouts.completion > timeouts.embedding);
        assert_eq!(config.max_tokens, 1024);
    }

    #[test]
    fn test_default_pair_uses_different_families() {
        let primary = ProviderConfig::default_primary();
        let fallback = ProviderConfig::default_fallback();
        assert_ne!(primary.kind, fallback.kind);
        assert!(primary.embedding_model.is_some());
    }
}
