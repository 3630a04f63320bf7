//! Provider factory for creating ProviderClient trait objects from configuration.

use super::{anthropic::AnthropicProvider, openai::OpenAIProvider, ProviderClient, ProviderError};
use crate::config::{ProviderConfig, ProviderKind};
use reqwest::Client;
use std::sync::Arc;

/// Create a provider from its configuration section.
///
/// The API key comes from `api_key` when set, otherwise from the environment
/// variable named by `api_key_env`.
///
/// # Examples
///
/// ```
/// use concierge::config::ProviderConfig;
/// use concierge::provider::factory::create_provider;
/// use reqwest::Client;
/// use std::sync::Arc;
///
/// let mut config = ProviderConfig::default_primary();
/// config.api_key = Some("sk-test".to_string());
///
/// let provider = create_provider(&config, Arc::new(Client::new())).unwrap();
/// assert_eq!(provider.name(), "openai-primary");
/// assert_eq!(provider.embedding_model(), Some("text-embedding-3-small"));
/// ```
pub fn create_provider(
    config: &ProviderConfig,
    client: Arc<Client>,
) -> Result<Arc<dyn ProviderClient>, ProviderError> {
    let api_key = resolve_api_key(config)?;

    match config.kind {
        ProviderKind::OpenAI => {
            let mut provider = OpenAIProvider::new(
                config.name.clone(),
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                client,
            )
            .with_max_tokens(config.max_tokens)
            .with_timeouts(config.timeouts());
            if let Some(model) = &config.embedding_model {
                provider = provider.with_embedding_model(model.clone());
            }
            if let Some(model) = &config.vision_model {
                provider = provider.with_document_model(model.clone());
            }
            Ok(Arc::new(provider))
        }
        ProviderKind::Anthropic => {
            if config.embedding_model.is_some() {
                tracing::warn!(
                    provider = %config.name,
                    "Anthropic has no embeddings endpoint; embedding_model is ignored"
                );
            }
            let mut provider = AnthropicProvider::new(
                config.name.clone(),
                config.base_url.clone(),
                api_key,
                config.model.clone(),
                client,
            )
            .with_max_tokens(config.max_tokens)
            .with_timeouts(config.timeouts());
            if let Some(model) = &config.vision_model {
                provider = provider.with_document_model(model.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}

fn resolve_api_key(config: &ProviderConfig) -> Result<String, ProviderError> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }
    if let Some(env_var) = &config.api_key_env {
        return std::env::var(env_var).map_err(|e| {
            ProviderError::Configuration(format!(
                "Failed to read API key for '{}' from env var '{}': {}",
                config.name, env_var, e
            ))
        });
    }
    Err(ProviderError::Configuration(format!(
        "Provider '{}' requires 'api_key' or 'api_key_env'",
        config.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Arc<Client> {
        Arc::new(Client::new())
    }

    #[test]
    fn test_create_openai_provider_with_direct_key() {
        let mut config = ProviderConfig::default_primary();
        config.api_key = Some("sk-test123".to_string());

        let provider = create_provider(&config, test_client()).unwrap();

        assert_eq!(provider.name(), "openai-primary");
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.document_model(), "gpt-4o");
    }

    #[test]
    fn test_create_anthropic_provider_without_embeddings() {
        let mut config = ProviderConfig::default_fallback();
        config.api_key = Some("sk-ant".to_string());

        let provider = create_provider(&config, test_client()).unwrap();

        assert_eq!(provider.embedding_model(), None);
        assert_eq!(provider.document_model(), "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn test_create_provider_with_env_key() {
        std::env::set_var("CONCIERGE_TEST_FACTORY_KEY", "sk-from-env");
        let mut config = ProviderConfig::default_primary();
        config.api_key_env = Some("CONCIERGE_TEST_FACTORY_KEY".to_string());

        let result = create_provider(&config, test_client());
        std::env::remove_var("CONCIERGE_TEST_FACTORY_KEY");

        assert!(result.is_ok());
    }

    #[test]
    fn test_create_provider_missing_env_var() {
        let mut config = ProviderConfig::default_fallback();
        config.api_key_env = Some("CONCIERGE_TEST_DEFINITELY_UNSET".to_string());

        let result = create_provider(&config, test_client());

        match result {
            Err(ProviderError::Configuration(msg)) => {
                assert!(msg.contains("CONCIERGE_TEST_DEFINITELY_UNSET"))
            }
            _ => panic!("expected configuration error"),
        }
    }

    #[test]
    fn test_create_provider_without_key_source() {
        let mut config = ProviderConfig::default_primary();
        config.api_key_env = None;

        assert!(matches!(
            create_provider(&config, test_client()),
            Err(ProviderError::Configuration(_))
        ));
    }
}
