//! Anthropic Claude provider implementation.
//!
//! Translates the provider capability into the Anthropic Messages API format.
//! Anthropic has no embeddings endpoint, so `embed` keeps the default
//! `Unsupported` behavior.

use super::{ChatTurn, Completion, DocumentRef, ProviderClient, ProviderError, ProviderTimeouts};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic provider implementation.
///
/// Handles Anthropic Claude API calls with API key authentication:
/// - Chat completion via POST /v1/messages with x-api-key header
/// - Document analysis via POST /v1/messages with image/document content blocks
pub struct AnthropicProvider {
    /// Human-readable name
    name: String,
    /// Base URL (e.g., "https://api.anthropic.com")
    base_url: String,
    /// API key for x-api-key authentication
    api_key: String,
    model: String,
    document_model: Option<String>,
    max_tokens: u32,
    timeouts: ProviderTimeouts,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl AnthropicProvider {
    pub fn new(
        name: String,
        base_url: String,
        api_key: String,
        model: String,
        client: Arc<Client>,
    ) -> Self {
        Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            document_model: None,
            max_tokens: 1024,
            timeouts: ProviderTimeouts::default(),
            client,
        }
    }

    pub fn with_document_model(mut self, model: impl Into<String>) -> Self {
        self.document_model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ProviderTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn text_block(text: &str) -> AnthropicContent {
        AnthropicContent::Text {
            text: text.to_string(),
        }
    }

    /// Translate history plus the new message into Anthropic messages.
    ///
    /// The system prompt travels in its own top-level field, not as a message.
    fn translate_messages(history: &[ChatTurn], message: &str) -> Vec<AnthropicMessage> {
        history
            .iter()
            .map(|turn| AnthropicMessage {
                role: turn.role.as_str().to_string(),
                content: vec![Self::text_block(&turn.content)],
            })
            .chain(std::iter::once(AnthropicMessage {
                role: "user".to_string(),
                content: vec![Self::text_block(message)],
            }))
            .collect()
    }

    fn document_block(document: &DocumentRef) -> AnthropicContent {
        let source = AnthropicSource::Url {
            url: document.url.clone(),
        };
        if document.is_pdf() {
            AnthropicContent::Document { source }
        } else {
            AnthropicContent::Image { source }
        }
    }

    async fn post_messages(
        &self,
        request: &AnthropicRequest,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let timeout_ms = timeout.as_millis() as u64;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                tracing::warn!(provider = %self.name, status = %status, "Anthropic authentication failed");
            }
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let response: AnthropicResponse = response.json().await.map_err(|e| {
            ProviderError::Parse(format!("Failed to parse Anthropic response: {}", e))
        })?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::Parse(
                "Anthropic response contained no text".to_string(),
            ));
        }

        Ok(Completion {
            text,
            model: response.model,
            tokens: Some(response.usage.input_tokens + response.usage.output_tokens),
        })
    }
}

/// Anthropic request format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AnthropicContent {
    Text { text: String },
    Image { source: AnthropicSource },
    Document { source: AnthropicSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum AnthropicSource {
    Url { url: String },
}

/// Anthropic response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentResponse>,
    model: String,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentResponse {
    /// Absent for non-text blocks.
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl ProviderClient for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn document_model(&self) -> &str {
        self.document_model.as_deref().unwrap_or(&self.model)
    }

    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<Completion, ProviderError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            messages: Self::translate_messages(history, message),
            system: Some(system_prompt.to_string()),
            max_tokens: self.max_tokens,
        };

        self.post_messages(&request, self.timeouts.completion).await
    }

    async fn analyze_document(
        &self,
        system_prompt: &str,
        document: &DocumentRef,
        instructions: &str,
    ) -> Result<Completion, ProviderError> {
        let request = AnthropicRequest {
            model: self.document_model().to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: vec![Self::document_block(document), Self::text_block(instructions)],
            }],
            system: Some(system_prompt.to_string()),
            max_tokens: self.max_tokens,
        };

        self.post_messages(&request, self.timeouts.document).await
    }
}
