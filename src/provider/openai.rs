//! OpenAI-compatible provider implementation.

use super::{
    ChatTurn, Completion, DocumentRef, Embedding, ProviderClient, ProviderError, ProviderTimeouts,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// OpenAI provider implementation.
///
/// Handles OpenAI (and OpenAI-compatible) API calls with Bearer authentication:
/// - Chat completion via POST /v1/chat/completions in JSON mode
/// - Embeddings via POST /v1/embeddings
/// - Document analysis via chat completion with image/file content parts
pub struct OpenAIProvider {
    /// Human-readable name
    name: String,
    /// Base URL (e.g., "https://api.openai.com")
    base_url: String,
    /// API key for Bearer authentication
    api_key: String,
    /// Chat model
    model: String,
    /// Embedding model (None disables `embed`)
    embedding_model: Option<String>,
    /// Vision model for document analysis (defaults to the chat model)
    document_model: Option<String>,
    /// Completion token ceiling
    max_tokens: u32,
    timeouts: ProviderTimeouts,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
}

impl OpenAIProvider {
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
            embedding_model: None,
            document_model: None,
            max_tokens: 1024,
            timeouts: ProviderTimeouts::default(),
            client,
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
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

    fn build_messages(system_prompt: &str, history: &[ChatTurn], message: &str) -> Vec<OpenAIMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: json!(system_prompt),
        });
        messages.extend(history.iter().map(|turn| OpenAIMessage {
            role: turn.role.as_str().to_string(),
            content: json!(turn.content),
        }));
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: json!(message),
        });
        messages
    }

    /// Content part carrying the document itself.
    ///
    /// Images may be remote URLs. PDFs must be inlined as a base64 `data:`
    /// URL; the API cannot fetch a remote PDF.
    fn document_part(document: &DocumentRef) -> Result<serde_json::Value, ProviderError> {
        if !document.is_pdf() {
            return Ok(json!({ "type": "image_url", "image_url": { "url": document.url } }));
        }
        if !document.url.starts_with("data:") {
            return Err(ProviderError::Unsupported("remote PDF document"));
        }
        Ok(json!({
            "type": "file",
            "file": { "filename": "document.pdf", "file_data": document.url }
        }))
    }

    async fn post_chat(
        &self,
        request: &OpenAIChatRequest,
        timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let timeout_ms = timeout.as_millis() as u64;

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: OpenAIChatResponse = response.json().await.map_err(|e| {
            ProviderError::Parse(format!("Failed to parse completion response: {}", e))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("Completion contained no message".to_string()))?;

        Ok(Completion {
            text,
            model: completion.model.unwrap_or_else(|| request.model.clone()),
            tokens: completion.usage.map(|u| u.total_tokens),
        })
    }
}

/// OpenAI chat request format
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    /// Plain string, or an array of content parts for document analysis.
    content: serde_json::Value,
}

/// OpenAI chat response format
#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u32,
}

/// OpenAI /v1/embeddings response format
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: Option<String>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl ProviderClient for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
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
        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages: Self::build_messages(system_prompt, history, message),
            max_tokens: self.max_tokens,
            response_format: json!({ "type": "json_object" }),
        };

        self.post_chat(&request, self.timeouts.completion).await
    }

    async fn embed(&self, text: &str) -> Result<Embedding, ProviderError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(ProviderError::Unsupported("embed"))?;

        let url = format!("{}/v1/embeddings", self.base_url);
        let timeout = self.timeouts.embedding;
        let timeout_ms = timeout.as_millis() as u64;

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": model, "input": text }))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, timeout_ms))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Upstream {
                status,
                message: error_body,
            });
        }

        let body: OpenAIEmbeddingResponse = response.json().await.map_err(|e| {
            ProviderError::Parse(format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::Parse("Missing embedding data".to_string()))?;

        Ok(Embedding {
            vector,
            model: body.model.unwrap_or_else(|| model.to_string()),
            tokens: body.usage.map(|u| u.total_tokens),
        })
    }

    async fn analyze_document(
        &self,
        system_prompt: &str,
        document: &DocumentRef,
        instructions: &str,
    ) -> Result<Completion, ProviderError> {
        let messages = vec![
            OpenAIMessage {
                role: "system".to_string(),
                content: json!(system_prompt),
            },
            OpenAIMessage {
                role: "user".to_string(),
                content: json!([
                    { "type": "text", "text": instructions },
                    Self::document_part(document)?,
                ]),
            },
        ];

        let request = OpenAIChatRequest {
            model: self.document_model().to_string(),
            messages,
            max_tokens: self.max_tokens,
            response_format: json!({ "type": "json_object" }),
        };

        self.post_chat(&request, self.timeouts.document).await
    }
}
