//! Model provider abstraction layer.
//!
//! This module provides the `ProviderClient` trait and the concrete clients that
//! speak each vendor's HTTP protocol. The orchestrator only ever sees the trait,
//! so the primary/fallback pairing is chosen at construction time by
//! [`factory::create_provider`].

use async_trait::async_trait;

pub mod anthropic;
pub mod error;
pub mod factory;
pub mod openai;
pub mod pricing;
pub mod types;

pub use error::ProviderError;
pub use pricing::ModelCostTable;
pub use types::{ChatTurn, Completion, DocumentRef, Embedding, ProviderTimeouts, Role};

/// Unified interface for all model providers.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn ProviderClient>`.
/// All async methods use `async_trait` for compatibility with trait objects.
///
/// # Timeouts
///
/// Every implementation attaches a fixed per-request timeout and reports an
/// expired deadline as `ProviderError::Timeout`, which callers treat as retryable.
#[async_trait]
pub trait ProviderClient: Send + Sync + 'static {
    /// Human-readable name for logging (e.g., "openai-primary").
    fn name(&self) -> &str;

    /// Model used for chat completions.
    fn model(&self) -> &str;

    /// Model used for embeddings, if this provider offers them.
    fn embedding_model(&self) -> Option<&str> {
        None
    }

    /// Model used for document/vision analysis. Defaults to the chat model.
    fn document_model(&self) -> &str {
        self.model()
    }

    /// Run a chat completion.
    ///
    /// # Arguments
    ///
    /// * `system_prompt` - Instructions assembled by the prompt builder
    /// * `history` - Prior turns, oldest first
    /// * `message` - The new user message
    ///
    /// # Returns
    ///
    /// - `Ok(Completion)` with the raw assistant text
    /// - `Err(ProviderError::Upstream)` if the provider returned 4xx/5xx
    /// - `Err(ProviderError::Network)` if the connection failed
    /// - `Err(ProviderError::Timeout)` if the request exceeded its deadline
    /// - `Err(ProviderError::Parse)` if the envelope was not the vendor format
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<Completion, ProviderError>;

    /// Embed a single text.
    ///
    /// Default implementation returns `Unsupported`.
    async fn embed(&self, _text: &str) -> Result<Embedding, ProviderError> {
        Err(ProviderError::Unsupported("embed"))
    }

    /// Ask a vision-capable model to read a document and answer with JSON.
    ///
    /// Default implementation returns `Unsupported`.
    async fn analyze_document(
        &self,
        _system_prompt: &str,
        _document: &DocumentRef,
        _instructions: &str,
    ) -> Result<Completion, ProviderError> {
        Err(ProviderError::Unsupported("analyze_document"))
    }
}
