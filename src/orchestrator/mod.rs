//! # Orchestrator
//!
//! Public entry point of the crate. Each operation runs the primary provider
//! as `breaker.execute(retry.run(call))`, then falls back to the second
//! provider once, outside the primary breaker.
//!
//! ```text
//! chat ─▶ knowledge search (bounded, best effort)
//!      ─▶ PromptBuilder
//!      ─▶ CircuitBreaker ─▶ RetryExecutor ─▶ primary.complete + parse
//!      ─▶ on failure: fallback.complete + parse (one attempt)
//!      ─▶ on failure: degraded ChatResult
//! ```
//!
//! Every provider attempt opens one metric record and closes it on every
//! branch. Circuit-open short circuits get a record of their own.

pub mod error;
pub mod types;

pub use error::OrchestratorError;
pub use types::*;

use crate::config::{CircuitBreakerConfig, ConciergeConfig, KnowledgeConfig};
use crate::knowledge::{KnowledgeBase, KnowledgeError, KnowledgeSnippet, NoKnowledgeBase};
use crate::logging::content_preview;
use crate::metrics::{CallKind, ChannelSink, MetricsCollector, MonitoringSink, DEFAULT_SINK_BUFFER};
use crate::prompt::PromptBuilder;
use crate::provider::{
    factory::create_provider, Completion, DocumentRef, Embedding, ModelCostTable, ProviderClient,
    ProviderError,
};
use crate::resilience::{CircuitBreaker, RetryExecutor, RetryPolicy};
use std::future::Future;
use std::sync::Arc;

/// Instruction sent with every document analysis call.
const DOCUMENT_INSTRUCTIONS: &str = "Extract the requested fields from the attached document.";

/// Resilient front door to the model providers.
///
/// Cheap to share: wrap in `Arc` and call from many tasks at once.
pub struct Orchestrator {
    primary: Arc<dyn ProviderClient>,
    fallback: Arc<dyn ProviderClient>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    metrics: Arc<MetricsCollector>,
    knowledge: Arc<dyn KnowledgeBase>,
    knowledge_config: KnowledgeConfig,
    prompts: PromptBuilder,
    escalation_contact: String,
    log_content: bool,
}

/// Builder for [`Orchestrator`]. Unset parts take their defaults.
pub struct OrchestratorBuilder {
    primary: Arc<dyn ProviderClient>,
    fallback: Arc<dyn ProviderClient>,
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<RetryExecutor>,
    metrics: Option<Arc<MetricsCollector>>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    knowledge_config: KnowledgeConfig,
    escalation_contact: String,
    log_content: bool,
}

impl OrchestratorBuilder {
    pub fn new(primary: Arc<dyn ProviderClient>, fallback: Arc<dyn ProviderClient>) -> Self {
        Self {
            primary,
            fallback,
            breaker: None,
            retry: None,
            metrics: None,
            knowledge: None,
            knowledge_config: KnowledgeConfig::default(),
            escalation_contact: crate::config::EscalationConfig::default().contact,
            log_content: false,
        }
    }

    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn knowledge_config(mut self, config: KnowledgeConfig) -> Self {
        self.knowledge_config = config;
        self
    }

    pub fn escalation_contact(mut self, contact: impl Into<String>) -> Self {
        self.escalation_contact = contact.into();
        self
    }

    /// Log truncated message and prompt previews at debug level.
    pub fn content_logging(mut self, enabled: bool) -> Self {
        self.log_content = enabled;
        self
    }

    pub fn build(self) -> Orchestrator {
        let breaker = self.breaker.unwrap_or_else(|| {
            Arc::new(CircuitBreaker::new(
                self.primary.name(),
                &CircuitBreakerConfig::default(),
            ))
        });

        Orchestrator {
            prompts: PromptBuilder::from(&self.knowledge_config),
            primary: self.primary,
            fallback: self.fallback,
            breaker,
            retry: self.retry.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
            knowledge: self.knowledge.unwrap_or_else(|| Arc::new(NoKnowledgeBase)),
            knowledge_config: self.knowledge_config,
            escalation_contact: self.escalation_contact,
            log_content: self.log_content,
        }
    }
}

impl Orchestrator {
    pub fn builder(
        primary: Arc<dyn ProviderClient>,
        fallback: Arc<dyn ProviderClient>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder::new(primary, fallback)
    }

    /// Wire providers, breaker, retry policy and metrics from configuration.
    ///
    /// Inside a tokio runtime `sink` is placed behind a [`ChannelSink`], so
    /// records reach it asynchronously; await `metrics().flush()` before
    /// reading from it.
    pub fn from_config(
        config: &ConciergeConfig,
        sink: Arc<dyn MonitoringSink>,
    ) -> Result<Self, OrchestratorError> {
        let client = Arc::new(
            reqwest::Client::builder()
                .build()
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        );
        let primary = create_provider(&config.primary, Arc::clone(&client))?;
        let fallback = create_provider(&config.fallback, client)?;

        let costs = ModelCostTable::new().with_overrides(&config.pricing);
        let sink: Arc<dyn MonitoringSink> =
            match ChannelSink::spawn(Arc::clone(&sink), DEFAULT_SINK_BUFFER) {
                Some(channel) => Arc::new(channel),
                None => {
                    tracing::debug!("No tokio runtime, monitoring sink runs inline");
                    sink
                }
            };
        let metrics = Arc::new(MetricsCollector::new(costs, sink));
        let breaker = Arc::new(CircuitBreaker::new(
            primary.name(),
            &config.circuit_breaker,
        ));

        tracing::info!(
            primary = %primary.name(),
            primary_model = %primary.model(),
            fallback = %fallback.name(),
            fallback_model = %fallback.model(),
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_attempts = config.retry.max_attempts,
            "Orchestrator configured"
        );

        Ok(OrchestratorBuilder::new(primary, fallback)
            .breaker(breaker)
            .retry(RetryExecutor::new(RetryPolicy::from(&config.retry)))
            .metrics(metrics)
            .knowledge_config(config.knowledge.clone())
            .escalation_contact(config.escalation.contact.clone())
            .content_logging(config.logging.enable_content_logging)
            .build())
    }

    /// Replace the knowledge base after construction.
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Answer a chat message. Never fails: total failure yields a degraded result.
    pub async fn chat(&self, request: &ChatRequest) -> ChatResult {
        let snippets = self.retrieve_knowledge(&request.message).await;
        let prompt = self.prompts.build(&request.context, &snippets);

        if self.log_content {
            tracing::debug!(
                division = %request.context.division,
                message = %content_preview(&request.message),
                snippets = snippets.len(),
                prompt_chars = prompt.len(),
                "Chat request"
            );
        }

        let primary = &self.primary;
        let (system, history, message) = (prompt.as_str(), request.history.as_slice(), request.message.as_str());

        let primary_err = match self
            .run_primary(CallKind::Chat, primary.model(), || async move {
                Attempt::parse(primary.complete(system, history, message).await, |text| {
                    parse_chat_result(text, ResponseSource::Primary)
                })
            })
            .await
        {
            Ok(result) => return result,
            Err(err) => err,
        };

        tracing::warn!(
            primary = %primary.name(),
            fallback = %self.fallback.name(),
            error = %primary_err,
            "Primary path failed, trying fallback provider"
        );

        let fallback = &self.fallback;
        let fallback_result = self
            .run_fallback(CallKind::Chat, fallback.model(), async move {
                Attempt::parse(fallback.complete(system, history, message).await, |text| {
                    parse_chat_result(text, ResponseSource::Fallback)
                })
            })
            .await;

        match fallback_result {
            Ok(result) => result,
            Err(fallback_err) => {
                let err = OrchestratorError::AllProvidersFailed {
                    primary: Box::new(primary_err),
                    fallback: fallback_err,
                };
                tracing::error!(error = %err, "Returning degraded chat response");
                ChatResult::degraded(&self.escalation_contact)
            }
        }
    }

    /// Extract structured fields from a document.
    pub async fn analyze_document(
        &self,
        document: &DocumentRef,
        kind: DocumentKind,
    ) -> Result<DocumentAnalysis, OrchestratorError> {
        let prompt = self.prompts.build_document_prompt(kind);
        let system = prompt.as_str();

        let primary = &self.primary;
        let primary_err = match self
            .run_primary(CallKind::AnalyzeDocument, primary.document_model(), || async move {
                Attempt::parse(
                    primary
                        .analyze_document(system, document, DOCUMENT_INSTRUCTIONS)
                        .await,
                    |text| parse_document_analysis(text, ResponseSource::Primary),
                )
            })
            .await
        {
            Ok(analysis) => return Ok(analysis),
            Err(err) => err,
        };

        tracing::warn!(
            document_kind = %kind,
            error = %primary_err,
            "Primary document analysis failed, trying fallback provider"
        );

        let fallback = &self.fallback;
        self.run_fallback(CallKind::AnalyzeDocument, fallback.document_model(), async move {
            Attempt::parse(
                fallback
                    .analyze_document(system, document, DOCUMENT_INSTRUCTIONS)
                    .await,
                |text| parse_document_analysis(text, ResponseSource::Fallback),
            )
        })
        .await
        .map_err(|fallback| OrchestratorError::AllProvidersFailed {
            primary: Box::new(primary_err),
            fallback,
        })
    }

    /// Embed `text` into a vector.
    ///
    /// Providers without an embedding model are skipped without a call, so
    /// an unsupported operation never counts against the primary breaker.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, OrchestratorError> {
        let primary = &self.primary;
        let primary_err = match primary.embedding_model() {
            Some(model) => {
                match self
                    .run_primary(CallKind::Embed, model, || async move {
                        Attempt::embedding(primary.embed(text).await)
                    })
                    .await
                {
                    Ok(vector) => return Ok(vector),
                    Err(err) => err,
                }
            }
            None => ProviderError::Unsupported("embed").into(),
        };

        let fallback = &self.fallback;
        let fallback_result = match fallback.embedding_model() {
            Some(model) => {
                tracing::warn!(error = %primary_err, "Primary embedding failed, trying fallback provider");
                self.run_fallback(CallKind::Embed, model, async move {
                    Attempt::embedding(fallback.embed(text).await)
                })
                .await
            }
            None => Err(ProviderError::Unsupported("embed")),
        };

        fallback_result.map_err(|fallback| OrchestratorError::AllProvidersFailed {
            primary: Box::new(primary_err),
            fallback,
        })
    }

    /// Search the knowledge base within its deadline. Failures yield no snippets.
    async fn retrieve_knowledge(&self, query: &str) -> Vec<KnowledgeSnippet> {
        let top_k = self.knowledge_config.top_k;
        if top_k == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let search = self.knowledge.search(query, top_k);
        let outcome = match tokio::time::timeout(self.knowledge_config.timeout(), search).await {
            Ok(result) => result,
            Err(_) => Err(KnowledgeError::Timeout(self.knowledge_config.timeout_ms)),
        };

        match outcome {
            Ok(snippets) => snippets,
            Err(err) => {
                tracing::warn!(error = %err, "Knowledge search failed, building prompt without snippets");
                Vec::new()
            }
        }
    }

    /// Primary path: breaker around retry around `call`.
    ///
    /// Each attempt is metered as its own record, failed attempts included,
    /// so tokens billed for unparseable replies still reach the collector.
    /// A call rejected by the open circuit is recorded once with no tokens.
    async fn run_primary<T, F, Fut>(
        &self,
        kind: CallKind,
        model: &str,
        mut call: F,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let metrics = self.metrics.as_ref();
        let provider = self.primary.name();
        let retry = &self.retry;
        let context = kind.as_str();

        let result = self
            .breaker
            .execute(move || async move {
                retry
                    .run(context, || {
                        let attempt = call();
                        async move {
                            metered(metrics, provider, model, kind, attempt)
                                .await
                                .map_err(OrchestratorError::from)
                        }
                    })
                    .await
            })
            .await;

        if let Err(err @ OrchestratorError::CircuitOpen(_)) = &result {
            let id = metrics.start(provider, model, kind);
            metrics.finish(&id, false, None, Some(err.kind()));
        }
        result
    }

    /// Fallback path: a single metered attempt.
    async fn run_fallback<T, Fut>(
        &self,
        kind: CallKind,
        model: &str,
        call: Fut,
    ) -> Result<T, ProviderError>
    where
        Fut: Future<Output = Attempt<T>>,
    {
        let result = metered(self.metrics.as_ref(), self.fallback.name(), model, kind, call).await;
        match &result {
            Ok(_) => {
                tracing::info!(fallback = %self.fallback.name(), kind = %kind, "Fallback provider succeeded")
            }
            Err(err) => {
                tracing::warn!(fallback = %self.fallback.name(), kind = %kind, error = %err, "Fallback provider failed")
            }
        }
        result
    }
}

/// Outcome of one provider call together with the tokens it was billed for.
///
/// Tokens survive a parse failure: the provider charged for the reply even
/// when it could not be used.
struct Attempt<T> {
    outcome: Result<T, ProviderError>,
    tokens: Option<u32>,
}

impl<T> Attempt<T> {
    fn failed(err: ProviderError) -> Self {
        Self {
            outcome: Err(err),
            tokens: None,
        }
    }

    /// Parse a completion's text, keeping its token count either way.
    fn parse(
        completion: Result<Completion, ProviderError>,
        parse: impl FnOnce(&str) -> Result<T, ProviderError>,
    ) -> Self {
        match completion {
            Ok(completion) => Self {
                outcome: parse(&completion.text),
                tokens: completion.tokens,
            },
            Err(err) => Self::failed(err),
        }
    }
}

impl Attempt<Vec<f32>> {
    fn embedding(embedding: Result<Embedding, ProviderError>) -> Self {
        match embedding {
            Ok(embedding) => Self {
                outcome: Ok(embedding.vector),
                tokens: embedding.tokens,
            },
            Err(err) => Self::failed(err),
        }
    }
}

/// Run one attempt under its own metric record.
async fn metered<T>(
    metrics: &MetricsCollector,
    provider: &str,
    model: &str,
    kind: CallKind,
    attempt: impl Future<Output = Attempt<T>>,
) -> Result<T, ProviderError> {
    let id = metrics.start(provider, model, kind);
    let Attempt { outcome, tokens } = attempt.await;
    match &outcome {
        Ok(_) => metrics.finish(&id, true, tokens, None),
        Err(err) => metrics.finish(&id, false, tokens, Some(err.kind())),
    };
    outcome
}
