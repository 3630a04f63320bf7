//! Shared test utilities for Concierge integration tests.
//!
//! Provides scripted providers, knowledge bases, sinks and sleepers so the
//! orchestrator can be driven deterministically without network or real time.

#![allow(dead_code)]

use async_trait::async_trait;
use concierge::config::CircuitBreakerConfig;
use concierge::knowledge::{KnowledgeBase, KnowledgeError, KnowledgeSnippet};
use concierge::metrics::{MetricRecord, MetricsCollector, MonitoringSink};
use concierge::orchestrator::{Orchestrator, OrchestratorBuilder};
use concierge::provider::{
    ChatTurn, Completion, DocumentRef, Embedding, ModelCostTable, ProviderClient, ProviderError,
};
use concierge::resilience::{
    CircuitBreaker, ManualClock, RetryExecutor, RetryPolicy, Sleeper,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// UUID v4 string length: "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
pub const UUID_V4_STRING_LEN: usize = 36;

pub const ESCALATION_CONTACT: &str = "(555) 010-2000";

/// Well-formed chat payload.
pub const VALID_REPLY: &str = r#"{"responseText":"Happy to help with your loan.","suggestedActions":["start_application"],"nextSteps":["Gather pay stubs"],"confidence":0.9}"#;

/// Well-formed document payload.
pub const VALID_ANALYSIS: &str = r#"{"extractedFields":{"employer":"Acme","grossPay":5200},"confidence":0.8,"warnings":[]}"#;

pub fn upstream(status: u16) -> ProviderError {
    ProviderError::Upstream {
        status,
        message: format!("status {}", status),
    }
}

// =============================================================================
// Scripted Provider
// =============================================================================

/// Provider whose replies come from a script.
///
/// Each call pops the next scripted outcome; once the script is empty the
/// `default` outcome repeats forever.
pub struct ScriptedProvider {
    name: String,
    model: String,
    embedding_model: Option<String>,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    default: Result<String, ProviderError>,
    tokens: Option<u32>,
    latency: Option<Duration>,
    pub calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(name: &str, model: &str, default: Result<&str, ProviderError>) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            embedding_model: None,
            script: Mutex::new(VecDeque::new()),
            default: default.map(str::to_string),
            tokens: Some(1000),
            latency: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Always answers with `VALID_REPLY`.
    pub fn healthy(name: &str, model: &str) -> Self {
        Self::new(name, model, Ok(VALID_REPLY))
    }

    /// Always fails with `error`.
    pub fn failing(name: &str, model: &str, error: ProviderError) -> Self {
        Self::new(name, model, Err(error))
    }

    pub fn with_script(self, outcomes: Vec<Result<&str, ProviderError>>) -> Self {
        *self.script.lock().unwrap() = outcomes
            .into_iter()
            .map(|o| o.map(str::to_string))
            .collect();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = Some(model.to_string());
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u32>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next_outcome(&self) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        _history: &[ChatTurn],
        _message: &str,
    ) -> Result<Completion, ProviderError> {
        let text = self.next_outcome().await?;
        Ok(Completion {
            text,
            model: self.model.clone(),
            tokens: self.tokens,
        })
    }

    async fn embed(&self, _text: &str) -> Result<Embedding, ProviderError> {
        let model = self
            .embedding_model
            .clone()
            .ok_or(ProviderError::Unsupported("embed"))?;
        self.next_outcome().await?;
        Ok(Embedding {
            vector: vec![0.1, 0.2, 0.3],
            model,
            tokens: self.tokens,
        })
    }

    async fn analyze_document(
        &self,
        _system_prompt: &str,
        _document: &DocumentRef,
        _instructions: &str,
    ) -> Result<Completion, ProviderError> {
        let text = self.next_outcome().await?;
        Ok(Completion {
            text,
            model: self.model.clone(),
            tokens: self.tokens,
        })
    }
}

// =============================================================================
// Knowledge Bases
// =============================================================================

/// Always errors.
pub struct FailingKnowledgeBase;

#[async_trait]
impl KnowledgeBase for FailingKnowledgeBase {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
        Err(KnowledgeError::Unavailable("index offline".to_string()))
    }
}

/// Answers only after `delay`.
pub struct SlowKnowledgeBase {
    pub delay: Duration,
}

#[async_trait]
impl KnowledgeBase for SlowKnowledgeBase {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeSnippet>, KnowledgeError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![KnowledgeSnippet::new("Late", "never used")])
    }
}

// =============================================================================
// Sinks and Sleepers
// =============================================================================

/// Keeps every record it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<MetricRecord>>,
}

impl RecordingSink {
    pub fn snapshot(&self) -> Vec<MetricRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl MonitoringSink for RecordingSink {
    fn record(&self, record: &MetricRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays_ms(&self) -> Vec<u64> {
        self.delays
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.as_millis() as u64)
            .collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

// =============================================================================
// Orchestrator Harness
// =============================================================================

/// Orchestrator plus handles to every injected collaborator.
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub primary: Arc<ScriptedProvider>,
    pub fallback: Arc<ScriptedProvider>,
    pub sink: Arc<RecordingSink>,
    pub sleeper: Arc<RecordingSleeper>,
    pub clock: Arc<ManualClock>,
}

/// Wire an orchestrator with default thresholds, a manual clock and a recording sleeper.
pub fn harness(primary: ScriptedProvider, fallback: ScriptedProvider) -> Harness {
    harness_with(primary, fallback, |builder| builder)
}

/// Like [`harness`], with a hook to adjust the builder.
pub fn harness_with(
    primary: ScriptedProvider,
    fallback: ScriptedProvider,
    customize: impl FnOnce(OrchestratorBuilder) -> OrchestratorBuilder,
) -> Harness {
    let primary = Arc::new(primary);
    let fallback = Arc::new(fallback);
    let sink = Arc::new(RecordingSink::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let clock = Arc::new(ManualClock::new());

    let breaker = Arc::new(
        CircuitBreaker::new(primary.name(), &CircuitBreakerConfig::default())
            .with_clock(clock.clone()),
    );
    let retry = RetryExecutor::new(RetryPolicy::default()).with_sleeper(sleeper.clone());
    let metrics = Arc::new(MetricsCollector::new(ModelCostTable::new(), sink.clone()));

    let builder = Orchestrator::builder(primary.clone(), fallback.clone())
        .breaker(breaker)
        .retry(retry)
        .metrics(metrics)
        .escalation_contact(ESCALATION_CONTACT);

    Harness {
        orchestrator: Arc::new(customize(builder).build()),
        primary,
        fallback,
        sink,
        sleeper,
        clock,
    }
}
