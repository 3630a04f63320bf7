//! # Metrics Types
//!
//! Per-call records and the aggregate summary built from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Which capability an outbound call exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Chat,
    Embed,
    AnalyzeDocument,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallKind::Chat => "chat",
            CallKind::Embed => "embed",
            CallKind::AnalyzeDocument => "analyze_document",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound provider call (a whole retry sequence on the primary path,
/// or the single fallback attempt).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    /// Unique record id (UUID v4)
    pub id: String,
    /// Provider name from config
    pub provider: String,
    /// Model billed for the call
    pub model: String,
    pub kind: CallKind,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    /// Derived cost in USD (needs both tokens and a known rate)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricRecord {
    /// Finished records have an end time; pending ones do not.
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Aggregate view over every finished record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    /// Calls started but not yet finished
    pub pending: u64,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub average_duration_ms: f64,
    /// Per-model breakdown, sorted by model name
    pub models: Vec<ModelSummary>,
}

/// Per-model statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub model: String,
    pub calls: u64,
    pub errors: u64,
    pub cost_usd: f64,
    pub average_duration_ms: f64,
}
