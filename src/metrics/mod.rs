//! # Metrics Collection Module
//!
//! Tracks every outbound provider call from start to finish and derives its
//! USD cost from the model pricing table.
//!
//! ## Overview
//!
//! [`MetricsCollector::start`] opens a pending record and hands back its id.
//! [`MetricsCollector::finish`] closes it, computes duration and cost, stores
//! the finished record and forwards it to the configured [`MonitoringSink`].
//! Concurrent calls never share a record, so interleaved start/finish pairs
//! are safe without external locking.
//!
//! ## Sinks
//!
//! - [`TracingSink`] - one structured log event per call
//! - [`PrometheusSink`] - counters and histograms through the `metrics` facade
//! - [`FanoutSink`] - several of the above
//! - [`ChannelSink`] - bounded queue in front of a sink that may block

pub mod sink;
pub mod types;

pub use sink::{
    deliver, setup_metrics, ChannelSink, FanoutSink, MonitoringSink, NoopSink, PrometheusSink,
    TracingSink, DEFAULT_SINK_BUFFER,
};
pub use types::*;

use crate::provider::ModelCostTable;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

struct PendingCall {
    record: MetricRecord,
    started: Instant,
}

/// Central store for per-call metrics.
pub struct MetricsCollector {
    costs: ModelCostTable,
    pending: DashMap<String, PendingCall>,
    completed: Mutex<Vec<MetricRecord>>,
    sink: Arc<dyn MonitoringSink>,
}

impl MetricsCollector {
    /// Create a collector that prices calls with `costs` and reports to `sink`.
    pub fn new(costs: ModelCostTable, sink: Arc<dyn MonitoringSink>) -> Self {
        Self {
            costs,
            pending: DashMap::new(),
            completed: Mutex::new(Vec::new()),
            sink,
        }
    }

    /// Open a record for a call that is about to be made.
    pub fn start(&self, provider: &str, model: &str, kind: CallKind) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let record = MetricRecord {
            id: id.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            kind,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            tokens: None,
            cost: None,
            success: false,
            error: None,
        };
        self.pending.insert(
            id.clone(),
            PendingCall {
                record,
                started: Instant::now(),
            },
        );
        id
    }

    /// Close a record. Unknown or already-finished ids are ignored.
    ///
    /// Cost is set only when `tokens` is present and the model has a rate.
    pub fn finish(
        &self,
        id: &str,
        success: bool,
        tokens: Option<u32>,
        error: Option<&str>,
    ) -> Option<MetricRecord> {
        let Some((_, pending)) = self.pending.remove(id) else {
            tracing::debug!(id, "Ignoring finish for unknown metric record");
            return None;
        };

        let mut record = pending.record;
        record.end_time = Some(Utc::now());
        record.duration_ms = Some(pending.started.elapsed().as_millis() as u64);
        record.tokens = tokens;
        record.cost = tokens.and_then(|t| self.costs.estimate_cost(&record.model, t));
        record.success = success;
        record.error = error.map(str::to_string);

        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        deliver(self.sink.as_ref(), &record);

        Some(record)
    }

    /// Wait until the sink has delivered every record finished so far.
    pub async fn flush(&self) {
        self.sink.flush().await;
    }

    /// Number of calls started but not finished.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Copy of every finished record, in completion order.
    pub fn records(&self) -> Vec<MetricRecord> {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every finished record (log rotation hook).
    pub fn drain(&self) -> Vec<MetricRecord> {
        std::mem::take(&mut *self.completed.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Aggregate the finished records.
    pub fn summary(&self) -> MetricsSummary {
        let records = self.records();

        #[derive(Default)]
        struct Acc {
            calls: u64,
            errors: u64,
            cost: f64,
            duration_ms: u64,
        }

        let mut summary = MetricsSummary {
            pending: self.pending_count() as u64,
            ..MetricsSummary::default()
        };
        let mut by_model: BTreeMap<&str, Acc> = BTreeMap::new();
        let mut total_duration: u64 = 0;

        for record in &records {
            summary.total += 1;
            if record.success {
                summary.success += 1;
            } else {
                summary.errors += 1;
            }
            summary.total_tokens += u64::from(record.tokens.unwrap_or(0));
            summary.total_cost_usd += record.cost.unwrap_or(0.0);
            total_duration += record.duration_ms.unwrap_or(0);

            let acc = by_model.entry(record.model.as_str()).or_default();
            acc.calls += 1;
            if !record.success {
                acc.errors += 1;
            }
            acc.cost += record.cost.unwrap_or(0.0);
            acc.duration_ms += record.duration_ms.unwrap_or(0);
        }

        if summary.total > 0 {
            summary.average_duration_ms = total_duration as f64 / summary.total as f64;
        }
        summary.models = by_model
            .into_iter()
            .map(|(model, acc)| ModelSummary {
                model: model.to_string(),
                calls: acc.calls,
                errors: acc.errors,
                cost_usd: acc.cost,
                average_duration_ms: acc.duration_ms as f64 / acc.calls as f64,
            })
            .collect();

        summary
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(ModelCostTable::default(), Arc::new(NoopSink))
    }
}
