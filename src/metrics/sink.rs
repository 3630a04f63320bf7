//! Monitoring sinks for finished metric records.
//!
//! `MetricsCollector::finish` hands every record to its sink through
//! [`deliver`], which contains panics so a broken sink never fails a request.
//! Sinks that may block belong behind a [`ChannelSink`], which queues records
//! on a bounded channel and forwards them from a background task.

use super::types::MetricRecord;
use async_trait::async_trait;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Default queue depth for [`ChannelSink`].
pub const DEFAULT_SINK_BUFFER: usize = 1024;

/// Destination for finished records.
#[async_trait]
pub trait MonitoringSink: Send + Sync + 'static {
    fn record(&self, record: &MetricRecord);

    /// Resolves once every record handed over so far has been delivered.
    async fn flush(&self) {}
}

/// Hand `record` to `sink`, containing any panic it raises.
pub fn deliver(sink: &dyn MonitoringSink, record: &MetricRecord) {
    if catch_unwind(AssertUnwindSafe(|| sink.record(record))).is_err() {
        tracing::error!(
            target: "concierge::metrics",
            id = %record.id,
            provider = %record.provider,
            "Monitoring sink panicked, record not delivered"
        );
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MonitoringSink for NoopSink {
    fn record(&self, _record: &MetricRecord) {}
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MonitoringSink for TracingSink {
    fn record(&self, record: &MetricRecord) {
        if record.success {
            tracing::info!(
                target: "concierge::metrics",
                id = %record.id,
                provider = %record.provider,
                model = %record.model,
                kind = %record.kind,
                duration_ms = record.duration_ms,
                tokens = record.tokens,
                cost_usd = record.cost,
                "Provider call completed"
            );
        } else {
            tracing::warn!(
                target: "concierge::metrics",
                id = %record.id,
                provider = %record.provider,
                model = %record.model,
                kind = %record.kind,
                duration_ms = record.duration_ms,
                error = record.error.as_deref().unwrap_or("unknown"),
                "Provider call failed"
            );
        }
    }
}

/// Feeds the `metrics` facade (scraped through the Prometheus exporter).
///
/// **Counters:**
/// - `concierge_provider_calls_total{provider, model, kind, status}`
/// - `concierge_provider_tokens_total{provider, model}`
///
/// **Histograms:**
/// - `concierge_provider_call_duration_seconds{provider, model, kind}`
///
/// **Gauges:**
/// - `concierge_provider_cost_usd_total{provider, model}` (monotonic sum)
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSink;

impl MonitoringSink for PrometheusSink {
    fn record(&self, record: &MetricRecord) {
        let status = if record.success { "success" } else { "error" };

        metrics::counter!(
            "concierge_provider_calls_total",
            "provider" => record.provider.clone(),
            "model" => record.model.clone(),
            "kind" => record.kind.as_str(),
            "status" => status
        )
        .increment(1);

        if let Some(duration_ms) = record.duration_ms {
            metrics::histogram!(
                "concierge_provider_call_duration_seconds",
                "provider" => record.provider.clone(),
                "model" => record.model.clone(),
                "kind" => record.kind.as_str()
            )
            .record(duration_ms as f64 / 1000.0);
        }

        if let Some(tokens) = record.tokens {
            metrics::counter!(
                "concierge_provider_tokens_total",
                "provider" => record.provider.clone(),
                "model" => record.model.clone()
            )
            .increment(u64::from(tokens));
        }

        if let Some(cost) = record.cost {
            metrics::gauge!(
                "concierge_provider_cost_usd_total",
                "provider" => record.provider.clone(),
                "model" => record.model.clone()
            )
            .increment(cost);
        }
    }
}

/// Forwards each record to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MonitoringSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn MonitoringSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl MonitoringSink for FanoutSink {
    fn record(&self, record: &MetricRecord) {
        for sink in &self.sinks {
            deliver(sink.as_ref(), record);
        }
    }

    async fn flush(&self) {
        for sink in &self.sinks {
            sink.flush().await;
        }
    }
}

enum SinkMessage {
    Record(MetricRecord),
    Flush(oneshot::Sender<()>),
}

/// Queues records on a bounded channel drained by a background task.
///
/// `record` never waits: when the queue is full the record is dropped and
/// counted. The wrapped sink runs on the drain task, off the request path.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkMessage>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Spawn the drain task on the current tokio runtime.
    ///
    /// Returns `None` when called outside a runtime.
    pub fn spawn(inner: Arc<dyn MonitoringSink>, capacity: usize) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let (tx, mut rx) = mpsc::channel(capacity.max(1));

        runtime.spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    SinkMessage::Record(record) => deliver(inner.as_ref(), &record),
                    SinkMessage::Flush(done) => {
                        inner.flush().await;
                        let _ = done.send(());
                    }
                }
            }
        });

        Some(Self {
            tx,
            dropped: AtomicU64::new(0),
        })
    }

    /// Records dropped because the queue was full or the drain task had stopped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MonitoringSink for ChannelSink {
    fn record(&self, record: &MetricRecord) {
        if let Err(err) = self.tx.try_send(SinkMessage::Record(record.clone())) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let reason = match err {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "drain task stopped",
            };
            tracing::warn!(
                target: "concierge::metrics",
                id = %record.id,
                dropped,
                reason,
                "Dropping metric record"
            );
        }
    }

    async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(SinkMessage::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

/// Install the Prometheus recorder with buckets sized for model latency.
///
/// Buckets: [0.1, 0.25, 0.5, 1, 2.5, 5, 10, 30, 60, 120] seconds.
///
/// Returns a PrometheusHandle that can be used to render metrics.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let duration_buckets = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

    let recorder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("concierge_provider_call_duration_seconds".to_string()),
            duration_buckets,
        )?
        .build_recorder();
    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)?;

    Ok(handle)
}
