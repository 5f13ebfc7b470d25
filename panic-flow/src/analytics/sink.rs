//! The write-only analytics port and its simple implementations.

use std::sync::Arc;

use super::types::AnalyticsEvent;

/// Write-only analytics port.
///
/// `record` cannot fail: implementations swallow their own errors so the
/// caller's control flow never depends on observability.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: AnalyticsEvent);
}

/// Shared, injectable analytics sink
pub type SharedAnalytics = Arc<dyn AnalyticsSink>;

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn record(&self, _event: AnalyticsEvent) {}
}

/// Writes events as structured `tracing` records on the `panic_flow::analytics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn record(&self, event: AnalyticsEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(
                target: "panic_flow::analytics",
                kind = event.kind(),
                %payload,
                "analytics"
            ),
            Err(e) => tracing::warn!(
                target: "panic_flow::analytics",
                kind = event.kind(),
                "Failed to serialize analytics event: {}",
                e
            ),
        }
    }
}

/// Forwards each event to every inner sink.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<SharedAnalytics>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: SharedAnalytics) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AnalyticsSink for FanoutSink {
    fn record(&self, event: AnalyticsEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

impl<S: AnalyticsSink + ?Sized> AnalyticsSink for Arc<S> {
    fn record(&self, event: AnalyticsEvent) {
        (**self).record(event)
    }
}
