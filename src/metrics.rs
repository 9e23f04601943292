//! Metrics for observability.
//!
//! Two layers:
//! - Free functions recording operational counters through the `metrics`
//!   facade (HTTP requests, processed messages, idle polls).
//! - [`MetricsSink`]: the injectable destination for the replication lag
//!   gauge, so the reporter can be pointed at an in-memory sink in tests.
//!
//! # Metric Naming Convention
//!
//! Operational metrics are prefixed with `mirror_lag_` and follow Prometheus
//! conventions (counters end in `_total`). The lag gauge keeps the dotted
//! statsd-style name dashboards already query:
//!
//! ```text
//! {namespace}.repository.{callsign lowercase}.seconds_behind_source_repo
//! ```

use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::Mutex;

/// Record an HTTP response by method and status.
pub fn record_http_request(method: &str, status: u16) {
    counter!(
        "mirror_lag_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a processed queue message by outcome label.
pub fn record_message_processed(outcome: &str) {
    counter!("mirror_lag_messages_processed_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a poll that found the queue empty.
pub fn record_idle_poll() {
    counter!("mirror_lag_idle_polls_total").increment(1);
}

/// Record errors by type.
pub fn record_error(error_type: &str) {
    counter!("mirror_lag_errors_total", "error_type" => error_type.to_string()).increment(1);
}

/// Gauge name for a repository's lag.
pub fn seconds_behind_metric_name(namespace: &str, callsign: &str) -> String {
    format!(
        "{}.repository.{}.seconds_behind_source_repo",
        namespace,
        callsign.to_lowercase()
    )
}

// =============================================================================
// Sinks
// =============================================================================

/// Destination for gauge values.
pub trait MetricsSink: Send + Sync {
    fn gauge(&self, name: &str, value: f64);
}

/// Forwards to the globally installed `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeSink;

impl MetricsSink for FacadeSink {
    fn gauge(&self, name: &str, value: f64) {
        gauge!(name.to_string()).set(value);
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn gauge(&self, _name: &str, _value: f64) {}
}

/// Keeps the last value of every gauge. For tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    gauges: Mutex<HashMap<String, f64>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauges.lock().ok().and_then(|g| g.get(name).copied())
    }

    pub fn len(&self) -> usize {
        self.gauges.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for InMemorySink {
    fn gauge(&self, name: &str, value: f64) {
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(name.to_string(), value);
        }
    }
}
