//! Reporting of replication results.
//!
//! - [`MetricsReporter`]: emits the lag gauge through an injected [`MetricsSink`].
//! - [`ConsoleReporter`]: prints a human-readable line (`display-lag`).

use crate::config::MirrorRepository;
use crate::metrics::{seconds_behind_metric_name, MetricsSink};
use crate::model::ReplicationStatus;
use colored::Colorize;
use std::sync::Arc;
use tracing::debug;

/// Receives the outcome of each evaluated push.
pub trait Reporter: Send + Sync {
    fn report(&self, mirror: &MirrorRepository, status: &ReplicationStatus);
}

impl<T: Reporter + ?Sized> Reporter for Arc<T> {
    fn report(&self, mirror: &MirrorRepository, status: &ReplicationStatus) {
        (**self).report(mirror, status)
    }
}

/// Emits `seconds_behind` as a gauge.
#[derive(Clone)]
pub struct MetricsReporter {
    sink: Arc<dyn MetricsSink>,
    namespace: String,
}

impl MetricsReporter {
    pub fn new(sink: Arc<dyn MetricsSink>, namespace: impl Into<String>) -> Self {
        Self {
            sink,
            namespace: namespace.into(),
        }
    }

    /// Report zero lag: the queue is empty, so every announced push has
    /// already been confirmed.
    pub fn report_caught_up(&self, mirror: &MirrorRepository) {
        self.report(mirror, &ReplicationStatus::fresh());
    }
}

impl Reporter for MetricsReporter {
    fn report(&self, mirror: &MirrorRepository, status: &ReplicationStatus) {
        let name = seconds_behind_metric_name(&self.namespace, mirror.callsign());
        debug!(metric = %name, value = status.seconds_behind(), "Reporting replication lag");
        self.sink.gauge(&name, status.seconds_behind() as f64);
    }
}

/// Render the console line for a status.
pub fn render_lag_line(status: &ReplicationStatus) -> String {
    let value = if status.is_stale() {
        status.seconds_behind().to_string().yellow().bold()
    } else {
        "0".green().bold()
    };
    format!("replication lag (seconds): {}", value)
}

/// Prints the lag to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, _mirror: &MirrorRepository, status: &ReplicationStatus) {
        println!("{}", render_lag_line(status));
    }
}
