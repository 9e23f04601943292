// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Evaluation of one push notification.
//!
//! # Message Lifecycle
//!
//! ```text
//! RECEIVED ──► SKIPPED ──────────────────────────────► ACKNOWLEDGED
//!    │          (wrong type, zero or multiple pushes,
//!    │           undecodable body)
//!    ▼
//! VALIDATED ──► EVALUATED ──► fresh ──────────────────► ACKNOWLEDGED
//!                    │
//!                    └──────► stale / error ──────────► DEFERRED
//! ```
//!
//! A deferred message stays unacknowledged; the broker redelivers it to the
//! next run. Under dry run the [`AckHandle`] suppresses acknowledgment while
//! the reporter still receives every evaluated status.

use crate::ack::AckHandle;
use crate::config::MirrorRepository;
use crate::error::Result;
use crate::error_sink::{capture, ErrorSink};
use crate::message::{validate, PushlogPush, SkipReason, Validation};
use crate::metrics;
use crate::model::{Push, ReplicationStatus};
use crate::reporter::Reporter;
use crate::repository::RepositoryClient;
use crate::scanner::MirrorLagScanner;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Not evaluated; acknowledged.
    Skipped(SkipReason),
    /// Every changeset of the push is on the mirror; acknowledged.
    Replicated,
    /// At least one changeset is missing; left for redelivery.
    Lagging(ReplicationStatus),
}

impl ProcessOutcome {
    /// False only when the mirror is behind.
    pub fn is_success(&self) -> bool {
        !matches!(self, ProcessOutcome::Lagging(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessOutcome::Skipped(_) => "skipped",
            ProcessOutcome::Replicated => "replicated",
            ProcessOutcome::Lagging(_) => "lagging",
        }
    }
}

/// Validates, evaluates and resolves push notifications for one mirror.
pub struct PushMessageProcessor<C: RepositoryClient> {
    scanner: MirrorLagScanner<C>,
    mirror: MirrorRepository,
    reporter: Arc<dyn Reporter>,
    error_sink: Arc<dyn ErrorSink>,
}

impl<C: RepositoryClient> PushMessageProcessor<C> {
    pub fn new(
        scanner: MirrorLagScanner<C>,
        mirror: MirrorRepository,
        reporter: Arc<dyn Reporter>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            scanner,
            mirror,
            reporter,
            error_sink,
        }
    }

    pub fn mirror(&self) -> &MirrorRepository {
        &self.mirror
    }

    /// Handle one delivered message body and resolve its acknowledgment.
    ///
    /// Errors after validation (transport, clock skew) defer the message,
    /// are passed to the error sink, and are returned.
    pub async fn handle(&self, body: &[u8], ack: &mut AckHandle) -> Result<ProcessOutcome> {
        debug!(bytes = body.len(), dry_run = ack.is_dry_run(), "Received message");

        let push = match validate(body) {
            Validation::Push(push) => push,
            Validation::Skip(reason) => {
                if reason.is_anomaly() {
                    warn!(reason = %reason, "Skipped message");
                } else {
                    info!(reason = %reason, "Skipped message");
                }
                ack.acknowledge().await?;
                metrics::record_message_processed(reason.label());
                return Ok(ProcessOutcome::Skipped(reason));
            }
        };

        let status = match capture(self.error_sink.as_ref(), "evaluate push", self.evaluate(&push)).await {
            Ok(status) => status,
            Err(e) => {
                ack.defer();
                metrics::record_message_processed("error");
                return Err(e);
            }
        };

        self.reporter.report(&self.mirror, &status);

        let outcome = if status.is_stale() {
            // Leave the message for the next run.
            ack.defer();
            info!(
                push_id = push.pushid,
                seconds_behind = status.seconds_behind(),
                "Push not yet replicated, leaving message unacknowledged"
            );
            ProcessOutcome::Lagging(status)
        } else {
            ack.acknowledge().await?;
            info!(push_id = push.pushid, "Push fully replicated");
            ProcessOutcome::Replicated
        };

        metrics::record_message_processed(outcome.label());
        Ok(outcome)
    }

    async fn evaluate(&self, push: &PushlogPush) -> Result<ReplicationStatus> {
        let push = Push {
            push_id: push.pushid,
            changesets: self
                .scanner
                .checker()
                .client()
                .changesets_for_push(push.pushid, &push.push_json_url)
                .await?,
        };
        debug!(push_id = push.push_id, changesets = push.changesets.len(), "Scanning push");
        self.scanner.scan(&self.mirror, &push.changesets).await
    }
}
