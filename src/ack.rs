// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Acknowledgment handles for delivered messages.
//!
//! A delivered message is resolved exactly once: acknowledged (removed from
//! the queue) or deferred (left unacknowledged so the broker redelivers it on
//! a later connection). Both operations are idempotent.
//!
//! # State Transitions
//!
//! ```text
//!            acknowledge()                 defer()
//! Acknowledged ◄────────── Pending ──────────► Deferred
//!                             │
//!                             │ (dry run: either call)
//!                             ▼
//!                         Suppressed
//! ```
//!
//! `acknowledge()` after `defer()` is an [`InvalidState`](crate::MonitorError::InvalidState)
//! error; `defer()` after `acknowledge()` is a no-op.

use crate::error::{MonitorError, Result};
use crate::repository::BoxFuture;
use std::fmt;
use tracing::debug;

/// Broker-side acknowledgment of one delivery.
pub trait Acknowledger: Send + Sync {
    fn ack(&self) -> BoxFuture<'_, ()>;
}

/// Resolution state of an [`AckHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckState {
    /// Not yet resolved.
    Pending,
    /// Acknowledged on the broker.
    Acknowledged,
    /// Left outstanding for redelivery.
    Deferred,
    /// Dry run: resolved without touching the broker.
    Suppressed,
}

impl fmt::Display for AckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AckState::Pending => "Pending",
            AckState::Acknowledged => "Acknowledged",
            AckState::Deferred => "Deferred",
            AckState::Suppressed => "Suppressed",
        };
        f.write_str(s)
    }
}

/// Explicit acknowledgment object owned by the processor for one evaluation.
pub struct AckHandle {
    acker: Box<dyn Acknowledger>,
    dry_run: bool,
    state: AckState,
}

impl AckHandle {
    pub fn new(acker: Box<dyn Acknowledger>, dry_run: bool) -> Self {
        Self {
            acker,
            dry_run,
            state: AckState::Pending,
        }
    }

    pub fn state(&self) -> AckState {
        self.state
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Remove the message from the queue. Suppressed under dry run.
    pub async fn acknowledge(&mut self) -> Result<()> {
        match self.state {
            AckState::Acknowledged | AckState::Suppressed => Ok(()),
            AckState::Deferred => Err(MonitorError::InvalidState {
                expected: AckState::Pending.to_string(),
                actual: AckState::Deferred.to_string(),
            }),
            AckState::Pending if self.dry_run => {
                debug!("Dry run: acknowledgment suppressed");
                self.state = AckState::Suppressed;
                Ok(())
            }
            AckState::Pending => {
                self.acker.ack().await?;
                self.state = AckState::Acknowledged;
                Ok(())
            }
        }
    }

    /// Leave the message outstanding. The broker redelivers it once this
    /// connection closes.
    pub fn defer(&mut self) {
        if self.state == AckState::Pending {
            self.state = if self.dry_run {
                AckState::Suppressed
            } else {
                AckState::Deferred
            };
        }
    }
}

impl fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckHandle")
            .field("dry_run", &self.dry_run)
            .field("state", &self.state)
            .finish()
    }
}
