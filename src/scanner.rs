//! Fail-fast scan over an ordered batch of changesets.

use crate::checker::ReplicationStatusChecker;
use crate::config::MirrorRepository;
use crate::error::Result;
use crate::model::{Changeset, ReplicationStatus};
use crate::repository::RepositoryClient;
use std::sync::Arc;
use tracing::info;

/// Finds the first changeset of a push that has not reached the mirror.
pub struct MirrorLagScanner<C: RepositoryClient> {
    checker: Arc<ReplicationStatusChecker<C>>,
}

impl<C: RepositoryClient> MirrorLagScanner<C> {
    pub fn new(checker: Arc<ReplicationStatusChecker<C>>) -> Self {
        Self { checker }
    }

    pub fn checker(&self) -> &ReplicationStatusChecker<C> {
        &self.checker
    }

    /// Status of the earliest stale changeset, or fresh if none are stale.
    ///
    /// Stops at the first stale changeset: the result is the lag of the
    /// earliest unreplicated changeset, not the largest lag in the batch.
    pub async fn scan(&self, mirror: &MirrorRepository, changesets: &[Changeset]) -> Result<ReplicationStatus> {
        for changeset in changesets {
            let status = self.checker.check(mirror, changeset).await?;
            info!(
                changeset = %changeset,
                seconds_behind = status.seconds_behind(),
                "Replication delay for changeset"
            );
            if status.is_stale() {
                return Ok(status);
            }
        }
        Ok(ReplicationStatus::fresh())
    }
}
