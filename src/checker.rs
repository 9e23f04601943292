//! Replication status of a single changeset.
//!
//! A changeset visible on the mirror is fresh. Otherwise it is stale by the
//! whole seconds elapsed since its publication on the source repository.

use crate::config::{MirrorRepository, SourceRepository};
use crate::error::{MonitorError, Result};
use crate::model::{Changeset, ReplicationStatus};
use crate::repository::RepositoryClient;
use chrono::{DateTime, Utc};
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of "now" for elapsed-time computation.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Determines freshness or lag for one changeset at a time.
pub struct ReplicationStatusChecker<C: RepositoryClient> {
    client: Arc<C>,
    source: SourceRepository,
    clock: Clock,
}

impl<C: RepositoryClient> ReplicationStatusChecker<C> {
    pub fn new(client: Arc<C>, source: SourceRepository) -> Self {
        Self {
            client,
            source,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock (tests pin "now").
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &SourceRepository {
        &self.source
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Return the replication status of `changeset` on `mirror`.
    ///
    /// A publication time at or after "now" is reported as
    /// [`MonitorError::ClockSkew`] rather than clamped, so a changeset known to
    /// be missing is never reported fresh. A missing changeset published less
    /// than a second ago is one second behind.
    pub async fn check(&self, mirror: &MirrorRepository, changeset: &Changeset) -> Result<ReplicationStatus> {
        self.evaluate(mirror, changeset, || (self.clock)()).await
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub async fn check_at(
        &self,
        mirror: &MirrorRepository,
        changeset: &Changeset,
        now: DateTime<Utc>,
    ) -> Result<ReplicationStatus> {
        self.evaluate(mirror, changeset, || now).await
    }

    async fn evaluate<F>(&self, mirror: &MirrorRepository, changeset: &Changeset, now: F) -> Result<ReplicationStatus>
    where
        F: FnOnce() -> DateTime<Utc>,
    {
        if self.client.commit_in_mirror(mirror, changeset).await? {
            debug!(changeset = %changeset, callsign = mirror.callsign(), "Changeset present in mirror");
            return Ok(ReplicationStatus::fresh());
        }

        let published = self.client.publication_time(&self.source, changeset).await?;
        let now = now();

        // Missing and published under a second ago still counts as one second.
        let elapsed = (now - published).num_seconds();
        let elapsed = if published < now { elapsed.max(1) } else { elapsed };

        match u64::try_from(elapsed).ok().and_then(NonZeroU64::new) {
            Some(seconds) => Ok(ReplicationStatus::behind_by(seconds)),
            None => {
                warn!(
                    changeset = %changeset,
                    published = %published,
                    now = %now,
                    "Publication time is not in the past"
                );
                Err(MonitorError::ClockSkew {
                    changeset: changeset.to_string(),
                    published,
                    now,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::BoxFuture;
    use chrono::Duration;

    struct Fixed {
        in_mirror: bool,
        published: DateTime<Utc>,
    }

    impl RepositoryClient for Fixed {
        fn commit_in_mirror(&self, _m: &MirrorRepository, _c: &Changeset) -> BoxFuture<'_, bool> {
            let present = self.in_mirror;
            Box::pin(async move { Ok(present) })
        }

        fn publication_time(&self, _s: &SourceRepository, _c: &Changeset) -> BoxFuture<'_, DateTime<Utc>> {
            let published = self.published;
            Box::pin(async move { Ok(published) })
        }

        fn changesets_for_push(&self, _id: u64, _url: &str) -> BoxFuture<'_, Vec<Changeset>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn checker(in_mirror: bool, published: DateTime<Utc>, now: DateTime<Utc>) -> ReplicationStatusChecker<Fixed> {
        let source = SourceRepository::new("https://hg.example/repo").unwrap();
        ReplicationStatusChecker::new(Arc::new(Fixed { in_mirror, published }), source)
            .with_clock(Arc::new(move || now))
    }

    fn mirror() -> MirrorRepository {
        MirrorRepository::new("https://mirror.example", "TEST").unwrap()
    }

    fn changeset() -> Changeset {
        Changeset::new("0123456789ab").unwrap()
    }

    #[tokio::test]
    async fn test_present_is_fresh() {
        let now = Utc::now();
        let status = checker(true, now - Duration::days(3), now)
            .check(&mirror(), &changeset())
            .await
            .unwrap();
        assert_eq!(status, ReplicationStatus::fresh());
    }

    #[tokio::test]
    async fn test_absent_is_behind_by_elapsed() {
        let now = Utc::now();
        let status = checker(false, now - Duration::seconds(90), now)
            .check(&mirror(), &changeset())
            .await
            .unwrap();
        assert!(status.is_stale());
        assert_eq!(status.seconds_behind(), 90);
    }

    #[tokio::test]
    async fn test_elapsed_truncates_to_whole_seconds() {
        let now = Utc::now();
        let status = checker(false, now - Duration::milliseconds(2_999), now)
            .check(&mirror(), &changeset())
            .await
            .unwrap();
        assert_eq!(status.seconds_behind(), 2);
    }

    #[tokio::test]
    async fn test_future_publication_is_clock_skew() {
        let now = Utc::now();
        let err = checker(false, now + Duration::seconds(30), now)
            .check(&mirror(), &changeset())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::ClockSkew { .. }));
    }

    #[tokio::test]
    async fn test_sub_second_publication_is_one_second_behind() {
        let now = Utc::now();
        let status = checker(false, now - Duration::milliseconds(400), now)
            .check(&mirror(), &changeset())
            .await
            .unwrap();
        assert!(status.is_stale());
        assert_eq!(status.seconds_behind(), 1);
    }

    #[tokio::test]
    async fn test_publication_at_now_is_clock_skew() {
        let now = Utc::now();
        let err = checker(false, now, now)
            .check(&mirror(), &changeset())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::ClockSkew { .. }));
    }

    #[tokio::test]
    async fn test_check_at_ignores_wall_clock() {
        let now = Utc::now();
        let published = now - Duration::seconds(10);
        let status = checker(false, published, now)
            .check_at(&mirror(), &changeset(), published + Duration::seconds(600))
            .await
            .unwrap();
        assert_eq!(status.seconds_behind(), 600);
    }
}
