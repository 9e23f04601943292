//! Mock RepositoryClient for testing.
//!
//! Records every mirror existence check and publication-time lookup for assertions.
//! Presence, publication times, push contents and failures are configured
//! per changeset.

use chrono::{DateTime, Utc};
use mirror_lag_monitor::repository::{BoxFuture, RepositoryClient};
use mirror_lag_monitor::{Changeset, MirrorRepository, MonitorError, SourceRepository};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Mock implementation of RepositoryClient that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = MockRepositoryClient::new();
/// mock.set_present(&cs, true);
/// mock.set_published(&cs, now() - Duration::seconds(30));
///
/// // Use in tests...
///
/// assert_eq!(mock.mirror_calls(), vec![cs.to_string()]);
/// ```
#[derive(Default)]
pub struct MockRepositoryClient {
    /// Changesets visible on the mirror
    present: Mutex<HashSet<String>>,
    /// Publication instants on the source
    published: Mutex<HashMap<String, DateTime<Utc>>>,
    /// Push id -> changesets
    pushes: Mutex<HashMap<u64, Vec<Changeset>>>,
    /// Changesets whose mirror existence check fails
    failing: Mutex<HashSet<String>>,
    /// Recorded commit_in_mirror() calls
    mirror_calls: Mutex<Vec<String>>,
    /// Recorded publication_time() calls
    publication_calls: Mutex<Vec<String>>,
    /// Recorded changesets_for_push() calls
    push_calls: Mutex<Vec<(u64, String)>>,
}

impl MockRepositoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_present(&self, changeset: &Changeset, present: bool) {
        let mut set = self.present.lock().unwrap();
        if present {
            set.insert(changeset.to_string());
        } else {
            set.remove(changeset.as_str());
        }
    }

    pub fn set_published(&self, changeset: &Changeset, at: DateTime<Utc>) {
        self.published.lock().unwrap().insert(changeset.to_string(), at);
    }

    pub fn set_push(&self, push_id: u64, changesets: Vec<Changeset>) {
        self.pushes.lock().unwrap().insert(push_id, changesets);
    }

    /// Make the mirror existence check for `changeset` fail with a 500.
    pub fn fail_mirror_check(&self, changeset: &Changeset) {
        self.failing.lock().unwrap().insert(changeset.to_string());
    }

    pub fn mirror_calls(&self) -> Vec<String> {
        self.mirror_calls.lock().unwrap().clone()
    }

    pub fn publication_calls(&self) -> Vec<String> {
        self.publication_calls.lock().unwrap().clone()
    }

    pub fn push_calls(&self) -> Vec<(u64, String)> {
        self.push_calls.lock().unwrap().clone()
    }
}

impl RepositoryClient for MockRepositoryClient {
    fn commit_in_mirror(&self, mirror: &MirrorRepository, changeset: &Changeset) -> BoxFuture<'_, bool> {
        self.mirror_calls.lock().unwrap().push(changeset.to_string());
        let result = if self.failing.lock().unwrap().contains(changeset.as_str()) {
            Err(MonitorError::UnexpectedStatus {
                url: mirror.commit_url(changeset.as_str()),
                status: 500,
            })
        } else {
            Ok(self.present.lock().unwrap().contains(changeset.as_str()))
        };
        Box::pin(async move { result })
    }

    fn publication_time(
        &self,
        source: &SourceRepository,
        changeset: &Changeset,
    ) -> BoxFuture<'_, DateTime<Utc>> {
        self.publication_calls.lock().unwrap().push(changeset.to_string());
        let result = self
            .published
            .lock()
            .unwrap()
            .get(changeset.as_str())
            .copied()
            .ok_or_else(|| MonitorError::UnexpectedStatus {
                url: source.json_rev_url(changeset.as_str()),
                status: 404,
            });
        Box::pin(async move { result })
    }

    fn changesets_for_push(&self, push_id: u64, push_json_url: &str) -> BoxFuture<'_, Vec<Changeset>> {
        self.push_calls
            .lock()
            .unwrap()
            .push((push_id, push_json_url.to_string()));
        let result = self
            .pushes
            .lock()
            .unwrap()
            .get(&push_id)
            .cloned()
            .ok_or_else(|| MonitorError::PushNotFound {
                push_id,
                url: push_json_url.to_string(),
            });
        Box::pin(async move { result })
    }
}
