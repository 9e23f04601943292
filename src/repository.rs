// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Repository integration traits.
//!
//! Defines what the checker and processor need from the outside world:
//! 1. Whether a changeset is visible on the mirror (`commit_in_mirror`)
//! 2. When a changeset was published on the source (`publication_time`)
//! 3. Which changesets belong to a push (`changesets_for_push`)
//!
//! [`HttpRepositoryClient`] implements these over HTTP. Tests substitute a
//! recording mock.
//!
//! # Example
//!
//! ```rust,no_run
//! use mirror_lag_monitor::repository::{BoxFuture, RepositoryClient};
//! use mirror_lag_monitor::config::{MirrorRepository, SourceRepository};
//! use mirror_lag_monitor::model::Changeset;
//! use chrono::{DateTime, Utc};
//!
//! struct AlwaysMirrored;
//!
//! impl RepositoryClient for AlwaysMirrored {
//!     fn commit_in_mirror(&self, _m: &MirrorRepository, _c: &Changeset) -> BoxFuture<'_, bool> {
//!         Box::pin(async { Ok(true) })
//!     }
//!
//!     fn publication_time(&self, _s: &SourceRepository, _c: &Changeset) -> BoxFuture<'_, DateTime<Utc>> {
//!         Box::pin(async { Ok(Utc::now()) })
//!     }
//!
//!     fn changesets_for_push(&self, _id: u64, _url: &str) -> BoxFuture<'_, Vec<Changeset>> {
//!         Box::pin(async { Ok(Vec::new()) })
//!     }
//! }
//! ```

use crate::config::{MirrorRepository, SourceRepository};
use crate::error::{MonitorError, Result};
use crate::model::Changeset;
use crate::transport::HttpTransport;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Lookups against the source and mirror hosts.
pub trait RepositoryClient: Send + Sync + 'static {
    /// Is the changeset present in the mirror?
    ///
    /// Errors for any response other than "present" or "absent".
    fn commit_in_mirror(&self, mirror: &MirrorRepository, changeset: &Changeset) -> BoxFuture<'_, bool>;

    /// Publication instant of the changeset in the source repository.
    fn publication_time(
        &self,
        source: &SourceRepository,
        changeset: &Changeset,
    ) -> BoxFuture<'_, DateTime<Utc>>;

    /// Changesets of a push, earliest first.
    fn changesets_for_push(&self, push_id: u64, push_json_url: &str) -> BoxFuture<'_, Vec<Changeset>>;
}

impl<T: RepositoryClient + ?Sized> RepositoryClient for Arc<T> {
    fn commit_in_mirror(&self, mirror: &MirrorRepository, changeset: &Changeset) -> BoxFuture<'_, bool> {
        (**self).commit_in_mirror(mirror, changeset)
    }

    fn publication_time(
        &self,
        source: &SourceRepository,
        changeset: &Changeset,
    ) -> BoxFuture<'_, DateTime<Utc>> {
        (**self).publication_time(source, changeset)
    }

    fn changesets_for_push(&self, push_id: u64, push_json_url: &str) -> BoxFuture<'_, Vec<Changeset>> {
        (**self).changesets_for_push(push_id, push_json_url)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Source repository wire formats
// ═══════════════════════════════════════════════════════════════════════════════

/// `date` field of a `json-rev` response: `[epoch_seconds, utc_offset_seconds]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HgDate(pub f64, pub i64);

/// The subset of a `json-rev` response we read.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRev {
    pub date: HgDate,
}

/// Convert an hg date pair to an absolute UTC instant (epoch plus offset).
///
/// Fractional seconds are truncated.
pub fn utc_publication_time(date: HgDate) -> Result<DateTime<Utc>> {
    let HgDate(epoch, offset) = date;
    if !epoch.is_finite() || epoch.abs() > i64::MAX as f64 {
        return Err(MonitorError::decode("hg date", format!("epoch {} out of range", epoch)));
    }
    let secs = (epoch.trunc() as i64)
        .checked_add(offset)
        .ok_or_else(|| MonitorError::decode("hg date", "epoch plus offset overflows"))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| MonitorError::decode("hg date", format!("timestamp {} out of range", secs)))
}

/// Parse a `json-rev` body into a publication instant.
pub fn parse_json_rev(body: &[u8]) -> Result<DateTime<Utc>> {
    let rev: JsonRev = serde_json::from_slice(body).map_err(|e| MonitorError::decode("json-rev", e))?;
    utc_publication_time(rev.date)
}

#[derive(Debug, Clone, Deserialize)]
struct PushEntry {
    changesets: Vec<Changeset>,
}

/// `json-pushes` body, version 2 (`{"pushes": {...}}`) or version 1 (bare map).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PushLog {
    V2 { pushes: HashMap<String, PushEntry> },
    V1(HashMap<String, PushEntry>),
}

impl PushLog {
    fn into_pushes(self) -> HashMap<String, PushEntry> {
        match self {
            PushLog::V2 { pushes } => pushes,
            PushLog::V1(pushes) => pushes,
        }
    }
}

/// Select the changesets of `push_id` from a `json-pushes` body.
///
/// When the key is missing but the log holds exactly one push, that push is
/// used: a push URL scoped to a single id may be keyed differently.
pub fn parse_push_log(body: &[u8], push_id: u64, url: &str) -> Result<Vec<Changeset>> {
    let log: PushLog = serde_json::from_slice(body).map_err(|e| MonitorError::decode("json-pushes", e))?;
    select_push(log, push_id, url)
}

fn select_push(log: PushLog, push_id: u64, url: &str) -> Result<Vec<Changeset>> {
    let mut pushes = log.into_pushes();

    if let Some(entry) = pushes.remove(&push_id.to_string()) {
        return Ok(entry.changesets);
    }
    if pushes.len() == 1 {
        if let Some((_, entry)) = pushes.into_iter().next() {
            return Ok(entry.changesets);
        }
    }
    Err(MonitorError::PushNotFound {
        push_id,
        url: url.to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP implementation
// ═══════════════════════════════════════════════════════════════════════════════

/// [`RepositoryClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRepositoryClient {
    http: HttpTransport,
}

impl HttpRepositoryClient {
    pub fn new(http: HttpTransport) -> Self {
        Self { http }
    }
}

impl RepositoryClient for HttpRepositoryClient {
    fn commit_in_mirror(&self, mirror: &MirrorRepository, changeset: &Changeset) -> BoxFuture<'_, bool> {
        let url = mirror.commit_url(changeset.as_str());
        Box::pin(async move {
            let status = self.http.head_status(&url).await?;
            match status {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                other => Err(MonitorError::UnexpectedStatus {
                    url,
                    status: other.as_u16(),
                }),
            }
        })
    }

    fn publication_time(
        &self,
        source: &SourceRepository,
        changeset: &Changeset,
    ) -> BoxFuture<'_, DateTime<Utc>> {
        let url = source.json_rev_url(changeset.as_str());
        Box::pin(async move {
            let rev: JsonRev = self.http.get_json(&url).await?;
            let published = utc_publication_time(rev.date)?;
            debug!(url = %url, published = %published, "Fetched publication time");
            Ok(published)
        })
    }

    fn changesets_for_push(&self, push_id: u64, push_json_url: &str) -> BoxFuture<'_, Vec<Changeset>> {
        let url = push_json_url.to_string();
        Box::pin(async move {
            let log: PushLog = self.http.get_json(&url).await?;
            let changesets = select_push(log, push_id, &url)?;
            debug!(push_id, count = changesets.len(), "Resolved push changesets");
            Ok(changesets)
        })
    }
}
