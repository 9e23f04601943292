//! Value types shared by the checker, scanner, and processor.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

/// Shortest accepted changeset id (hg short form).
pub const MIN_CHANGESET_LEN: usize = 12;

/// Full changeset node length.
pub const FULL_CHANGESET_LEN: usize = 40;

/// A commit identifier: lowercase hex, 12 to 40 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Changeset(String);

impl Changeset {
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref().trim();
        if id.len() < MIN_CHANGESET_LEN || id.len() > FULL_CHANGESET_LEN {
            return Err(MonitorError::Config(format!(
                "changeset id {:?} must be {}..={} hex characters",
                id, MIN_CHANGESET_LEN, FULL_CHANGESET_LEN
            )));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MonitorError::Config(format!("changeset id {:?} is not hex", id)));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Changeset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Changeset {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Changeset {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Changeset> for String {
    fn from(value: Changeset) -> Self {
        value.0
    }
}

/// An atomic batch of changesets, earliest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub push_id: u64,
    pub changesets: Vec<Changeset>,
}

/// A mirrored object's replication status: fresh, or stale by some seconds.
///
/// `is_stale()` is true exactly when `seconds_behind() > 0`; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReplicationStatus {
    is_stale: bool,
    seconds_behind: u64,
}

impl ReplicationStatus {
    /// No replication delay.
    pub const fn fresh() -> Self {
        Self {
            is_stale: false,
            seconds_behind: 0,
        }
    }

    /// A replication delay of `seconds`.
    pub const fn behind_by(seconds: NonZeroU64) -> Self {
        Self {
            is_stale: true,
            seconds_behind: seconds.get(),
        }
    }

    pub const fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub const fn seconds_behind(&self) -> u64 {
        self.seconds_behind
    }
}

impl Default for ReplicationStatus {
    fn default() -> Self {
        Self::fresh()
    }
}

impl fmt::Display for ReplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stale {
            write!(f, "stale by {}s", self.seconds_behind)
        } else {
            f.write_str("fresh")
        }
    }
}
