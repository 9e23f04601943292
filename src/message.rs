// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Push notification message format.
//!
//! Body of a `changegroup.1` notification on the hg push exchange:
//!
//! ```json
//! {
//!   "payload": {
//!     "type": "changegroup.1",
//!     "data": {
//!       "repo_url": "https://hg.mozilla.org/integration/autoland",
//!       "heads": ["..."],
//!       "pushlog_pushes": [
//!         {
//!           "pushid": 12345,
//!           "time": 1536000000,
//!           "user": "someone@example.com",
//!           "push_json_url": "https://hg.mozilla.org/integration/autoland/json-pushes?version=2&startID=12344&endID=12345",
//!           "push_full_json_url": "..."
//!         }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! The push count should always be 0 or 1. Other message types carry
//! unrelated `data` shapes and are only inspected for their `type`.

use serde::Deserialize;
use std::fmt;

/// Message type announcing new changesets.
pub const PUSH_MESSAGE_TYPE: &str = "changegroup.1";

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    payload: Payload,
}

#[derive(Debug, Clone, Deserialize)]
struct Payload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChangegroupData {
    pushlog_pushes: Vec<PushlogPush>,
}

/// One entry of `pushlog_pushes`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushlogPush {
    pub pushid: u64,
    pub push_json_url: String,
    #[serde(default)]
    pub push_full_json_url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
}

/// Why a message was skipped without evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Body is not a decodable notification.
    Malformed(String),
    /// Notification type other than `changegroup.1`.
    UnexpectedType(String),
    /// `changegroup.1` without pushes.
    NoPushes,
    /// More than one push in a message; the publisher promises at most one.
    MultiplePushes(usize),
}

impl SkipReason {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Malformed(_) => "malformed",
            SkipReason::UnexpectedType(_) => "unexpected_type",
            SkipReason::NoPushes => "no_pushes",
            SkipReason::MultiplePushes(_) => "multiple_pushes",
        }
    }

    /// Protocol violations that deserve operator attention.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, SkipReason::Malformed(_) | SkipReason::MultiplePushes(_))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed(e) => write!(f, "malformed message: {}", e),
            SkipReason::UnexpectedType(t) => write!(f, "message of type {}", t),
            SkipReason::NoPushes => f.write_str("message with zero pushes"),
            SkipReason::MultiplePushes(n) => {
                write!(f, "invalid message with multiple pushes (expected 0 or 1, got {})", n)
            }
        }
    }
}

/// Outcome of validating a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Exactly one push to evaluate.
    Push(PushlogPush),
    Skip(SkipReason),
}

/// Decode and validate a message body.
pub fn validate(body: &[u8]) -> Validation {
    let envelope: Envelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => return Validation::Skip(SkipReason::Malformed(e.to_string())),
    };

    let payload = envelope.payload;
    if payload.kind != PUSH_MESSAGE_TYPE {
        return Validation::Skip(SkipReason::UnexpectedType(payload.kind));
    }

    let data: ChangegroupData = match serde_json::from_value(payload.data) {
        Ok(data) => data,
        Err(e) => return Validation::Skip(SkipReason::Malformed(e.to_string())),
    };

    let mut pushes = data.pushlog_pushes;
    match pushes.len() {
        0 => Validation::Skip(SkipReason::NoPushes),
        1 => match pushes.pop() {
            Some(push) => Validation::Push(push),
            None => Validation::Skip(SkipReason::NoPushes),
        },
        n => Validation::Skip(SkipReason::MultiplePushes(n)),
    }
}
