//! Shared test utilities for integration tests.
//!
//! This module provides:
//! - RabbitMQ testcontainer setup
//! - Mock RepositoryClient recording mirror and source lookups
//! - Mock broker connector/session and recording acknowledger
//! - Recording reporter and error sink
//! - Push notification body helpers

#![allow(dead_code)]

pub mod containers;
pub mod mock_broker;
pub mod mock_repository;

pub use containers::*;
pub use mock_broker::*;
pub use mock_repository::*;

use chrono::{DateTime, TimeZone, Utc};
use mirror_lag_monitor::{
    Changeset, ErrorSink, MirrorRepository, MonitorError, ReplicationStatus, Reporter, SourceRepository,
};
use std::sync::Mutex;

/// Fixed "now" used across tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A 40-hex changeset id derived from `n`.
pub fn changeset(n: u32) -> Changeset {
    Changeset::new(format!("{:040x}", n)).unwrap()
}

pub fn source() -> SourceRepository {
    SourceRepository::new("https://hg.example.org/integration/autoland").unwrap()
}

pub fn mirror() -> MirrorRepository {
    MirrorRepository::new("https://mirror.example.org", "MOZILLACENTRAL").unwrap()
}

/// A `changegroup.1` body with one push per entry of `push_ids`.
pub fn push_message(push_ids: &[u64]) -> Vec<u8> {
    let pushes: Vec<serde_json::Value> = push_ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "pushid": id,
                "time": 1_700_000_000,
                "user": "dev@example.org",
                "push_json_url": push_json_url(*id),
                "push_full_json_url": format!("{}&full=1", push_json_url(*id)),
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "payload": {
            "type": "changegroup.1",
            "data": {
                "repo_url": "https://hg.example.org/integration/autoland",
                "heads": [],
                "pushlog_pushes": pushes,
            }
        }
    }))
    .unwrap()
}

/// A notification of some other type.
pub fn other_message(kind: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "payload": {"type": kind, "data": {"repo_url": "https://hg.example.org/x"}}
    }))
    .unwrap()
}

pub fn push_json_url(push_id: u64) -> String {
    format!(
        "https://hg.example.org/integration/autoland/json-pushes?version=2&startID={}&endID={}",
        push_id.saturating_sub(1),
        push_id
    )
}

/// Records every reported status.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(String, ReplicationStatus)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, ReplicationStatus)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, mirror: &MirrorRepository, status: &ReplicationStatus) {
        self.reports
            .lock()
            .unwrap()
            .push((mirror.callsign().to_string(), *status));
    }
}

/// Records `context: kind` for every captured error.
#[derive(Default)]
pub struct CollectingErrorSink {
    captured: Mutex<Vec<String>>,
}

impl CollectingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> Vec<String> {
        self.captured.lock().unwrap().clone()
    }
}

impl ErrorSink for CollectingErrorSink {
    fn capture(&self, error: &MonitorError, context: &str) {
        self.captured
            .lock()
            .unwrap()
            .push(format!("{}: {}", context, error.kind()));
    }
}
