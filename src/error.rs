// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the mirror lag monitor.
//!
//! Errors are categorized by their source (HTTP transport, AMQP broker,
//! configuration, etc.) and carry enough context to find the failing request.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `Transport` | Yes | Network errors, timeouts, connection failures |
//! | `UnexpectedStatus` | Server errors only | Status that is neither "present" nor "absent" |
//! | `Broker` | Yes | AMQP connection or channel failure |
//! | `PushNotFound` | No | Push log did not contain the announced push |
//! | `Decode` | No | Response body did not have the expected shape |
//! | `ClockSkew` | No | Publication time is not in the past |
//! | `Config` | No | Configuration invalid |
//! | `InvalidState` | No | Engine state machine violation |
//!
//! Malformed queue messages are not errors: the processor skips and
//! acknowledges them. A lagging mirror is not an error either; it is the
//! `Lagging` outcome of [`crate::processor::ProcessOutcome`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that can occur while checking replication.
///
/// Use [`is_retryable()`](Self::is_retryable) to check if the operation
/// should be attempted again.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// HTTP request failed before a response was received.
    #[error("Transport error ({operation}): {message}")]
    Transport {
        operation: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// HTTP response carried a status the caller cannot interpret.
    ///
    /// For the mirror existence check this is anything other than 200 or 404.
    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },

    /// AMQP broker communication failure.
    #[error("Broker error ({operation}): {message}")]
    Broker {
        operation: String,
        message: String,
        #[source]
        source: Option<lapin::Error>,
    },

    /// The push log fetched from the source did not contain the push.
    #[error("Push {push_id} not found at {url}")]
    PushNotFound { push_id: u64, url: String },

    /// A response body could not be decoded.
    #[error("Decode error ({context}): {message}")]
    Decode { context: String, message: String },

    /// The changeset's publication time is not before the check time.
    #[error("Clock skew for changeset {changeset}: published {published}, checked {now}")]
    ClockSkew {
        changeset: String,
        published: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation attempted in the wrong state.
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },
}

impl MonitorError {
    /// Create a transport error from a reqwest error.
    pub fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a transport error without source.
    pub fn transport_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a broker error from a lapin error.
    pub fn broker(operation: impl Into<String>, source: lapin::Error) -> Self {
        Self::Broker {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a broker error without source.
    pub fn broker_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Broker {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn decode(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::UnexpectedStatus { status, .. } => is_retryable_status(*status),
            Self::Broker { .. } => true,
            Self::PushNotFound { .. } => false,
            Self::Decode { .. } => false,
            Self::ClockSkew { .. } => false,
            Self::Config(_) => false,
            Self::InvalidState { .. } => false,
        }
    }

    /// Short label for metrics and error sinks.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::UnexpectedStatus { .. } => "unexpected_status",
            Self::Broker { .. } => "broker",
            Self::PushNotFound { .. } => "push_not_found",
            Self::Decode { .. } => "decode",
            Self::ClockSkew { .. } => "clock_skew",
            Self::Config(_) => "config",
            Self::InvalidState { .. } => "invalid_state",
        }
    }
}

/// Statuses the transport retries: transient gateway and server failures.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        Self::transport("unknown", e)
    }
}

impl From<lapin::Error> for MonitorError {
    fn from(e: lapin::Error) -> Self {
        Self::broker("unknown", e)
    }
}
