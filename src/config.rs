//! Configuration for the mirror lag monitor.
//!
//! This module defines the immutable repository descriptions and the broker
//! settings needed for one consumption cycle. Repository values are validated
//! at construction so the rest of the crate can build URLs from them without
//! re-checking.
//!
//! # Quick Start
//!
//! ```rust
//! use mirror_lag_monitor::config::{MirrorRepository, SourceRepository};
//!
//! let source = SourceRepository::new("https://hg.mozilla.org/integration/autoland/").unwrap();
//! let mirror = MirrorRepository::new("https://phabricator.services.mozilla.com", "MOZILLACENTRAL").unwrap();
//! assert_eq!(source.url(), "https://hg.mozilla.org/integration/autoland");
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! MonitorConfig
//! ├── source: SourceRepository     # hg host publishing the changesets
//! ├── mirror: MirrorRepository     # mirror URL + callsign
//! ├── broker: BrokerConfig         # AMQP credentials, exchange, queue
//! └── settings: MonitorSettings    # dry-run, poll timeout, metric namespace
//! ```

use crate::error::{MonitorError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default mirror host.
pub const DEFAULT_MIRROR_URL: &str = "https://phabricator.services.mozilla.com";

/// Default push notification exchange.
pub const DEFAULT_EXCHANGE: &str = "exchange/hgpushes/v2";

/// Default broker host.
pub const DEFAULT_BROKER_HOST: &str = "pulse.mozilla.org";

/// Default broker port (AMQP over TLS).
pub const DEFAULT_BROKER_PORT: u16 = 5671;

/// Default metric namespace.
pub const DEFAULT_METRIC_NAMESPACE: &str = "mirror_lag_monitor";

fn normalize_base_url(raw: &str, what: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(MonitorError::Config(format!("{} URL is empty", what)));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| MonitorError::Config(format!("invalid {} URL {:?}: {}", what, raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(MonitorError::Config(format!(
            "{} URL must use http or https, got {:?}",
            what, other
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Repositories
// ═══════════════════════════════════════════════════════════════════════════════

/// The authoritative Mercurial repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceRepository {
    url: String,
}

impl SourceRepository {
    /// Validate and normalize a repository base URL (trailing slashes removed).
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            url: normalize_base_url(url.as_ref(), "source repository")?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Commit metadata endpoint, e.g. `https://hg.mozilla.org/mozilla-central/json-rev/deafa2891c61`.
    pub fn json_rev_url(&self, changeset: &str) -> String {
        format!("{}/json-rev/{}", self.url, changeset)
    }
}

impl TryFrom<String> for SourceRepository {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SourceRepository> for String {
    fn from(value: SourceRepository) -> Self {
        value.url
    }
}

/// A mirror of the source repository, addressed by callsign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMirror", into = "RawMirror")]
pub struct MirrorRepository {
    url: String,
    callsign: String,
}

#[derive(Serialize, Deserialize)]
struct RawMirror {
    url: String,
    callsign: String,
}

impl MirrorRepository {
    /// Validate a mirror description.
    ///
    /// The callsign must be non-empty ASCII alphanumeric; it is embedded
    /// verbatim in commit URLs.
    pub fn new(url: impl AsRef<str>, callsign: impl Into<String>) -> Result<Self> {
        let url = normalize_base_url(url.as_ref(), "mirror")?;
        let callsign = callsign.into();
        if callsign.is_empty() {
            return Err(MonitorError::Config("repository callsign is empty".to_string()));
        }
        if !callsign.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MonitorError::Config(format!(
                "repository callsign {:?} must be ASCII alphanumeric",
                callsign
            )));
        }
        Ok(Self { url, callsign })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    /// Per-commit URL on the mirror.
    ///
    /// Example: `https://phabricator.services.mozilla.com/rMOZILLACENTRAL7395257233f2fce9f80a7660cbfb2b91d379b28f`
    pub fn commit_url(&self, changeset: &str) -> String {
        format!("{}/r{}{}", self.url, self.callsign, changeset)
    }
}

impl TryFrom<RawMirror> for MirrorRepository {
    type Error = MonitorError;

    fn try_from(raw: RawMirror) -> Result<Self> {
        Self::new(raw.url, raw.callsign)
    }
}

impl From<MirrorRepository> for RawMirror {
    fn from(m: MirrorRepository) -> Self {
        RawMirror {
            url: m.url,
            callsign: m.callsign,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Broker
// ═══════════════════════════════════════════════════════════════════════════════

/// Connection and binding settings for the push notification broker.
#[derive(Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Connect with TLS (`amqps`). The public broker only accepts TLS.
    #[serde(default = "default_use_tls")]
    pub use_tls: bool,

    pub username: String,

    pub password: String,

    /// Topic exchange carrying push notifications. Must already exist.
    #[serde(default = "default_exchange")]
    pub exchange: String,

    /// Queue name without the per-user prefix.
    pub queue_name: String,

    pub routing_key: String,
}

fn default_broker_host() -> String {
    DEFAULT_BROKER_HOST.to_string()
}

fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn default_use_tls() -> bool {
    true
}

fn default_exchange() -> String {
    DEFAULT_EXCHANGE.to_string()
}

impl BrokerConfig {
    /// Queue names on the broker must be prefixed with the username.
    pub fn qualified_queue_name(&self) -> String {
        format!("queue/{}/{}", self.username, self.queue_name)
    }

    /// AMQP URI with percent-encoded credentials and the default vhost.
    pub fn amqp_uri(&self) -> Result<String> {
        let scheme = if self.use_tls { "amqps" } else { "amqp" };
        let mut url = Url::parse(&format!("{}://{}:{}/%2f", scheme, self.host, self.port))
            .map_err(|e| MonitorError::Config(format!("invalid broker host {:?}: {}", self.host, e)))?;
        url.set_username(&self.username)
            .map_err(|_| MonitorError::Config("broker username cannot be set".to_string()))?;
        url.set_password(Some(&self.password))
            .map_err(|_| MonitorError::Config("broker password cannot be set".to_string()))?;
        Ok(url.to_string())
    }

    /// Check required fields at startup.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("exchange", &self.exchange),
            ("queue_name", &self.queue_name),
            ("routing_key", &self.routing_key),
        ] {
            if value.trim().is_empty() {
                return Err(MonitorError::Config(format!("broker {} is empty", name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("exchange", &self.exchange)
            .field("queue_name", &self.queue_name)
            .field("routing_key", &self.routing_key)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MonitorSettings
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-run behavior switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Evaluate and report without acknowledging any message.
    #[serde(default)]
    pub dry_run: bool,

    /// How long to wait for a delivery before declaring the queue idle.
    #[serde(default = "default_poll_timeout", with = "duration_secs")]
    pub poll_timeout: Duration,

    /// Prefix for emitted metric names.
    #[serde(default = "default_metric_namespace")]
    pub metric_namespace: String,
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_metric_namespace() -> String {
    DEFAULT_METRIC_NAMESPACE.to_string()
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            poll_timeout: default_poll_timeout(),
            metric_namespace: default_metric_namespace(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom("poll timeout must be a non-negative number"));
        }
        Ok(Duration::from_secs_f64(secs))
    }
}

/// Everything a monitoring run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub source: SourceRepository,
    pub mirror: MirrorRepository,
    pub broker: BrokerConfig,
    #[serde(default)]
    pub settings: MonitorSettings,
}
