//! HTTP transport with bounded retry.
//!
//! Wraps a `reqwest::Client` and applies [`RetryConfig`] to every request.
//! Connection failures, timeouts and 500/502/503/504 responses are retried;
//! every other status is returned to the caller to interpret.

use crate::error::{is_retryable_status, MonitorError, Result};
use crate::metrics;
use crate::resilience::{retry, RetryConfig};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

/// HTTP client shared by the repository clients.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    head_client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    /// Build a transport whose per-request timeout is `retry.connection_timeout`.
    ///
    /// HEAD requests never follow redirects, so a 3xx reaches the caller
    /// instead of the redirect target's status. GET follows them.
    pub fn new(retry: RetryConfig) -> Result<Self> {
        let client = Self::builder(&retry)
            .build()
            .map_err(|e| MonitorError::transport("build client", e))?;
        let head_client = Self::builder(&retry)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MonitorError::transport("build client", e))?;
        Ok(Self {
            client,
            head_client,
            retry,
        })
    }

    fn builder(retry: &RetryConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(retry.connection_timeout)
            .user_agent(concat!("mirror-lag-monitor/", env!("CARGO_PKG_VERSION")))
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Issue a HEAD request and return the final status.
    ///
    /// Retryable statuses that persist past the last attempt become
    /// [`MonitorError::UnexpectedStatus`].
    pub async fn head_status(&self, url: &str) -> Result<StatusCode> {
        retry(&self.retry, "HEAD", || async {
            let resp = self
                .head_client
                .head(url)
                .send()
                .await
                .map_err(|e| MonitorError::transport(format!("HEAD {}", url), e))?;
            let status = resp.status();
            metrics::record_http_request("head", status.as_u16());
            trace!(url, status = status.as_u16(), "HEAD response");

            if is_retryable_status(status.as_u16()) {
                return Err(MonitorError::UnexpectedStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(status)
        })
        .await
    }

    /// Issue a GET request and decode a JSON body.
    ///
    /// Any non-success status is an error; only server errors are retried.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = retry(&self.retry, "GET", || async {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| MonitorError::transport(format!("GET {}", url), e))?;
            let status = resp.status();
            metrics::record_http_request("get", status.as_u16());

            if !status.is_success() {
                return Err(MonitorError::UnexpectedStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            resp.bytes()
                .await
                .map_err(|e| MonitorError::transport(format!("GET {} (body)", url), e))
        })
        .await?;

        debug!(url, bytes = body.len(), "GET response");
        serde_json::from_slice(&body).map_err(|e| MonitorError::decode(url, e))
    }
}
