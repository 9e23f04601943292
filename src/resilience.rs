//! Resilience utilities: retry logic with exponential backoff.
//!
//! Transient failures (connection resets, timeouts, 5xx gateway errors) are
//! retried here, at the transport layer. This is separate from the
//! application-level policy for a lagging mirror, which leaves the queue
//! message unacknowledged for the next scheduled run.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> mirror_lag_monitor::Result<()> {
//! use mirror_lag_monitor::resilience::{retry, RetryConfig};
//!
//! let config = RetryConfig::transport();
//! let body = retry(&config, "GET json-rev", || async {
//!     Ok::<_, mirror_lag_monitor::MonitorError>("{}".to_string())
//! })
//! .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    /// Must be at least 1.
    pub max_attempts: usize,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries (ceiling for exponential backoff).
    pub max_delay: Duration,

    /// Backoff multiplier (e.g., 2.0 = double delay each retry).
    pub backoff_factor: f64,

    /// Timeout for each individual attempt.
    pub connection_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::transport()
    }
}

impl RetryConfig {
    /// HTTP session retry policy.
    ///
    /// Three attempts with a 0.3s backoff base, doubling.
    ///
    /// ```text
    /// Attempt  Delay before next
    /// -------  -----------------
    /// 1        300ms
    /// 2        600ms
    /// 3        (give up)
    /// ```
    pub fn transport() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            connection_timeout: Duration::from_secs(30),
        }
    }

    /// Broker connection policy: one bounded attempt, fail fast.
    ///
    /// A scheduler invokes the monitor again soon, so a broker outage is
    /// surfaced instead of retried.
    pub fn broker() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_factor: 1.0,
            connection_timeout: Duration::from_secs(30),
        }
    }

    /// Fast-fail retry for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            connection_timeout: Duration::from_millis(500),
        }
    }

    /// Calculate delay for a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self.backoff_factor.powi((attempt - 1) as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let delay = Duration::from_secs_f64(delay_secs);

        std::cmp::min(delay, self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `max_attempts` is reached.
///
/// Retryability is decided by [`MonitorError::is_retryable`](crate::MonitorError::is_retryable).
pub async fn retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
