//! Injected error capture.
//!
//! Call sites that must report failures to an operator channel receive an
//! [`ErrorSink`] and wrap the fallible work in [`capture`]. The error is
//! recorded and then returned unchanged, so the caller still decides what
//! happens next.

use crate::error::{MonitorError, Result};
use crate::metrics;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// Destination for captured errors.
pub trait ErrorSink: Send + Sync {
    fn capture(&self, error: &MonitorError, context: &str);
}

impl<T: ErrorSink + ?Sized> ErrorSink for Arc<T> {
    fn capture(&self, error: &MonitorError, context: &str) {
        (**self).capture(error, context)
    }
}

/// Logs the error and counts it by kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn capture(&self, err: &MonitorError, context: &str) {
        metrics::record_error(err.kind());
        error!(context, kind = err.kind(), retryable = err.is_retryable(), error = %err, "Captured error");
    }
}

/// Drops every error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopErrorSink;

impl ErrorSink for NoopErrorSink {
    fn capture(&self, _error: &MonitorError, _context: &str) {}
}

/// Await `fut`; if it fails, hand the error to `sink` and return it.
pub async fn capture<T, Fut>(sink: &dyn ErrorSink, context: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fut.await {
        Ok(value) => Ok(value),
        Err(e) => {
            sink.capture(&e, context);
            Err(e)
        }
    }
}
