// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queue consumption engine.
//!
//! One [`QueueConsumptionEngine::run`] call is one monitoring cycle:
//! 1. Connects to the broker (single bounded attempt)
//! 2. Looks up the push exchange passively (the broker forbids declaring it)
//! 3. Declares and binds the per-user queue
//! 4. Waits up to the poll timeout for one delivery
//! 5. Hands the delivery to a [`MessageHandler`], or calls `on_idle`
//! 6. Closes the connection on every exit path
//!
//! Continuous monitoring comes from a scheduler calling `run` repeatedly. No
//! state survives between calls except the queue on the broker.
//!
//! The broker is reached through [`BrokerConnector`] / [`BrokerSession`] so
//! the protocol can be exercised without a live broker.

use crate::ack::{AckHandle, Acknowledger};
use crate::config::{BrokerConfig, MonitorConfig};
use crate::error::{MonitorError, Result};
use crate::metrics;
use crate::processor::{ProcessOutcome, PushMessageProcessor};
use crate::repository::{BoxFuture, RepositoryClient};
use crate::resilience::{retry, RetryConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A message delivered by the broker.
pub struct Delivery {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub body: Vec<u8>,
    pub acker: Box<dyn Acknowledger>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .field("bytes", &self.body.len())
            .finish()
    }
}

/// Opens broker sessions.
pub trait BrokerConnector: Send + Sync {
    fn connect(&self, config: &BrokerConfig) -> BoxFuture<'_, Box<dyn BrokerSession>>;
}

impl<T: BrokerConnector + ?Sized> BrokerConnector for Arc<T> {
    fn connect(&self, config: &BrokerConfig) -> BoxFuture<'_, Box<dyn BrokerSession>> {
        (**self).connect(config)
    }
}

/// One open broker connection.
pub trait BrokerSession: Send {
    /// Assert the exchange exists without declaring it.
    fn check_exchange(&mut self, exchange: &str) -> BoxFuture<'_, ()>;

    /// Declare a durable, non-exclusive, non-auto-delete queue and bind it.
    /// Must not declare the exchange.
    fn bind_queue(&mut self, queue: &str, exchange: &str, routing_key: &str) -> BoxFuture<'_, ()>;

    /// Register the single consumer with manual acknowledgment.
    fn start_consumer(&mut self, queue: &str) -> BoxFuture<'_, ()>;

    /// Wait up to `timeout` for a delivery. `None` means the queue is idle.
    fn next_delivery(&mut self, timeout: Duration) -> BoxFuture<'_, Option<Delivery>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Consumer callback for one delivery.
pub trait MessageHandler: Send + Sync {
    fn handle<'a>(&'a self, body: &'a [u8], ack: &'a mut AckHandle) -> BoxFuture<'a, ProcessOutcome>;
}

impl<C: RepositoryClient> MessageHandler for PushMessageProcessor<C> {
    fn handle<'a>(&'a self, body: &'a [u8], ack: &'a mut AckHandle) -> BoxFuture<'a, ProcessOutcome> {
        Box::pin(PushMessageProcessor::handle(self, body, ack))
    }
}

/// Result of one consumption cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing was delivered within the poll timeout.
    Idle,
    /// One message was handled.
    Processed(ProcessOutcome),
}

impl RunOutcome {
    /// False only when a push was found lagging.
    pub fn is_success(&self) -> bool {
        match self {
            RunOutcome::Idle => true,
            RunOutcome::Processed(outcome) => outcome.is_success(),
        }
    }
}

/// Drives one bounded consumption cycle per [`run`](Self::run) call.
pub struct QueueConsumptionEngine<B: BrokerConnector> {
    connector: B,
    retry: RetryConfig,
}

impl<B: BrokerConnector> QueueConsumptionEngine<B> {
    /// Engine with the fail-fast [`RetryConfig::broker`] connection policy.
    pub fn new(connector: B) -> Self {
        Self::with_retry(connector, RetryConfig::broker())
    }

    pub fn with_retry(connector: B, retry: RetryConfig) -> Self {
        Self { connector, retry }
    }

    /// Run one cycle: process at most one message, or report an idle queue.
    ///
    /// Under `dry_run` the handler's [`AckHandle`] never acknowledges, so the
    /// queue is never drained.
    pub async fn run<H, I>(
        &self,
        config: &BrokerConfig,
        poll_timeout: Duration,
        dry_run: bool,
        handler: &H,
        on_idle: I,
    ) -> Result<RunOutcome>
    where
        H: MessageHandler + ?Sized,
        I: FnOnce(),
    {
        config.validate()?;

        let mut session = self.connect(config).await?;
        let result = self
            .consume(&mut session, config, poll_timeout, dry_run, handler, on_idle)
            .await;

        match session.close().await {
            Ok(()) => debug!("Broker connection closed"),
            Err(e) if result.is_ok() => warn!(error = %e, "Failed to close broker connection"),
            Err(e) => debug!(error = %e, "Failed to close broker connection after error"),
        }

        info!("done");
        result
    }

    /// [`run`](Self::run) against `config.broker`, taking the poll timeout and
    /// dry-run flag from `config.settings`.
    pub async fn run_configured<H, I>(&self, config: &MonitorConfig, handler: &H, on_idle: I) -> Result<RunOutcome>
    where
        H: MessageHandler + ?Sized,
        I: FnOnce(),
    {
        self.run(
            &config.broker,
            config.settings.poll_timeout,
            config.settings.dry_run,
            handler,
            on_idle,
        )
        .await
    }

    async fn connect(&self, config: &BrokerConfig) -> Result<Box<dyn BrokerSession>> {
        info!(host = %config.host, port = config.port, "Connecting to broker");
        let timeout = self.retry.connection_timeout;
        retry(&self.retry, "broker connect", || async move {
            match tokio::time::timeout(timeout, self.connector.connect(config)).await {
                Ok(result) => result,
                Err(_) => Err(MonitorError::broker_msg(
                    "connect",
                    format!("timed out after {}ms", timeout.as_millis()),
                )),
            }
        })
        .await
    }

    async fn consume<H, I>(
        &self,
        session: &mut Box<dyn BrokerSession>,
        config: &BrokerConfig,
        poll_timeout: Duration,
        dry_run: bool,
        handler: &H,
        on_idle: I,
    ) -> Result<RunOutcome>
    where
        H: MessageHandler + ?Sized,
        I: FnOnce(),
    {
        session.check_exchange(&config.exchange).await?;

        let queue = config.qualified_queue_name();
        session
            .bind_queue(&queue, &config.exchange, &config.routing_key)
            .await?;
        session.start_consumer(&queue).await?;

        if dry_run {
            info!("transmission of monitoring data has been disabled");
            info!("message acks have been disabled");
        }

        info!(queue = %queue, timeout_ms = poll_timeout.as_millis() as u64, "Reading messages");
        match session.next_delivery(poll_timeout).await? {
            None => {
                info!("Message queue is empty");
                metrics::record_idle_poll();
                on_idle();
                Ok(RunOutcome::Idle)
            }
            Some(delivery) => {
                debug!(
                    delivery_tag = delivery.delivery_tag,
                    redelivered = delivery.redelivered,
                    "Delivery received"
                );
                let mut ack = AckHandle::new(delivery.acker, dry_run);
                let outcome = handler.handle(&delivery.body, &mut ack).await?;
                debug!(ack_state = %ack.state(), "Message resolved");
                Ok(RunOutcome::Processed(outcome))
            }
        }
    }
}
