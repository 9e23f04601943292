// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! AMQP broker adapter.
//!
//! Implements [`BrokerConnector`] / [`BrokerSession`] with `lapin`.
//!
//! # Broker Rules
//!
//! The push notification broker forbids declaring exchanges, so:
//! - the exchange is only ever looked up with `passive: true`
//! - the queue is declared on its own (`queue.declare` + `queue.bind`),
//!   never through a helper that would redeclare the exchange
//!
//! Deliveries are consumed with manual acknowledgment and a prefetch of one.
//! A delivery that is never acknowledged returns to the queue when the
//! connection closes.

use crate::ack::Acknowledger;
use crate::config::BrokerConfig;
use crate::engine::{BrokerConnector, BrokerSession, Delivery};
use crate::error::MonitorError;
use crate::repository::BoxFuture;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use std::time::Duration;
use tracing::{debug, trace};

/// Consumer tag announced to the broker.
pub const CONSUMER_TAG: &str = "mirror-lag-monitor";

/// Opens AMQP connections described by a [`BrokerConfig`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AmqpConnector;

impl BrokerConnector for AmqpConnector {
    fn connect(&self, config: &BrokerConfig) -> BoxFuture<'_, Box<dyn BrokerSession>> {
        let uri = config.amqp_uri();
        Box::pin(async move {
            let uri = uri?;
            let connection = Connection::connect(&uri, ConnectionProperties::default())
                .await
                .map_err(|e| MonitorError::broker("connect", e))?;
            let channel = connection
                .create_channel()
                .await
                .map_err(|e| MonitorError::broker("channel.open", e))?;
            debug!(channel_id = channel.id(), "Broker channel open");

            let session: Box<dyn BrokerSession> = Box::new(AmqpSession {
                connection,
                channel,
                consumer: None,
            });
            Ok(session)
        })
    }
}

struct AmqpSession {
    connection: Connection,
    channel: Channel,
    consumer: Option<Consumer>,
}

impl BrokerSession for AmqpSession {
    fn check_exchange(&mut self, exchange: &str) -> BoxFuture<'_, ()> {
        let exchange = exchange.to_string();
        Box::pin(async move {
            let options = ExchangeDeclareOptions {
                passive: true,
                ..ExchangeDeclareOptions::default()
            };
            self.channel
                .exchange_declare(&exchange, ExchangeKind::Topic, options, FieldTable::default())
                .await
                .map_err(|e| MonitorError::broker(format!("exchange.declare(passive) {}", exchange), e))
        })
    }

    fn bind_queue(&mut self, queue: &str, exchange: &str, routing_key: &str) -> BoxFuture<'_, ()> {
        let queue = queue.to_string();
        let exchange = exchange.to_string();
        let routing_key = routing_key.to_string();
        Box::pin(async move {
            let options = QueueDeclareOptions {
                passive: false,
                durable: true,
                exclusive: false,
                auto_delete: false,
                nowait: false,
            };
            let declared = self
                .channel
                .queue_declare(&queue, options, FieldTable::default())
                .await
                .map_err(|e| MonitorError::broker(format!("queue.declare {}", queue), e))?;
            debug!(queue = %queue, messages = declared.message_count(), "Queue declared");

            self.channel
                .queue_bind(
                    &queue,
                    &exchange,
                    &routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| MonitorError::broker(format!("queue.bind {}", queue), e))
        })
    }

    fn start_consumer(&mut self, queue: &str) -> BoxFuture<'_, ()> {
        let queue = queue.to_string();
        Box::pin(async move {
            self.channel
                .basic_qos(1, BasicQosOptions::default())
                .await
                .map_err(|e| MonitorError::broker("basic.qos", e))?;
            let consumer = self
                .channel
                .basic_consume(&queue, CONSUMER_TAG, BasicConsumeOptions::default(), FieldTable::default())
                .await
                .map_err(|e| MonitorError::broker(format!("basic.consume {}", queue), e))?;
            self.consumer = Some(consumer);
            Ok(())
        })
    }

    fn next_delivery(&mut self, timeout: Duration) -> BoxFuture<'_, Option<Delivery>> {
        Box::pin(async move {
            let consumer = self.consumer.as_mut().ok_or_else(|| MonitorError::InvalidState {
                expected: "Consuming".to_string(),
                actual: "NoConsumer".to_string(),
            })?;

            match tokio::time::timeout(timeout, consumer.next()).await {
                Err(_) => Ok(None),
                Ok(None) => Err(MonitorError::broker_msg("basic.deliver", "consumer stream ended")),
                Ok(Some(Err(e))) => Err(MonitorError::broker("basic.deliver", e)),
                Ok(Some(Ok(delivery))) => {
                    trace!(delivery_tag = delivery.delivery_tag, "AMQP delivery");
                    Ok(Some(Delivery {
                        delivery_tag: delivery.delivery_tag,
                        redelivered: delivery.redelivered,
                        body: delivery.data,
                        acker: Box::new(AmqpAcker(delivery.acker)),
                    }))
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.consumer = None;
            self.connection
                .close(200, "OK")
                .await
                .map_err(|e| MonitorError::broker("connection.close", e))
        })
    }
}

struct AmqpAcker(Acker);

impl Acknowledger for AmqpAcker {
    fn ack(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.0
                .ack(BasicAckOptions::default())
                .await
                .map_err(|e| MonitorError::broker("basic.ack", e))
        })
    }
}
