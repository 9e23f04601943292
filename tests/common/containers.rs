// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Testcontainers setup for RabbitMQ.
//!
//! Provides a broker container plus helpers to create the push exchange and
//! publish notifications, standing in for the upstream publisher.

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties, ExchangeKind};
use mirror_lag_monitor::BrokerConfig;
use testcontainers::{clients::Cli, core::WaitFor, Container, GenericImage};

pub const AMQP_PORT: u16 = 5672;

/// Create a vanilla RabbitMQ container.
///
/// Uses the official rabbitmq:3 image. Waits for "Server startup complete".
pub fn rabbitmq_container(docker: &Cli) -> Container<'_, GenericImage> {
    let image = GenericImage::new("rabbitmq", "3-alpine")
        .with_exposed_port(AMQP_PORT)
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"));
    docker.run(image)
}

/// Plain-AMQP broker settings for a container (default guest account).
pub fn broker_config(container: &Container<'_, GenericImage>, exchange: &str, queue: &str) -> BrokerConfig {
    BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: container.get_host_port_ipv4(AMQP_PORT),
        use_tls: false,
        username: "guest".to_string(),
        password: "guest".to_string(),
        exchange: exchange.to_string(),
        queue_name: queue.to_string(),
        routing_key: "integration/autoland".to_string(),
    }
}

/// Publisher side of the broker: owns the exchange.
pub struct TestPublisher {
    connection: Connection,
}

impl TestPublisher {
    pub async fn connect(config: &BrokerConfig) -> lapin::Result<Self> {
        let uri = config.amqp_uri().expect("valid broker uri");
        let connection = Connection::connect(&uri, ConnectionProperties::default()).await?;
        Ok(Self { connection })
    }

    /// Declare the topic exchange the monitor expects to exist.
    pub async fn declare_exchange(&self, exchange: &str) -> lapin::Result<()> {
        let channel = self.connection.create_channel().await?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
    }

    pub async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> lapin::Result<()> {
        let channel = self.connection.create_channel().await?;
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Number of messages ready on a queue.
    pub async fn queue_depth(&self, queue: &str) -> lapin::Result<u32> {
        let channel = self.connection.create_channel().await?;
        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(declared.message_count())
    }
}
