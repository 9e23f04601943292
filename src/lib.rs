//! # Mirror Lag Monitor
//!
//! Measures how far a repository mirror lags behind its source repository.
//!
//! ## Architecture
//!
//! Each invocation performs one bounded consumption cycle against the push
//! notification queue:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                           mirror-lag-monitor                              │
//! │                                                                           │
//! │  ┌──────────────────┐   ┌──────────────────────┐   ┌──────────────────┐   │
//! │  │ QueueConsumption │──►│ PushMessageProcessor │──►│ MirrorLagScanner │   │
//! │  │ Engine (AMQP)    │   │ (validate + resolve) │   │ (fail-fast scan) │   │
//! │  └──────────────────┘   └──────────────────────┘   └──────────────────┘   │
//! │          │                        │                         │             │
//! │          ▼                        ▼                         ▼             │
//! │  ┌──────────────────┐   ┌──────────────────────┐   ┌──────────────────┐   │
//! │  │ AckHandle        │   │ Reporter             │   │ StatusChecker    │   │
//! │  │ (ack / defer)    │   │ (gauge or console)   │   │ (HTTP lookups)   │   │
//! │  └──────────────────┘   └──────────────────────┘   └──────────────────┘   │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Acknowledgment Policy
//!
//! 1. **Replicated**: every changeset of the push is on the mirror; the message is acknowledged
//! 2. **Lagging**: the message stays unacknowledged and is redelivered to the next run
//! 3. **Skipped**: non-push or invalid messages are acknowledged without evaluation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mirror_lag_monitor::{
//!     AmqpConnector, BrokerConfig, ConsoleReporter, HttpRepositoryClient, HttpTransport,
//!     MirrorLagScanner, MirrorRepository, NoopErrorSink, PushMessageProcessor,
//!     QueueConsumptionEngine, ReplicationStatusChecker, RetryConfig, SourceRepository,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(broker: BrokerConfig) -> mirror_lag_monitor::Result<()> {
//! let source = SourceRepository::new("https://hg.mozilla.org/integration/autoland")?;
//! let mirror = MirrorRepository::new("https://phabricator.services.mozilla.com", "MOZILLACENTRAL")?;
//!
//! let client = Arc::new(HttpRepositoryClient::new(HttpTransport::new(RetryConfig::transport())?));
//! let checker = Arc::new(ReplicationStatusChecker::new(client, source));
//! let processor = PushMessageProcessor::new(
//!     MirrorLagScanner::new(checker),
//!     mirror,
//!     Arc::new(ConsoleReporter),
//!     Arc::new(NoopErrorSink),
//! );
//!
//! let engine = QueueConsumptionEngine::new(AmqpConnector);
//! let outcome = engine
//!     .run(&broker, Duration::from_secs(1), true, &processor, || {})
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod ack;
pub mod broker;
pub mod checker;
pub mod config;
pub mod engine;
pub mod error;
pub mod error_sink;
pub mod message;
pub mod metrics;
pub mod model;
pub mod processor;
pub mod reporter;
pub mod repository;
pub mod resilience;
pub mod scanner;
pub mod transport;

// Re-exports for convenience
pub use ack::{AckHandle, AckState, Acknowledger};
pub use broker::AmqpConnector;
pub use checker::ReplicationStatusChecker;
pub use config::{BrokerConfig, MirrorRepository, MonitorConfig, MonitorSettings, SourceRepository};
pub use engine::{BrokerConnector, BrokerSession, Delivery, MessageHandler, QueueConsumptionEngine, RunOutcome};
pub use error::{MonitorError, Result};
pub use error_sink::{ErrorSink, NoopErrorSink, TracingErrorSink};
pub use message::{PushlogPush, SkipReason, Validation};
pub use metrics::{FacadeSink, InMemorySink, MetricsSink, NoopSink};
pub use model::{Changeset, Push, ReplicationStatus};
pub use processor::{ProcessOutcome, PushMessageProcessor};
pub use reporter::{ConsoleReporter, MetricsReporter, Reporter};
pub use repository::{HttpRepositoryClient, RepositoryClient};
pub use resilience::RetryConfig;
pub use scanner::MirrorLagScanner;
pub use transport::HttpTransport;
