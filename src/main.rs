//! Mirror Lag Monitor CLI.
//!
//! Runs one monitoring cycle per invocation. An external scheduler invokes
//! it repeatedly; the exit code tells the scheduler how the cycle went:
//!
//! - `0`: no lag detected (or the queue was idle); `display-lag` always
//!   exits 0 unless it fails
//! - `1`: `process-queue` detected lag, the push message was left for redelivery
//! - `2`: the cycle failed
//!
//! # Example
//!
//! ```bash
//! PULSE_USERNAME=monitor PULSE_PASSWORD=... \
//! PULSE_QUEUE_NAME=autoland PULSE_QUEUE_ROUTING_KEY=integration/autoland \
//! SOURCE_REPOSITORY=https://hg.mozilla.org/integration/autoland \
//! REPOSITORY_CALLSIGN=MOZILLACENTRAL \
//!   mirror-lag-monitor process-queue
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mirror_lag_monitor::config::{
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_EXCHANGE, DEFAULT_METRIC_NAMESPACE, DEFAULT_MIRROR_URL,
};
use mirror_lag_monitor::{
    AmqpConnector, BrokerConfig, Changeset, ConsoleReporter, FacadeSink, HttpRepositoryClient, HttpTransport,
    MetricsReporter, MetricsSink, MirrorLagScanner, MirrorRepository, MonitorConfig, MonitorSettings, NoopSink,
    PushMessageProcessor, QueueConsumptionEngine, Reporter, ReplicationStatusChecker, RetryConfig, RunOutcome,
    SourceRepository, TracingErrorSink,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Measure how far a repository mirror lags behind its source.
#[derive(Parser, Debug)]
#[command(name = "mirror-lag-monitor", author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true, env = "DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display the replication lag for a repository or individual commits.
    ///
    /// Does not drain any queues or send any data. Lag is printed, never
    /// reflected in the exit code.
    DisplayLag {
        #[command(flatten)]
        repos: RepoArgs,

        #[command(flatten)]
        broker: BrokerArgs,

        /// Changesets to check. Without any, one queue message is inspected.
        node_ids: Vec<String>,
    },

    /// Process one message from the push notification queue and report the lag.
    ///
    /// The lag gauge is written through the `metrics` facade. Without an
    /// installed recorder the gauge is dropped.
    ProcessQueue {
        #[command(flatten)]
        repos: RepoArgs,

        #[command(flatten)]
        broker: BrokerArgs,

        /// Evaluate without acknowledging messages or sending metrics
        #[arg(long, env = "NO_SEND")]
        no_send: bool,

        /// Prefix for the lag gauge name
        #[arg(long, env = "METRIC_NAMESPACE", default_value = DEFAULT_METRIC_NAMESPACE)]
        metric_namespace: String,
    },
}

#[derive(Args, Debug)]
struct RepoArgs {
    /// Source repository URL
    #[arg(long, env = "SOURCE_REPOSITORY", default_value = "https://hg.mozilla.org/integration/autoland")]
    source_repository: String,

    /// Mirror base URL
    #[arg(long, env = "PHABRICATOR_URL", default_value = DEFAULT_MIRROR_URL)]
    mirror_url: String,

    /// Mirror repository callsign
    #[arg(long, env = "REPOSITORY_CALLSIGN", default_value = "MOZILLACENTRAL")]
    callsign: String,
}

#[derive(Args, Debug)]
struct BrokerArgs {
    #[arg(long, env = "PULSE_USERNAME", default_value = "")]
    pulse_username: String,

    #[arg(long, env = "PULSE_PASSWORD", default_value = "", hide_env_values = true)]
    pulse_password: String,

    #[arg(long, env = "PULSE_EXCHANGE", default_value = DEFAULT_EXCHANGE)]
    pulse_exchange: String,

    #[arg(long, env = "PULSE_QUEUE_NAME", default_value = "")]
    pulse_queue_name: String,

    #[arg(long, env = "PULSE_QUEUE_ROUTING_KEY", default_value = "")]
    pulse_routing_key: String,

    #[arg(long, env = "PULSE_HOST", default_value = DEFAULT_BROKER_HOST)]
    pulse_host: String,

    #[arg(long, env = "PULSE_PORT", default_value_t = DEFAULT_BROKER_PORT)]
    pulse_port: u16,

    /// Connect without TLS (local brokers)
    #[arg(long, env = "PULSE_NO_TLS")]
    pulse_no_tls: bool,

    /// Seconds to wait for a message before treating the queue as empty
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 1.0)]
    poll_timeout_secs: f64,
}

impl RepoArgs {
    fn resolve(&self) -> Result<(SourceRepository, MirrorRepository)> {
        let source = SourceRepository::new(&self.source_repository).context("Invalid source repository")?;
        let mirror = MirrorRepository::new(&self.mirror_url, self.callsign.as_str()).context("Invalid mirror")?;
        Ok((source, mirror))
    }
}

impl BrokerArgs {
    fn to_config(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.pulse_host.clone(),
            port: self.pulse_port,
            use_tls: !self.pulse_no_tls,
            username: self.pulse_username.clone(),
            password: self.pulse_password.clone(),
            exchange: self.pulse_exchange.clone(),
            queue_name: self.pulse_queue_name.clone(),
            routing_key: self.pulse_routing_key.clone(),
        }
    }

    fn poll_timeout(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.poll_timeout_secs)
            .with_context(|| format!("Invalid poll timeout {}", self.poll_timeout_secs))
    }
}

/// Assemble the run configuration from the command line.
fn monitor_config(
    repos: &RepoArgs,
    broker: &BrokerArgs,
    dry_run: bool,
    metric_namespace: Option<String>,
) -> Result<MonitorConfig> {
    let (source, mirror) = repos.resolve()?;
    let defaults = MonitorSettings::default();
    Ok(MonitorConfig {
        source,
        mirror,
        broker: broker.to_config(),
        settings: MonitorSettings {
            dry_run,
            poll_timeout: broker.poll_timeout()?,
            metric_namespace: metric_namespace.unwrap_or(defaults.metric_namespace),
        },
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "debug,mirror_lag_monitor=trace"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("Monitoring run failed: {:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns `false` when `process-queue` detected lag.
async fn run(command: Command) -> Result<bool> {
    let client = Arc::new(HttpRepositoryClient::new(
        HttpTransport::new(RetryConfig::transport()).context("Failed to build HTTP client")?,
    ));

    match command {
        Command::DisplayLag {
            repos,
            broker,
            node_ids,
        } => {
            let config = monitor_config(&repos, &broker, true, None)?;
            let checker = Arc::new(ReplicationStatusChecker::new(client, config.source.clone()));

            if !node_ids.is_empty() {
                for node_id in &node_ids {
                    let changeset = Changeset::new(node_id).with_context(|| format!("Invalid node id {}", node_id))?;
                    let status = checker
                        .check(&config.mirror, &changeset)
                        .await
                        .with_context(|| format!("Failed to check {}", changeset))?;
                    ConsoleReporter.report(&config.mirror, &status);
                }
                return Ok(true);
            }

            let processor = PushMessageProcessor::new(
                MirrorLagScanner::new(checker),
                config.mirror.clone(),
                Arc::new(ConsoleReporter),
                Arc::new(TracingErrorSink),
            );
            let outcome = QueueConsumptionEngine::new(AmqpConnector)
                .run_configured(&config, &processor, || {})
                .await?;
            if let RunOutcome::Processed(processed) = &outcome {
                info!(outcome = processed.label(), "Queue message displayed");
            }
            Ok(true)
        }

        Command::ProcessQueue {
            repos,
            broker,
            no_send,
            metric_namespace,
        } => {
            let config = monitor_config(&repos, &broker, no_send, Some(metric_namespace))?;
            let sink: Arc<dyn MetricsSink> = if config.settings.dry_run {
                Arc::new(NoopSink)
            } else {
                Arc::new(FacadeSink)
            };
            let reporter = Arc::new(MetricsReporter::new(sink, config.settings.metric_namespace.clone()));

            let checker = Arc::new(ReplicationStatusChecker::new(client, config.source.clone()));
            let processor = PushMessageProcessor::new(
                MirrorLagScanner::new(checker),
                config.mirror.clone(),
                reporter.clone(),
                Arc::new(TracingErrorSink),
            );

            let outcome = QueueConsumptionEngine::new(AmqpConnector)
                .run_configured(&config, &processor, || reporter.report_caught_up(&config.mirror))
                .await?;

            if let RunOutcome::Processed(processed) = &outcome {
                info!(outcome = processed.label(), "Queue message processed");
            }
            Ok(outcome.is_success())
        }
    }
}
