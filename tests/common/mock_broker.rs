//! Mock broker for engine tests.
//!
//! [`MockConnector`] hands out [`MockSession`]s that share one
//! [`BrokerLog`], so a test can assert on the protocol steps and on
//! whether the connection was closed after `run` returns.

use mirror_lag_monitor::repository::BoxFuture;
use mirror_lag_monitor::{Acknowledger, BrokerConfig, BrokerConnector, BrokerSession, Delivery, MonitorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counts acknowledgments; optionally fails them.
#[derive(Clone, Default)]
pub struct RecordingAcker {
    acks: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingAcker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            acks: Arc::new(AtomicUsize::new(0)),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.acks.load(Ordering::SeqCst)
    }
}

impl Acknowledger for RecordingAcker {
    fn ack(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.fail {
                return Err(MonitorError::broker_msg("basic.ack", "channel closed"));
            }
            self.acks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Protocol steps observed by the mock broker.
#[derive(Debug, Default)]
pub struct BrokerLog {
    pub calls: Vec<String>,
    pub connects: usize,
    pub closes: usize,
}

/// Which step should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerFailure {
    Connect,
    MissingExchange,
    Bind,
}

/// Connector yielding at most one delivery per session.
pub struct MockConnector {
    log: Arc<Mutex<BrokerLog>>,
    body: Option<Vec<u8>>,
    acker: RecordingAcker,
    failure: Option<BrokerFailure>,
}

impl MockConnector {
    /// A broker whose queue is empty.
    pub fn idle() -> Self {
        Self {
            log: Arc::default(),
            body: None,
            acker: RecordingAcker::new(),
            failure: None,
        }
    }

    /// A broker with one message waiting.
    pub fn with_message(body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..Self::idle()
        }
    }

    pub fn failing_at(mut self, failure: BrokerFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn acker(&self) -> RecordingAcker {
        self.acker.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.log.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl BrokerConnector for MockConnector {
    fn connect(&self, _config: &BrokerConfig) -> BoxFuture<'_, Box<dyn BrokerSession>> {
        self.log.lock().unwrap().connects += 1;
        let result: Result<Box<dyn BrokerSession>, MonitorError> =
            if self.failure == Some(BrokerFailure::Connect) {
                Err(MonitorError::broker_msg("connect", "connection refused"))
            } else {
                Ok(Box::new(MockSession {
                    log: self.log.clone(),
                    body: self.body.clone(),
                    acker: self.acker.clone(),
                    failure: self.failure,
                }))
            };
        Box::pin(async move { result })
    }
}

pub struct MockSession {
    log: Arc<Mutex<BrokerLog>>,
    body: Option<Vec<u8>>,
    acker: RecordingAcker,
    failure: Option<BrokerFailure>,
}

impl MockSession {
    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl BrokerSession for MockSession {
    fn check_exchange(&mut self, exchange: &str) -> BoxFuture<'_, ()> {
        self.record(format!("check_exchange {}", exchange));
        let result = if self.failure == Some(BrokerFailure::MissingExchange) {
            Err(MonitorError::broker_msg("exchange.declare(passive)", "NOT_FOUND"))
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn bind_queue(&mut self, queue: &str, exchange: &str, routing_key: &str) -> BoxFuture<'_, ()> {
        self.record(format!("bind_queue {} {} {}", queue, exchange, routing_key));
        let result = if self.failure == Some(BrokerFailure::Bind) {
            Err(MonitorError::broker_msg("queue.bind", "ACCESS_REFUSED"))
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn start_consumer(&mut self, queue: &str) -> BoxFuture<'_, ()> {
        self.record(format!("start_consumer {}", queue));
        Box::pin(async { Ok(()) })
    }

    fn next_delivery(&mut self, _timeout: Duration) -> BoxFuture<'_, Option<Delivery>> {
        self.record("next_delivery".to_string());
        let delivery = self.body.take().map(|body| Delivery {
            delivery_tag: 1,
            redelivered: false,
            body,
            acker: Box::new(self.acker.clone()),
        });
        Box::pin(async move { Ok(delivery) })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.log.lock().unwrap().closes += 1;
        Box::pin(async { Ok(()) })
    }
}
