//! Mock implementations of the transport and broker ports
//!
//! Behaviour can be switched at runtime so a single test can drive an
//! endpoint from healthy to failing and back.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gateway_core::{BrokerError, TransportError};
use gateway_domain::{
    Broker, CapabilityEndpoint, Connection, ConnectionFactory, OutboundMessage, PublishReceipt,
    RpcRequest, RpcResponse,
};

/// How mock connections answer calls
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Answer with the given status and JSON body after `delay`
    Respond {
        status: u16,
        body: serde_json::Value,
        delay: Duration,
    },
    /// Fail every connect attempt
    RefuseConnect,
    /// Connect succeeds, every call is reset
    ResetCall,
    /// Calls never complete
    Hang,
}

impl MockBehavior {
    pub fn ok(body: serde_json::Value) -> Self {
        MockBehavior::Respond {
            status: 200,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16, body: serde_json::Value) -> Self {
        MockBehavior::Respond {
            status,
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        MockBehavior::Respond {
            status: 200,
            body: serde_json::json!({"ok": true}),
            delay,
        }
    }
}

#[derive(Debug, Default)]
struct CallStats {
    connects: AtomicUsize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Mock connection factory counting connects and call attempts
#[derive(Debug, Clone)]
pub struct MockConnectionFactory {
    behavior: Arc<Mutex<MockBehavior>>,
    stats: Arc<CallStats>,
    requests: Arc<Mutex<Vec<RpcRequest>>>,
}

impl MockConnectionFactory {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            stats: Arc::new(CallStats::default()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Number of connect attempts, successful or not
    pub fn connects(&self) -> usize {
        self.stats.connects.load(Ordering::SeqCst)
    }

    /// Number of calls issued on connections
    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    /// Transport attempts: calls plus refused connects
    pub fn attempts(&self) -> usize {
        match *self.behavior.lock().unwrap() {
            MockBehavior::RefuseConnect => self.connects(),
            _ => self.calls(),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RpcRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockConnectionFactory {
    fn default() -> Self {
        Self::new(MockBehavior::ok(serde_json::json!({"ok": true})))
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn connect(
        &self,
        endpoint: &CapabilityEndpoint,
    ) -> Result<Box<dyn Connection>, TransportError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        if let MockBehavior::RefuseConnect = behavior {
            return Err(TransportError::Connect(format!(
                "connection refused: {}",
                endpoint.address
            )));
        }
        Ok(Box::new(MockConnection {
            factory: self.clone(),
        }))
    }
}

struct InFlight<'a>(&'a CallStats);

impl<'a> InFlight<'a> {
    fn enter(stats: &'a CallStats) -> Self {
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(stats)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

struct MockConnection {
    factory: MockConnectionFactory,
}

#[async_trait]
impl Connection for MockConnection {
    async fn call(&mut self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let stats = self.factory.stats.clone();
        stats.calls.fetch_add(1, Ordering::SeqCst);
        self.factory.requests.lock().unwrap().push(request.clone());
        let _guard = InFlight::enter(&stats);

        let behavior = self.factory.behavior.lock().unwrap().clone();
        match behavior {
            MockBehavior::Respond {
                status,
                body,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(RpcResponse::json(status, &body))
            }
            MockBehavior::RefuseConnect | MockBehavior::ResetCall => Err(
                TransportError::ConnectionReset("connection reset by peer".to_string()),
            ),
            MockBehavior::Hang => futures::future::pending().await,
        }
    }
}

/// How the mock broker answers submissions
#[derive(Debug, Clone)]
pub enum BrokerBehavior {
    Ack,
    Nack,
    Unavailable,
    SlowSubmit(Duration),
    SlowConfirm(Duration),
}

/// Scriptable broker recording every submitted message
#[derive(Debug, Clone)]
pub struct MockBroker {
    behavior: Arc<Mutex<BrokerBehavior>>,
    connected: Arc<AtomicBool>,
    published: Arc<Mutex<Vec<OutboundMessage>>>,
}

impl MockBroker {
    pub fn new(behavior: BrokerBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            connected: Arc::new(AtomicBool::new(true)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behavior(&self, behavior: BrokerBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<OutboundMessage> {
        self.published.lock().unwrap().clone()
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new(BrokerBehavior::Ack)
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn kind(&self) -> &'static str {
        "mock"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn submit(&self, message: OutboundMessage) -> Result<PublishReceipt, BrokerError> {
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            BrokerBehavior::Unavailable => {
                Err(BrokerError::Unavailable("channel closed".to_string()))
            }
            BrokerBehavior::SlowSubmit(delay) => {
                tokio::time::sleep(delay).await;
                self.published.lock().unwrap().push(message);
                Ok(PublishReceipt::confirmed())
            }
            BrokerBehavior::Ack => {
                self.published.lock().unwrap().push(message);
                Ok(PublishReceipt::confirmed())
            }
            BrokerBehavior::Nack => {
                self.published.lock().unwrap().push(message);
                Ok(PublishReceipt::new(async {
                    Err(BrokerError::Rejected("broker returned nack".to_string()))
                }))
            }
            BrokerBehavior::SlowConfirm(delay) => {
                self.published.lock().unwrap().push(message);
                Ok(PublishReceipt::new(async move {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }))
            }
        }
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
