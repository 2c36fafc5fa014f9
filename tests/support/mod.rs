#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use xrpl_wallet::config::ConnectionConfig;
use xrpl_wallet::connection::{Connector, Transport};
use xrpl_wallet::nodes::NodeRing;
use xrpl_wallet::{ConnectionError, ConnectionManager};

pub const GENESIS_SEED: &str = "snoPBrXtMeMyMHUVTgbuqAfg1SUTb";
pub const GENESIS_ADDRESS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
pub const RLUSD_ISSUER: &str = "rMxCKbEDwqr76QuheSUMdEGf4B9xJ8m5De";

pub type Outcome = Arc<dyn Fn(u32, &str) -> Result<(), ConnectionError> + Send + Sync>;
pub type Handler = Arc<dyn Fn(&Value) -> Result<Value, ConnectionError> + Send + Sync>;

pub fn node_urls(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("wss://node{}.test", i)).collect()
}

pub fn ring(count: usize) -> NodeRing {
    NodeRing::new(node_urls(count)).unwrap()
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig {
        idle_timeout_secs: 5,
        ..ConnectionConfig::default()
    }
}

pub fn manager(nodes: usize, connector: &Arc<MockConnector>) -> ConnectionManager {
    ConnectionManager::new(ring(nodes), config(), connector.clone())
}

/// A rippled success envelope around `result`.
pub fn success(result: Value) -> Value {
    json!({"id": 1, "type": "response", "status": "success", "result": result})
}

/// A rippled error envelope.
pub fn ledger_error(code: &str, message: &str) -> Value {
    json!({
        "id": 1,
        "type": "response",
        "status": "error",
        "error": code,
        "error_message": message
    })
}

/// Connector that records every attempt and hands out in-memory transports.
pub struct MockConnector {
    calls: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    visited: Mutex<Vec<String>>,
    transports: Mutex<Vec<Arc<MockTransport>>>,
    sent: Arc<Mutex<Vec<Value>>>,
    delay: Duration,
    outcome: Outcome,
    handler: Handler,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            visited: Mutex::new(Vec::new()),
            transports: Mutex::new(Vec::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            outcome: Arc::new(|_, _| Ok(())),
            handler: Arc::new(|_| Ok(success(json!({})))),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Decide each connect by its 1-based call number and node.
    pub fn with_outcome(
        mut self,
        outcome: impl Fn(u32, &str) -> Result<(), ConnectionError> + Send + Sync + 'static,
    ) -> Self {
        self.outcome = Arc::new(outcome);
        self
    }

    /// Answer requests on every transport this connector opens.
    pub fn with_handler(
        mut self,
        handler: impl Fn(&Value) -> Result<Value, ConnectionError> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }

    /// Requests sent over any transport, in order.
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    pub fn closed(&self) -> u32 {
        self.transports.lock().iter().map(|t| t.closed()).sum()
    }

    /// Simulate the remote end dropping every open socket.
    pub fn kill_all(&self) {
        for transport in self.transports.lock().iter() {
            transport.open.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, node: &str) -> Result<Arc<dyn Transport>, ConnectionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.visited.lock().push(node.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.outcome)(call, node)?;

        let transport = Arc::new(MockTransport {
            open: AtomicBool::new(true),
            closed: AtomicU32::new(0),
            sent: self.sent.clone(),
            handler: self.handler.clone(),
        });
        self.transports.lock().push(transport.clone());
        Ok(transport)
    }
}

pub struct MockTransport {
    open: AtomicBool,
    closed: AtomicU32,
    sent: Arc<Mutex<Vec<Value>>>,
    handler: Handler,
}

impl MockTransport {
    pub fn closed(&self) -> u32 {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, request: Value) -> Result<Value, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed("mock socket closed".into()));
        }
        self.sent.lock().push(request.clone());
        let response = (self.handler)(&request);
        if let Err(ConnectionError::Closed(_) | ConnectionError::Io(_)) = &response {
            self.open.store(false, Ordering::SeqCst);
        }
        response
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
