//! Connection manager for the XRP Ledger node set.
//!
//! Keeps one logical connection alive across a fixed, ordered list of public
//! nodes. Callers gate every ledger request through
//! [`ConnectionManager::ensure_connection`], which:
//!
//! 1. returns immediately (refreshing the idle timer) when connected,
//! 2. joins the attempt already in flight when one is running,
//! 3. otherwise starts a bounded attempt loop with node rotation and
//!    exponential backoff.
//!
//! A quiet connection is dropped after the idle window so no stale socket is
//! held open.

mod backoff;
mod transport;

use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, LedgerError};
use crate::nodes::NodeRing;

pub use backoff::Backoff;
pub use transport::{Connector, Transport, WsConnector, WsTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type ConnectAttempt = Shared<BoxFuture<'static, Result<(), ConnectionError>>>;

struct Live {
    id: u64,
    node: String,
    transport: Arc<dyn Transport>,
}

struct ManagerState {
    ring: NodeRing,
    live: Option<Live>,
    attempt: Option<ConnectAttempt>,
    idle_timer: Option<JoinHandle<()>>,
    /// Bumped on every activity; a firing idle timer only acts if it still matches.
    activity: u64,
    /// Bumped by `disconnect` so an attempt finishing afterwards discards its socket.
    epoch: u64,
    next_live_id: u64,
}

struct Inner {
    connector: Arc<dyn Connector>,
    config: ConnectionConfig,
    max_attempts: u32,
    state: Mutex<ManagerState>,
}

/// Cheaply cloneable handle; clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(ring: NodeRing, config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        let max_attempts = config.max_attempts_for(ring.len());
        Self {
            inner: Arc::new(Inner {
                connector,
                config,
                max_attempts,
                state: Mutex::new(ManagerState {
                    ring,
                    live: None,
                    attempt: None,
                    idle_timer: None,
                    activity: 0,
                    epoch: 0,
                    next_live_id: 1,
                }),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        let state = self.inner.state.lock();
        match &state.live {
            Some(live) if live.transport.is_open() => ConnectionState::Connected,
            _ if state.attempt.is_some() => ConnectionState::Connecting,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn current_node(&self) -> String {
        self.inner.state.lock().ring.current().to_string()
    }

    pub fn max_attempts(&self) -> u32 {
        self.inner.max_attempts
    }

    pub async fn ensure_connection(&self) -> Result<(), ConnectionError> {
        let (attempt, dead) = {
            let mut state = self.inner.state.lock();

            let mut dead = None;
            if let Some(live) = &state.live {
                if live.transport.is_open() {
                    self.arm_idle_timer(&mut state);
                    return Ok(());
                }
                debug!(node = %live.node, "Dropping dead connection");
                dead = state.live.take();
            }

            let attempt = match &state.attempt {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = self.clone().connect_with_retries(state.epoch).boxed().shared();
                    state.attempt = Some(attempt.clone());
                    attempt
                }
            };
            (attempt, dead)
        };

        if let Some(dead) = dead {
            dead.transport.close().await;
        }
        attempt.await
    }

    /// Tear down the live connection and cancel timers. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let live = {
            let mut state = self.inner.state.lock();
            state.epoch += 1;
            state.attempt = None;
            if let Some(timer) = state.idle_timer.take() {
                timer.abort();
            }
            state.live.take()
        };

        if let Some(live) = live {
            live.transport.close().await;
            info!(node = %live.node, "Disconnected from XRPL node");
        }
    }

    /// Send a command, reconnecting and retrying on transient failures.
    ///
    /// Ledger-side errors are returned as [`LedgerError::Request`] without retry.
    pub async fn request(&self, request: Value) -> Result<Value, LedgerError> {
        let command = request
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let retries = self.inner.config.request_retries;
        let mut backoff = Backoff::new(&self.inner.config);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.ensure_connection().await?;

            let Some((live_id, node, transport)) = self.live_transport() else {
                // Lost the socket between connecting and sending.
                if attempt <= retries {
                    continue;
                }
                return Err(ConnectionError::Closed("connection lost before request".into()).into());
            };

            debug!(command = %command, node = %node, attempt, "Sending ledger request");
            let outcome = match timeout(
                self.inner.config.request_timeout(),
                transport.request(request.clone()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ConnectionError::Timeout { node: node.clone() }),
            };

            match outcome {
                Ok(response) => {
                    self.touch();
                    return parse_response(response);
                }
                Err(err) if err.is_transient() && attempt <= retries => {
                    warn!(
                        command = %command,
                        node = %node,
                        attempt,
                        error = %err,
                        "Ledger request failed, reconnecting"
                    );
                    self.drop_live(live_id).await;
                    sleep(backoff.next_delay()).await;
                }
                Err(err) => {
                    error!(command = %command, error = %err, "Ledger request failed");
                    return Err(err.into());
                }
            }
        }
    }

    async fn connect_with_retries(self, epoch: u64) -> Result<(), ConnectionError> {
        let result = self.run_attempts(epoch).await;

        let mut state = self.inner.state.lock();
        if state.epoch == epoch {
            state.attempt = None;
        }
        if result.is_ok() {
            self.arm_idle_timer(&mut state);
        }
        result
    }

    async fn run_attempts(&self, epoch: u64) -> Result<(), ConnectionError> {
        let max_attempts = self.inner.max_attempts;
        let mut backoff = Backoff::new(&self.inner.config);
        let mut last = ConnectionError::Closed("no connection attempt made".into());

        for attempt in 1..=max_attempts {
            let node = self.current_node();
            info!(node = %node, attempt, max_attempts, "Connecting to XRPL node");

            let outcome = match timeout(
                self.inner.config.connect_timeout(),
                self.inner.connector.connect(&node),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ConnectionError::Timeout { node: node.clone() }),
            };

            match outcome {
                Ok(transport) => {
                    let stale = {
                        let mut state = self.inner.state.lock();
                        if state.epoch != epoch {
                            Some(transport)
                        } else {
                            let id = state.next_live_id;
                            state.next_live_id += 1;
                            state.live = Some(Live {
                                id,
                                node: node.clone(),
                                transport,
                            });
                            None
                        }
                    };
                    if let Some(transport) = stale {
                        transport.close().await;
                        return Err(ConnectionError::Closed(
                            "disconnect requested while connecting".into(),
                        ));
                    }
                    info!(node = %node, attempt, "Connected to XRPL node");
                    return Ok(());
                }
                Err(err) => {
                    warn!(node = %node, attempt, error = %err, "Connection attempt failed");
                    if err.rotates_node() {
                        let next = self.inner.state.lock().ring.rotate().to_string();
                        debug!(from = %node, to = %next, "Rotating to next node");
                    }
                    last = err;
                    if attempt < max_attempts {
                        sleep(backoff.next_delay()).await;
                    }
                }
            }
        }

        error!(attempts = max_attempts, error = %last, "Giving up on XRPL connection");
        Err(ConnectionError::Exhausted {
            attempts: max_attempts,
            last: Box::new(last),
        })
    }

    fn live_transport(&self) -> Option<(u64, String, Arc<dyn Transport>)> {
        let state = self.inner.state.lock();
        state
            .live
            .as_ref()
            .map(|live| (live.id, live.node.clone(), live.transport.clone()))
    }

    async fn drop_live(&self, live_id: u64) {
        let live = {
            let mut state = self.inner.state.lock();
            match &state.live {
                Some(live) if live.id == live_id => state.live.take(),
                _ => None,
            }
        };
        if let Some(live) = live {
            live.transport.close().await;
        }
    }

    fn touch(&self) {
        let mut state = self.inner.state.lock();
        if state.live.is_some() {
            self.arm_idle_timer(&mut state);
        }
    }

    fn arm_idle_timer(&self, state: &mut ManagerState) {
        state.activity += 1;
        let activity = state.activity;
        if let Some(timer) = state.idle_timer.take() {
            timer.abort();
        }

        let idle = self.inner.config.idle_timeout();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        state.idle_timer = Some(tokio::spawn(async move {
            sleep(idle).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let live = {
                let mut state = inner.state.lock();
                if state.activity != activity {
                    return;
                }
                // Detach rather than abort: this task is the timer being cleared.
                state.idle_timer.take();
                state.live.take()
            };
            if let Some(live) = live {
                live.transport.close().await;
                info!(
                    node = %live.node,
                    idle_secs = idle.as_secs(),
                    "Idle timeout reached, disconnected"
                );
            }
        }));
    }
}

/// Split a rippled response into its `result` or a ledger error.
fn parse_response(response: Value) -> Result<Value, LedgerError> {
    if response.get("status").and_then(Value::as_str) == Some("error") {
        let code = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let message = response
            .get("error_message")
            .or_else(|| response.get("error_exception"))
            .and_then(Value::as_str)
            .unwrap_or(&code)
            .to_string();
        return Err(LedgerError::Request { code, message });
    }

    match response {
        Value::Object(mut obj) => obj
            .remove("result")
            .ok_or_else(|| LedgerError::decode("response has no result")),
        other => Err(LedgerError::decode(format!("response is not an object: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_result_from_success() {
        let result = parse_response(json!({
            "id": 1,
            "status": "success",
            "type": "response",
            "result": {"ledger_index": 42}
        }))
        .unwrap();
        assert_eq!(result["ledger_index"], 42);
    }

    #[test]
    fn maps_error_status_to_request_error() {
        let err = parse_response(json!({
            "id": 2,
            "status": "error",
            "error": "actNotFound",
            "error_message": "Account not found."
        }))
        .unwrap_err();
        match err {
            LedgerError::Request { code, message } => {
                assert_eq!(code, "actNotFound");
                assert_eq!(message, "Account not found.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_result_is_decode_error() {
        assert!(matches!(
            parse_response(json!({"status": "success"})),
            Err(LedgerError::Decode(_))
        ));
    }
}
