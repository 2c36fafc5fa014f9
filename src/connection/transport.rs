use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::ConnectionError;

/// Opens transports to ledger nodes.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, node: &str) -> Result<Arc<dyn Transport>, ConnectionError>;
}

/// A live request/response channel to one node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one command and wait for the response carrying the same id.
    async fn request(&self, request: Value) -> Result<Value, ConnectionError>;

    async fn close(&self);

    fn is_open(&self) -> bool;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// WebSocket connector speaking the rippled JSON command protocol.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, node: &str) -> Result<Arc<dyn Transport>, ConnectionError> {
        let (ws_stream, _) = connect_async(node)
            .await
            .map_err(|e| classify_ws_error(node, e))?;
        info!(node = %node, "WebSocket connected");
        Ok(Arc::new(WsTransport::start(node, ws_stream)))
    }
}

pub struct WsTransport {
    node: String,
    sink: AsyncMutex<WsSink>,
    pending: Pending,
    open: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    fn start(node: &str, ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        let (sink, mut stream) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));

        let reader = {
            let pending = pending.clone();
            let open = open.clone();
            let node = node.to_string();
            tokio::spawn(async move {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(text)) => route_response(&pending, &text),
                        Ok(Message::Close(frame)) => {
                            debug!(node = %node, ?frame, "Node closed the socket");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(node = %node, error = %e, "WebSocket read failed");
                            break;
                        }
                    }
                }
                open.store(false, Ordering::SeqCst);
                // Dropping the senders wakes every waiter with a closed error.
                pending.lock().clear();
            })
        };

        Self {
            node: node.to_string(),
            sink: AsyncMutex::new(sink),
            pending,
            open,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
        }
    }
}

fn route_response(pending: &Pending, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Discarding non-JSON frame");
            return;
        }
    };
    // Stream messages (ledgerClosed, transaction) carry no id.
    let Some(id) = value.get("id").and_then(Value::as_u64) else {
        return;
    };
    if let Some(sender) = pending.lock().remove(&id) {
        let _ = sender.send(value);
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn request(&self, mut request: Value) -> Result<Value, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::Closed(format!("{} is not connected", self.node)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Some(obj) = request.as_object_mut() {
            obj.insert("id".into(), Value::from(id));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let sent = self
            .sink
            .lock()
            .await
            .send(Message::Text(request.to_string()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().remove(&id);
            self.open.store(false, Ordering::SeqCst);
            return Err(classify_ws_error(&self.node, e));
        }

        rx.await
            .map_err(|_| ConnectionError::Closed(format!("{} dropped the connection", self.node)))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        if let Err(e) = self.sink.lock().await.close().await {
            debug!(node = %self.node, error = %e, "Error while closing socket");
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.pending.lock().clear();
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

fn classify_ws_error(node: &str, err: tungstenite::Error) -> ConnectionError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                ConnectionError::PermissionDenied {
                    node: node.to_string(),
                    reason: status.to_string(),
                }
            } else {
                ConnectionError::Protocol {
                    node: node.to_string(),
                    reason: format!("HTTP {}", status),
                }
            }
        }
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ConnectionError::Closed(node.to_string())
        }
        tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            ConnectionError::PermissionDenied {
                node: node.to_string(),
                reason: e.to_string(),
            }
        }
        tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            ConnectionError::Timeout {
                node: node.to_string(),
            }
        }
        tungstenite::Error::Io(e) => ConnectionError::Io(format!("{}: {}", node, e)),
        other => ConnectionError::Protocol {
            node: node.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_responses_by_id() {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = oneshot::channel();
        pending.lock().insert(7, tx);

        route_response(&pending, r#"{"type":"ledgerClosed","ledger_index":1}"#);
        route_response(&pending, "not json");
        assert!(rx.try_recv().is_err());

        route_response(&pending, &json!({"id": 7, "status": "success"}).to_string());
        assert_eq!(rx.try_recv().unwrap()["status"], "success");
        assert!(pending.lock().is_empty());
    }

    #[test]
    fn closed_socket_errors_rotate_nodes() {
        let err = classify_ws_error("wss://a", tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, ConnectionError::Closed(_)));
        assert!(err.rotates_node());
    }
}
