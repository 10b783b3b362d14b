//! Persistent JSON-RPC control connection over raw TCP.
//!
//! Snapcast's control port speaks newline-delimited JSON. Responses carry the
//! request id; notifications carry a `method` and no id. A single reader task
//! demultiplexes both: responses complete the waiting caller through a
//! oneshot channel, notifications go out on a broadcast channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use super::rpc::{RequestIds, RpcMessage, RpcRequest};
use super::{AdapterError, AdapterResult, RpcTransport, ServerUpdate};
use crate::protocol_constants::EVENT_CHANNEL_CAPACITY;

type PendingMap = DashMap<u64, oneshot::Sender<AdapterResult<Value>>>;

/// One open control connection and the requests waiting on it.
struct Connection {
    writer: OwnedWriteHalf,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Connects and starts a reader task feeding `updates`.
    async fn open(
        addr: &str,
        updates: &broadcast::Sender<ServerUpdate>,
        cancel: &CancellationToken,
    ) -> AdapterResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&pending),
            Arc::clone(&closed),
            updates.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            writer,
            pending,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// TCP transport with request/response correlation and push notifications.
///
/// A dropped connection is reopened by the next call. Update subscribers
/// survive the reconnect.
pub struct TcpRpcTransport {
    addr: String,
    conn: Mutex<Connection>,
    ids: RequestIds,
    updates: broadcast::Sender<ServerUpdate>,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl TcpRpcTransport {
    /// Connects to `addr` (`host:port`) and starts the reader task.
    pub async fn connect(addr: &str, timeout: Option<Duration>) -> AdapterResult<Self> {
        let (updates, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let conn = Connection::open(addr, &updates, &cancel).await?;

        Ok(Self {
            addr: addr.to_string(),
            conn: Mutex::new(conn),
            ids: RequestIds::new(),
            updates,
            timeout,
            cancel,
        })
    }

    /// Whether the current connection has gone away.
    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_closed()
    }

    /// Registers `id` and writes `line` on a live connection, reopening it
    /// first if the server dropped it.
    async fn send(
        &self,
        id: u64,
        line: &str,
    ) -> AdapterResult<(Arc<PendingMap>, oneshot::Receiver<AdapterResult<Value>>)> {
        let mut conn = self.conn.lock().await;
        if conn.is_closed() {
            log::info!("[RPC] Reopening control connection to {}", self.addr);
            *conn = Connection::open(&self.addr, &self.updates, &self.cancel).await?;
        }

        let (tx, rx) = oneshot::channel();
        conn.pending.insert(id, tx);

        // The reader may have drained `pending` between the check and the insert.
        if conn.is_closed() && conn.pending.remove(&id).is_some() {
            return Err(AdapterError::Closed);
        }

        if let Err(e) = conn.writer.write_all(line.as_bytes()).await {
            conn.pending.remove(&id);
            return Err(e.into());
        }
        Ok((Arc::clone(&conn.pending), rx))
    }

    async fn await_response(
        &self,
        id: u64,
        pending: &PendingMap,
        rx: oneshot::Receiver<AdapterResult<Value>>,
    ) -> AdapterResult<Value> {
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    log::warn!("[RPC] Request {} timed out after {:?}", id, limit);
                    pending.remove(&id);
                    return Err(AdapterError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        outcome.unwrap_or(Err(AdapterError::Closed))
    }
}

impl Drop for TcpRpcTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl RpcTransport for TcpRpcTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn call(&self, method: &str, params: Value) -> AdapterResult<Value> {
        let id = self.ids.next();
        let mut line = serde_json::to_string(&RpcRequest::new(id, method, &params))
            .map_err(|e| AdapterError::Parse(e.to_string()))?;
        line.push('\n');

        log::debug!("[RPC] {} (id {}) over TCP", method, id);
        let (pending, rx) = self.send(id, &line).await?;
        self.await_response(id, &pending, rx).await
    }

    fn subscribe_updates(&self) -> Option<broadcast::Receiver<ServerUpdate>> {
        Some(self.updates.subscribe())
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    pending: Arc<PendingMap>,
    closed: Arc<AtomicBool>,
    updates: broadcast::Sender<ServerUpdate>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => next,
        };
        match next {
            Ok(Some(line)) => handle_line(&line, &pending, &updates),
            Ok(None) => {
                log::warn!("[RPC] Control connection closed by server");
                break;
            }
            Err(e) => {
                log::warn!("[RPC] Control connection read failed: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(AdapterError::Closed));
        }
    }
}

fn handle_line(line: &str, pending: &PendingMap, updates: &broadcast::Sender<ServerUpdate>) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let message: RpcMessage = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("[RPC] Ignoring unparseable control message: {}", e);
            return;
        }
    };

    match (message.id, message.method.clone()) {
        (Some(id), _) => match pending.remove(&id) {
            Some((_, tx)) => {
                let _ = tx.send(message.into_result());
            }
            None => log::debug!("[RPC] Response for unknown request id {}", id),
        },
        (None, Some(method)) => {
            log::debug!("[RPC] Notification: {}", method);
            let update = ServerUpdate {
                method,
                params: message.params.unwrap_or(Value::Null),
            };
            if updates.send(update).is_err() {
                log::trace!("[RPC] No update subscribers");
            }
        }
        (None, None) => log::debug!("[RPC] Ignoring message without id or method"),
    }
}
