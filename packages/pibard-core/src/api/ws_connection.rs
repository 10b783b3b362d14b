//! Dashboard socket tracking.
//!
//! - `WsConnectionManager`: counts live dashboard sockets and can close them all
//! - `ConnectionGuard`: unregisters its socket when dropped

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Tracks live dashboard sockets.
///
/// Every socket holds a child of one shared cancellation token; cancelling the
/// parent closes all of them at once (used on shutdown).
pub struct WsConnectionManager {
    /// connection id -> time the socket was opened
    connections: DashMap<u64, Instant>,
    next_id: AtomicU64,
    /// Replaced after `close_all` so later sockets are not born cancelled.
    parent: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            parent: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a socket; the returned guard unregisters it on drop.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = self.parent.read().child_token();
        self.connections.insert(id, Instant::now());
        log::info!(
            "[WS] Dashboard ws-{} connected ({} open)",
            id,
            self.connections.len()
        );

        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: u64) {
        if let Some((_, opened)) = self.connections.remove(&id) {
            log::info!(
                "[WS] Dashboard ws-{} disconnected after {:?} ({} open)",
                id,
                opened.elapsed(),
                self.connections.len()
            );
        }
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Signals every open socket to close. Returns how many were open.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        let mut parent = self.parent.write();
        parent.cancel();
        *parent = CancellationToken::new();
        if count > 0 {
            log::info!("[WS] Closing {} dashboard connection(s)", count);
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration of one dashboard socket.
pub struct ConnectionGuard {
    id: u64,
    manager: Arc<WsConnectionManager>,
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> String {
        format!("ws-{}", self.id)
    }

    /// Cancelled when the manager closes all connections.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
    }
}
