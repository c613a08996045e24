//! Per-client connection state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::protocol::SUBSCRIBE_ALL;

/// A connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Event kinds this client wants, possibly containing `"*"`. Empty
    /// until the first `subscribe` message.
    subscriptions: Mutex<HashSet<String>>,
    /// Agent identity, set by `agent:register`.
    agent_name: Mutex<Option<String>>,
    /// Channel to the socket's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When the connection was established.
    pub connected_at: Instant,
    /// Whether the client answered the last ping.
    pub is_alive: AtomicBool,
    /// When the last pong arrived.
    last_pong: Mutex<Instant>,
    /// Messages dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a connection feeding the given write channel.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            subscriptions: Mutex::new(HashSet::new()),
            agent_name: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Replace the subscription set.
    pub fn subscribe_to(&self, kinds: impl IntoIterator<Item = String>) {
        *self.subscriptions.lock() = kinds.into_iter().collect();
    }

    /// Whether this client should receive events of `kind`.
    pub fn wants(&self, kind: &str) -> bool {
        let subs = self.subscriptions.lock();
        subs.contains(kind) || subs.contains(SUBSCRIBE_ALL)
    }

    /// Bind an agent identity to this connection.
    pub fn register_agent(&self, name: String) {
        *self.agent_name.lock() = Some(name);
    }

    /// The bound agent identity, if any.
    pub fn agent_name(&self) -> Option<String> {
        self.agent_name.lock().clone()
    }

    /// Enqueue a frame for the write task.
    ///
    /// Returns `false` if the channel is full or closed; the drop is
    /// counted against this connection.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.tx.try_send(message).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Mark the connection alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag. Returns `true` if the client was
    /// alive since the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }
}
