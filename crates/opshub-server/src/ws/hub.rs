//! Connection registry and event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Tracks connected clients and fans events out to them.
///
/// The connection table is owned solely by the hub; everyone else holds
/// `Arc<ClientConnection>` handles.
pub struct Hub {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Evict a client once this many frames have been dropped on it.
    max_drops: u64,
}

impl Hub {
    /// Create a hub with the given slow-client eviction threshold.
    pub fn new(max_drops: u64) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_drops,
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
        gauge!("ws_connections_active").set(conns.len() as f64);
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
        gauge!("ws_connections_active").set(conns.len() as f64);
    }

    /// Deliver a pre-serialized frame to every connection subscribed to
    /// `kind`. A failed send counts against the connection; clients past
    /// the drop threshold are evicted.
    pub async fn broadcast(&self, kind: &str, frame: &Arc<String>) {
        let mut evict = Vec::new();
        {
            let conns = self.connections.read().await;
            let mut delivered = 0usize;
            for conn in conns.values() {
                if !conn.wants(kind) {
                    continue;
                }
                if conn.send(frame.clone()) {
                    delivered += 1;
                } else {
                    counter!("ws_broadcast_drops_total").increment(1);
                    if conn.drop_count() >= self.max_drops {
                        evict.push(conn.id.clone());
                    }
                }
            }
            debug!(kind, delivered, "broadcast frame");
        }
        for id in evict {
            warn!(conn_id = %id, "evicting slow client");
            self.remove(&id).await;
        }
    }

    /// Deliver a frame only to the connection registered under `agent`.
    /// Returns `false` when that agent has no live connection; that is
    /// not an error.
    pub async fn send_to_agent(&self, agent: &str, frame: &Arc<String>) -> bool {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            if conn.agent_name().as_deref() == Some(agent) {
                return conn.send(frame.clone());
            }
        }
        false
    }

    /// Whether `agent` has a live connection already subscribed to
    /// `kind`, in which case a broadcast reaches it and a targeted
    /// follow-up would duplicate the frame.
    pub async fn agent_wants(&self, agent: &str, kind: &str) -> bool {
        let conns = self.connections.read().await;
        conns
            .values()
            .any(|c| c.agent_name().as_deref() == Some(agent) && c.wants(kind))
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connection(id: &str, subs: &[&str]) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        let conn = ClientConnection::new(id.into(), tx);
        conn.subscribe_to(subs.iter().map(|s| (*s).to_owned()));
        (Arc::new(conn), rx)
    }

    fn frame(s: &str) -> Arc<String> {
        Arc::new(s.to_owned())
    }

    #[tokio::test]
    async fn broadcast_respects_subscriptions() {
        let hub = Hub::new(100);
        let (tasks_only, mut tasks_rx) = connection("c1", &["task:updated"]);
        let (everything, mut all_rx) = connection("c2", &["*"]);
        hub.add(tasks_only).await;
        hub.add(everything).await;

        hub.broadcast("note:new", &frame("n")).await;
        hub.broadcast("task:updated", &frame("t")).await;

        // The filtered client saw only the task event.
        assert_eq!(&*tasks_rx.try_recv().unwrap(), "t");
        assert!(tasks_rx.try_recv().is_err());
        // The wildcard client saw both, in order.
        assert_eq!(&*all_rx.try_recv().unwrap(), "n");
        assert_eq!(&*all_rx.try_recv().unwrap(), "t");
    }

    #[tokio::test]
    async fn unsubscribed_connection_sees_nothing() {
        let hub = Hub::new(100);
        let (conn, mut rx) = connection("c1", &[]);
        hub.add(conn).await;
        hub.broadcast("task:updated", &frame("t")).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn targeted_delivery_by_agent_name() {
        let hub = Hub::new(100);
        let (scout, mut scout_rx) = connection("c1", &["*"]);
        scout.register_agent("Scout".into());
        let (relay, mut relay_rx) = connection("c2", &["*"]);
        relay.register_agent("Relay".into());
        hub.add(scout).await;
        hub.add(relay).await;

        assert!(hub.send_to_agent("Scout", &frame("for scout")).await);
        assert_eq!(&*scout_rx.try_recv().unwrap(), "for scout");
        assert!(relay_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_agent_is_false_not_error() {
        let hub = Hub::new(100);
        assert!(!hub.send_to_agent("Ghost", &frame("x")).await);
    }

    #[tokio::test]
    async fn slow_client_is_evicted_after_threshold() {
        let hub = Hub::new(2);
        let (tx, _rx) = mpsc::channel(1);
        let conn = Arc::new(ClientConnection::new("slow".into(), tx));
        conn.subscribe_to(["*".to_owned()]);
        hub.add(conn).await;

        // First frame fills the channel; the next two are dropped and
        // push the client over the threshold.
        hub.broadcast("task:updated", &frame("1")).await;
        hub.broadcast("task:updated", &frame("2")).await;
        assert_eq!(hub.connection_count().await, 1);
        hub.broadcast("task:updated", &frame("3")).await;
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let hub = Hub::new(100);
        let (conn, _rx) = connection("c1", &[]);
        hub.add(conn).await;
        hub.remove("c1").await;
        hub.remove("c1").await;
        assert_eq!(hub.connection_count().await, 0);
    }
}
