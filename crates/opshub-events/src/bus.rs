//! In-process publish/subscribe bus.
//!
//! Each subscriber owns an unbounded FIFO queue drained by a dedicated
//! task. Publishing enqueues into every matching queue and returns
//! immediately, so the publish path never awaits a handler. Events of
//! the same kind reach a given subscriber in publish order; there is no
//! ordering guarantee across kinds or across subscribers. A handler
//! that returns an error or takes a long time affects only its own
//! queue.

use async_trait::async_trait;
use metrics::counter;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::{DomainEvent, EventKind};

/// Error type handlers may return. Failures are logged and dropped.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An async subscriber callback. Registered for the process lifetime.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus, never propagated.
    async fn handle(&self, event: DomainEvent) -> Result<(), HandlerError>;
}

/// One registered subscriber: a kind filter and the queue feeding its
/// drain task. `kind: None` means subscribed to everything.
struct Subscriber {
    kind: Option<EventKind>,
    tx: mpsc::UnboundedSender<DomainEvent>,
}

/// The in-process event bus.
///
/// Cheap to clone; all clones share the subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to one event kind.
    ///
    /// Spawns the drain task immediately; must be called from within a
    /// tokio runtime.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.register(Some(kind), handler);
    }

    /// Subscribe a handler to every event kind.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) {
        self.register(None, handler);
    }

    fn register(&self, kind: Option<EventKind>, handler: Arc<dyn EventHandler>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DomainEvent>();
        self.subscribers.write().push(Subscriber { kind, tx });

        // One drain task per subscriber: FIFO within the queue, isolated
        // from every other subscriber.
        drop(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                if let Err(error) = handler.handle(event).await {
                    counter!("events_handler_errors_total").increment(1);
                    warn!(kind = %kind, %error, "event handler failed");
                }
            }
            debug!("event subscriber drain task exiting");
        }));
    }

    /// Publish an event to every matching subscriber and return
    /// immediately. Never blocks, never fails.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind();
        counter!("events_published_total", "kind" => kind.as_str()).increment(1);

        let subscribers = self.subscribers.read();
        let mut delivered = 0usize;
        for sub in subscribers.iter() {
            if sub.kind.is_none_or(|k| k == kind) {
                // Send fails only if the drain task is gone; that
                // subscriber is effectively unsubscribed.
                if sub.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        debug!(kind = %kind, delivered, "published event");
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
