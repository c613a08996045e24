//! Bus-to-hub bridge.
//!
//! Subscribes to every domain event and forwards it to the realtime hub
//! as a `{type, payload, timestamp}` envelope, serialized once and
//! shared across recipients.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use opshub_core::task::TaskStatus;
use opshub_events::{DomainEvent, EventBus, EventHandler};

use crate::ws::protocol::event_envelope;
use crate::ws::Hub;

/// Forwards domain events to WebSocket clients.
pub struct HubForwarder {
    hub: Arc<Hub>,
}

impl HubForwarder {
    /// Create a forwarder over the given hub.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Register on the bus for every event kind.
    pub fn subscribe(self, bus: &EventBus) {
        bus.subscribe_all(Arc::new(self));
    }
}

#[async_trait]
impl EventHandler for HubForwarder {
    async fn handle(
        &self,
        event: DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let kind = event.kind();
        match serde_json::to_string(&event_envelope(&event)) {
            Ok(json) => {
                let frame = Arc::new(json);
                self.hub.broadcast(kind.as_str(), &frame).await;
                // Fresh delegations are also handed directly to the
                // assignee's connection, subscribed or not. Skipped when
                // the broadcast already reached it.
                if let DomainEvent::TaskUpdated(p) = &event
                    && p.status == TaskStatus::Assigned
                    && let Some(assignee) = &p.assignee
                    && !self.hub.agent_wants(assignee, kind.as_str()).await
                    && !self.hub.send_to_agent(assignee, &frame).await
                {
                    debug!(%assignee, "assignee not connected, handoff skipped");
                }
            }
            Err(error) => warn!(kind = %kind, %error, "failed to serialize event envelope"),
        }
        Ok(())
    }
}
