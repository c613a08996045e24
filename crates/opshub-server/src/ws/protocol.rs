//! Wire protocol for the realtime hub.
//!
//! Server frames are `{type, payload, timestamp}` envelopes; the `type`
//! of a forwarded domain event is its event-kind string. Client frames
//! are a tagged union on `type`.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use opshub_core::task::TaskStatus;
use opshub_events::DomainEvent;
use opshub_core::ids::TaskId;

/// Subscription marker matching every event kind.
pub const SUBSCRIBE_ALL: &str = "*";

/// A message from a connected client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Replace this connection's subscription set. The hub answers with
    /// a `state` snapshot before any live event.
    #[serde(rename = "subscribe")]
    Subscribe {
        /// Event-kind strings, or `"*"` for everything.
        subscriptions: Vec<String>,
    },
    /// Bind an agent identity to this connection.
    #[serde(rename = "agent:register", rename_all = "camelCase")]
    AgentRegister {
        /// Agent callsign.
        name: String,
        /// Declared role, if any.
        #[serde(default)]
        role: Option<String>,
    },
    /// Self-reported presence/activity change.
    #[serde(rename = "agent:status", rename_all = "camelCase")]
    AgentStatus {
        /// New status string (`idle` | `active` | `offline`).
        status: opshub_core::agent::AgentStatus,
        /// What the agent is doing, if anything.
        #[serde(default)]
        action: Option<String>,
    },
    /// Progress report against a task.
    #[serde(rename = "agent:progress", rename_all = "camelCase")]
    AgentProgress {
        /// The task being reported on.
        task_id: TaskId,
        /// Reported progress, 0–100.
        #[serde(default)]
        progress: Option<u8>,
        /// Explicit status override.
        #[serde(default)]
        status: Option<TaskStatus>,
        /// Free-text message.
        #[serde(default)]
        message: Option<String>,
        /// Current action.
        #[serde(default)]
        action: Option<String>,
    },
    /// Completion report: progress 100, status done.
    #[serde(rename = "agent:complete", rename_all = "camelCase")]
    AgentComplete {
        /// The task being completed.
        task_id: TaskId,
        /// Free-text message.
        #[serde(default)]
        message: Option<String>,
    },
}

/// Build a `{type, payload, timestamp}` envelope.
pub fn envelope(kind: &str, payload: Value) -> Value {
    json!({
        "type": kind,
        "payload": payload,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

/// Envelope for a forwarded domain event.
pub fn event_envelope(event: &DomainEvent) -> Value {
    envelope(event.kind().as_str(), event.payload_json())
}
