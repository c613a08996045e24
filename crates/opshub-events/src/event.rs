//! Domain event types.
//!
//! Events are ephemeral: they are published on the in-process bus,
//! forwarded to WebSocket clients, and never persisted. Payloads carry
//! the record ID plus enough denormalized context (title, project name,
//! author) for a UI to render the change without a follow-up read.

use opshub_core::agent::AgentStatus;
use opshub_core::ids::{AgentId, MessageId, NoteId, ProjectId, TaskId};
use opshub_core::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use opshub_core::CoreError;

/// The kind of a domain event, used for subscription filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A task changed status, progress, assignee, or verification.
    #[serde(rename = "task:updated")]
    TaskUpdated,
    /// An agent record changed (status, current action).
    #[serde(rename = "agent:updated")]
    AgentUpdated,
    /// Reconciliation found a new live session for an agent.
    #[serde(rename = "agent:connected")]
    AgentConnected,
    /// An agent's session vanished or its socket closed.
    #[serde(rename = "agent:disconnected")]
    AgentDisconnected,
    /// A project note was created.
    #[serde(rename = "note:new")]
    NoteNew,
    /// A top-level board message or reply was created.
    #[serde(rename = "message:new")]
    MessageNew,
    /// An operator sent a direct message to the coordinator.
    #[serde(rename = "comms:message:user")]
    UserMessage,
    /// The coordinator replied asynchronously.
    #[serde(rename = "comms:atlas:response")]
    CoordinatorResponse,
}

impl EventKind {
    /// Wire string for this kind, matching the WebSocket subscription names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskUpdated => "task:updated",
            Self::AgentUpdated => "agent:updated",
            Self::AgentConnected => "agent:connected",
            Self::AgentDisconnected => "agent:disconnected",
            Self::NoteNew => "note:new",
            Self::MessageNew => "message:new",
            Self::UserMessage => "comms:message:user",
            Self::CoordinatorResponse => "comms:atlas:response",
        }
    }

    /// All kinds, in a stable order.
    pub fn all() -> &'static [EventKind] {
        &[
            Self::TaskUpdated,
            Self::AgentUpdated,
            Self::AgentConnected,
            Self::AgentDisconnected,
            Self::NoteNew,
            Self::MessageNew,
            Self::UserMessage,
            Self::CoordinatorResponse,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task:updated" => Ok(Self::TaskUpdated),
            "agent:updated" => Ok(Self::AgentUpdated),
            "agent:connected" => Ok(Self::AgentConnected),
            "agent:disconnected" => Ok(Self::AgentDisconnected),
            "note:new" => Ok(Self::NoteNew),
            "message:new" => Ok(Self::MessageNew),
            "comms:message:user" => Ok(Self::UserMessage),
            "comms:atlas:response" => Ok(Self::CoordinatorResponse),
            other => Err(CoreError::UnknownVariant {
                kind: "event kind",
                value: other.to_owned(),
            }),
        }
    }
}

/// Payload for `task:updated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdatedPayload {
    /// The task that changed.
    pub task_id: TaskId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Project display name.
    pub project_name: String,
    /// Task title.
    pub title: String,
    /// Status after the change.
    pub status: TaskStatus,
    /// Progress after the change.
    pub progress: u8,
    /// Assignee after the change, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Who caused the change.
    pub actor: String,
}

/// Payload for `agent:updated`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdatedPayload {
    /// The agent record.
    pub agent_id: AgentId,
    /// Agent callsign.
    pub name: String,
    /// Status after the change.
    pub status: AgentStatus,
    /// What the agent reported it is doing, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
}

/// Payload for `agent:connected`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConnectedPayload {
    /// Agent callsign.
    pub name: String,
    /// The external session that appeared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Payload for `agent:disconnected`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDisconnectedPayload {
    /// Agent callsign.
    pub name: String,
}

/// Payload for `note:new`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteNewPayload {
    /// The new note.
    pub note_id: NoteId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Project display name.
    pub project_name: String,
    /// Note author.
    pub author: String,
    /// Note body.
    pub body: String,
}

/// Payload for `message:new`. Also published for replies, with
/// `in_reply_to` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNewPayload {
    /// The message (or the thread a reply landed in).
    pub message_id: MessageId,
    /// Owning project, if scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Author of the message or reply.
    pub author: String,
    /// Body of the message or reply.
    pub body: String,
    /// Set when this is a reply rather than a new thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<MessageId>,
}

/// Payload for `comms:message:user`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMessagePayload {
    /// The message record.
    pub message_id: MessageId,
    /// Operator handle.
    pub author: String,
    /// Message body.
    pub body: String,
}

/// Payload for `comms:atlas:response`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorResponsePayload {
    /// Reply body.
    pub body: String,
    /// The user message this answers, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<MessageId>,
}

/// A domain event. Ephemeral, broadcast over the in-process bus and
/// forwarded to WebSocket clients as `{type, payload, timestamp}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    /// A task changed.
    #[serde(rename = "task:updated")]
    TaskUpdated(TaskUpdatedPayload),
    /// An agent record changed.
    #[serde(rename = "agent:updated")]
    AgentUpdated(AgentUpdatedPayload),
    /// An agent session appeared.
    #[serde(rename = "agent:connected")]
    AgentConnected(AgentConnectedPayload),
    /// An agent session vanished.
    #[serde(rename = "agent:disconnected")]
    AgentDisconnected(AgentDisconnectedPayload),
    /// A note was created.
    #[serde(rename = "note:new")]
    NoteNew(NoteNewPayload),
    /// A message or reply was created.
    #[serde(rename = "message:new")]
    MessageNew(MessageNewPayload),
    /// An operator messaged the coordinator.
    #[serde(rename = "comms:message:user")]
    UserMessage(UserMessagePayload),
    /// The coordinator replied.
    #[serde(rename = "comms:atlas:response")]
    CoordinatorResponse(CoordinatorResponsePayload),
}

impl DomainEvent {
    /// Kind of this event, for subscription filtering.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TaskUpdated(_) => EventKind::TaskUpdated,
            Self::AgentUpdated(_) => EventKind::AgentUpdated,
            Self::AgentConnected(_) => EventKind::AgentConnected,
            Self::AgentDisconnected(_) => EventKind::AgentDisconnected,
            Self::NoteNew(_) => EventKind::NoteNew,
            Self::MessageNew(_) => EventKind::MessageNew,
            Self::UserMessage(_) => EventKind::UserMessage,
            Self::CoordinatorResponse(_) => EventKind::CoordinatorResponse,
        }
    }

    /// Serialize just the payload object.
    pub fn payload_json(&self) -> serde_json::Value {
        match self {
            Self::TaskUpdated(p) => serde_json::to_value(p),
            Self::AgentUpdated(p) => serde_json::to_value(p),
            Self::AgentConnected(p) => serde_json::to_value(p),
            Self::AgentDisconnected(p) => serde_json::to_value(p),
            Self::NoteNew(p) => serde_json::to_value(p),
            Self::MessageNew(p) => serde_json::to_value(p),
            Self::UserMessage(p) => serde_json::to_value(p),
            Self::CoordinatorResponse(p) => serde_json::to_value(p),
        }
        .unwrap_or(serde_json::Value::Null)
    }
}
