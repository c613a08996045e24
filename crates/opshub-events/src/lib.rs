//! # opshub-events
//!
//! Domain events and the in-process event bus.
//!
//! Every state change in the system flows through here: HTTP handlers,
//! the session reconciler, and the notification pipeline all publish
//! [`DomainEvent`]s, and the realtime hub plus the fanout pipeline
//! consume them. The bus guarantees per-subscriber FIFO delivery and
//! full isolation between subscribers — a slow or failing handler can
//! never block a publisher or a sibling.

#![deny(unsafe_code)]

mod bus;
mod event;

pub use bus::{EventBus, EventHandler};
pub use event::{
    AgentConnectedPayload, AgentDisconnectedPayload, AgentUpdatedPayload, CoordinatorResponsePayload,
    DomainEvent, EventKind, MessageNewPayload, NoteNewPayload, TaskUpdatedPayload,
    UserMessagePayload,
};
