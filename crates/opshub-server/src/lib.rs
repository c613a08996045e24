//! # opshub-server
//!
//! Axum HTTP + `WebSocket` server for the ops dashboard:
//!
//! - HTTP API for projects, tasks, agents, notes, and messages; every
//!   mutation publishes a domain event on the in-process bus.
//! - Realtime hub: per-connection subscription filters, targeted
//!   delivery to agent-registered connections, a `state` snapshot on
//!   subscribe, heartbeat ping/pong, and drop-based eviction of slow
//!   clients.
//! - Bus-to-hub bridge forwarding every domain event as a
//!   `{type, payload, timestamp}` envelope.
//! - `/health`, Prometheus `/metrics`, graceful shutdown.

#![deny(unsafe_code)]

pub mod api;
mod bridge;
pub mod config;
mod error;
mod health;
pub mod metrics;
mod server;
mod shutdown;
mod snapshot;
mod state;
#[cfg(test)]
mod testutil;
pub mod ws;

pub use bridge::HubForwarder;
pub use config::{ServerConfig, Settings, SettingsError};
pub use error::ApiError;
pub use server::{router, serve};
pub use shutdown::ShutdownCoordinator;
pub use snapshot::StateSnapshot;
pub use state::AppState;
