//! # opshub-bridge
//!
//! Everything that touches the external agent-orchestration process:
//!
//! - [`ProcessRunner`] / [`TokioProcessRunner`]: bounded subprocess
//!   execution with timeout and cancellation.
//! - [`OrchestratorClient`]: invokes the orchestrator CLI and parses its
//!   session listing and prompt replies.
//! - [`StatusCache`]: TTL cache with in-flight coalescing so concurrent
//!   status reads share one external call.
//! - [`SessionReconciler`]: periodic presence diffing between the
//!   orchestrator's live sessions and the agent records.
//! - [`NotifyPipeline`]: context-payload fanout to agents on new notes
//!   and messages, with coordinator reply write-back.

#![deny(unsafe_code)]

mod cache;
mod config;
mod error;
mod notify;
mod orchestrator;
mod process;
mod reconciler;
#[cfg(test)]
mod testutil;

pub use cache::StatusCache;
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use notify::NotifyPipeline;
pub use orchestrator::{OrchestratorClient, OrchestratorStatus};
pub use process::{ProcessOutput, ProcessRunner, RunOptions, TokioProcessRunner};
pub use reconciler::SessionReconciler;
