//! # opshub-core
//!
//! Domain model for the opshub dashboard: branded ID newtypes, the
//! project/task/assignment/agent records, and the pure lifecycle rules
//! that derive statuses from progress reports.
//!
//! This crate has no I/O and no async — everything here is plain data
//! and pure functions, shared by the store, the task service, the
//! bridge, and the server.

#![deny(unsafe_code)]

pub mod agent;
pub mod comms;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod project;
pub mod session;
pub mod task;

pub use error::CoreError;
