//! # opshub-tasks
//!
//! Business logic for task delegation and progress. Wraps the record
//! store with the transition rules (assign / report / verify / reopen),
//! first-reporter-claims semantics, project rollup recomputation,
//! activity logging, and domain-event publication.

#![deny(unsafe_code)]

mod error;
mod service;

pub use error::TaskError;
pub use service::{ReportParams, TaskService, VerificationNotifier, VerificationRequest};
