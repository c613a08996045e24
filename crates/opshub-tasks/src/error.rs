//! Task service error type.

use thiserror::Error;

/// Errors from task transitions.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The underlying record was missing or conflicted.
    #[error(transparent)]
    Store(#[from] opshub_store::StoreError),

    /// A domain rule rejected the request.
    #[error(transparent)]
    Core(#[from] opshub_core::CoreError),

    /// The requested transition is not allowed from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl TaskError {
    /// Whether this error maps to a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
