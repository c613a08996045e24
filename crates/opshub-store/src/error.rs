//! Store error type.

use thiserror::Error;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with the given ID.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind (e.g. "task").
        kind: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Shorthand for a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
