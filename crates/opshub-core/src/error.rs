//! Core error type.

use thiserror::Error;

/// Errors raised by domain-level validation and lifecycle rules.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A lifecycle transition was requested that the current state forbids.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// A field failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An enum string could not be parsed.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Which enum was being parsed.
        kind: &'static str,
        /// The offending value.
        value: String,
    },
}
