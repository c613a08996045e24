//! Bridge error type.

use thiserror::Error;

/// Errors from the orchestrator boundary.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The subprocess could not be spawned.
    #[error("failed to spawn orchestrator process: {0}")]
    Spawn(String),

    /// The subprocess did not finish within the deadline.
    #[error("orchestrator call timed out after {0}ms")]
    Timeout(u64),

    /// The subprocess was cancelled by shutdown.
    #[error("orchestrator call cancelled")]
    Cancelled,

    /// The subprocess exited non-zero.
    #[error("orchestrator exited with status {code}: {stderr}")]
    Status {
        /// Exit code.
        code: i32,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The subprocess output could not be parsed.
    #[error("failed to parse orchestrator output: {0}")]
    Parse(#[from] serde_json::Error),

    /// No fresh value and no last-known-good to fall back on.
    #[error("orchestrator status unavailable: {0}")]
    Unavailable(String),
}
