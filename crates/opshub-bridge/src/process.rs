//! Subprocess execution with timeout and cancellation.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Options for one subprocess run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Hard deadline for the whole run.
    pub timeout: Duration,
    /// Cancelled on shutdown.
    pub cancellation: CancellationToken,
    /// Written to the child's stdin, if set.
    pub stdin: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            cancellation: CancellationToken::new(),
            stdin: None,
        }
    }
}

/// Output of a completed subprocess run.
#[derive(Clone, Debug)]
pub struct ProcessOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Exit code, -1 if unavailable.
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ProcessOutput {
    /// Whether the run succeeded.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Subprocess execution boundary. Faked in tests.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, honoring the deadline and cancellation
    /// in `opts`. Timeout and cancellation are errors, not flags.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        opts: &RunOptions,
    ) -> Result<ProcessOutput, BridgeError>;
}

/// Real subprocess execution backed by `tokio::process::Command`.
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        opts: &RunOptions,
    ) -> Result<ProcessOutput, BridgeError> {
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(program);
        let _ = cmd
            .args(args)
            .stdin(if opts.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program, ?args, "spawning orchestrator process");

        let mut child = cmd
            .spawn()
            .map_err(|e| BridgeError::Spawn(e.to_string()))?;

        if let Some(input) = &opts.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| BridgeError::Spawn(format!("stdin write failed: {e}")))?;
            drop(stdin);
        }

        let timeout_ms = u64::try_from(opts.timeout.as_millis()).unwrap_or(u64::MAX);
        let output = tokio::select! {
            result = child.wait_with_output() => {
                result.map_err(|e| BridgeError::Spawn(format!("wait failed: {e}")))?
            }
            () = tokio::time::sleep(opts.timeout) => {
                warn!(program, timeout_ms, "orchestrator process timed out");
                return Err(BridgeError::Timeout(timeout_ms));
            }
            () = opts.cancellation.cancelled() => {
                debug!(program, "orchestrator process cancelled");
                return Err(BridgeError::Cancelled);
            }
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        debug!(program, exit_code, duration_ms, "orchestrator process completed");

        Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code,
            duration_ms,
        })
    }
}
