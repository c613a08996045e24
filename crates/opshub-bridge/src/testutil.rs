//! Shared test doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::BridgeError;
use crate::process::{ProcessOutput, ProcessRunner, RunOptions};

/// One recorded invocation: args and piped stdin.
pub(crate) type Call = (Vec<String>, Option<String>);

/// Fake runner with canned per-subcommand responses.
pub(crate) struct FakeRunner {
    pub calls: Mutex<Vec<Call>>,
    /// stdout for `status` calls, or stderr when Err.
    pub on_status: Mutex<Result<String, String>>,
    /// stdout for `send` calls, or stderr when Err.
    pub on_send: Mutex<Result<String, String>>,
}

impl FakeRunner {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            on_status: Mutex::new(Ok(r#"{"sessions":[]}"#.into())),
            on_send: Mutex::new(Ok("ok".into())),
        })
    }

    pub(crate) fn with_status(stdout: &str) -> Arc<Self> {
        let runner = Self::new();
        *runner.on_status.lock() = Ok(stdout.into());
        runner
    }

    pub(crate) fn set_status(&self, result: Result<&str, &str>) {
        *self.on_status.lock() = result.map(str::to_owned).map_err(str::to_owned);
    }

    pub(crate) fn set_send(&self, result: Result<&str, &str>) {
        *self.on_send.lock() = result.map(str::to_owned).map_err(str::to_owned);
    }

    /// Prompts piped to `send` calls, in order.
    pub(crate) fn sent_prompts(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .iter()
            .filter(|(args, _)| args.iter().any(|a| a == "send"))
            .map(|(args, stdin)| {
                let recipient = args
                    .iter()
                    .position(|a| a == "--agent")
                    .and_then(|i| args.get(i + 1))
                    .cloned()
                    .unwrap_or_default();
                (recipient, stdin.clone().unwrap_or_default())
            })
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        _program: &str,
        args: &[String],
        opts: &RunOptions,
    ) -> Result<ProcessOutput, BridgeError> {
        self.calls.lock().push((args.to_vec(), opts.stdin.clone()));
        let canned = if args.iter().any(|a| a == "send") {
            self.on_send.lock().clone()
        } else {
            self.on_status.lock().clone()
        };
        match canned {
            Ok(stdout) => Ok(ProcessOutput {
                stdout,
                stderr: String::new(),
                exit_code: 0,
                duration_ms: 1,
            }),
            Err(stderr) => Ok(ProcessOutput {
                stdout: String::new(),
                stderr,
                exit_code: 1,
                duration_ms: 1,
            }),
        }
    }
}
