//! Orchestrator CLI client.
//!
//! The orchestrator is an external process we only reach by invoking its
//! CLI. Two calls matter here: a status listing of live sessions, and a
//! one-shot prompt dispatch to a named agent whose stdout is the reply.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use opshub_core::session::SessionDescriptor;

use crate::error::BridgeError;
use crate::process::{ProcessRunner, RunOptions};

/// Parsed orchestrator status: the set of live sessions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    /// Live sessions by the orchestrator's reckoning.
    pub sessions: Vec<SessionDescriptor>,
}

/// Wire shapes the orchestrator emits. Older builds nest sessions under
/// a heartbeat object; both are accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusWire {
    #[serde(default)]
    sessions: Option<Vec<SessionDescriptor>>,
    #[serde(default)]
    heartbeat: Option<HeartbeatWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeartbeatWire {
    #[serde(default)]
    agents: Vec<SessionDescriptor>,
}

/// Invokes the orchestrator CLI.
pub struct OrchestratorClient {
    runner: Arc<dyn ProcessRunner>,
    /// Program followed by base arguments.
    command: Vec<String>,
    timeout: Duration,
    cancellation: CancellationToken,
}

impl OrchestratorClient {
    /// Create a client. `command` is the program plus base arguments;
    /// it must not be empty.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        command: Vec<String>,
        timeout: Duration,
        cancellation: CancellationToken,
    ) -> Self {
        debug_assert!(!command.is_empty());
        Self {
            runner,
            command,
            timeout,
            cancellation,
        }
    }

    fn opts(&self, stdin: Option<String>) -> RunOptions {
        RunOptions {
            timeout: self.timeout,
            cancellation: self.cancellation.clone(),
            stdin,
        }
    }

    async fn invoke(
        &self,
        extra_args: &[String],
        stdin: Option<String>,
    ) -> Result<String, BridgeError> {
        let program = self
            .command
            .first()
            .ok_or_else(|| BridgeError::Spawn("empty orchestrator command".into()))?;
        let mut args: Vec<String> = self.command[1..].to_vec();
        args.extend_from_slice(extra_args);

        let output = self.runner.run(program, &args, &self.opts(stdin)).await?;
        if !output.success() {
            return Err(BridgeError::Status {
                code: output.exit_code,
                stderr: output.stderr.trim().to_owned(),
            });
        }
        Ok(output.stdout)
    }

    /// Query the orchestrator for its live sessions.
    pub async fn status(&self) -> Result<OrchestratorStatus, BridgeError> {
        let stdout = self
            .invoke(&["status".into(), "--json".into()], None)
            .await?;
        let wire: StatusWire = serde_json::from_str(&stdout)?;
        let sessions = wire
            .sessions
            .or(wire.heartbeat.map(|h| h.agents))
            .unwrap_or_default();
        debug!(count = sessions.len(), "orchestrator sessions parsed");
        Ok(OrchestratorStatus { sessions })
    }

    /// Send a prompt to a named agent and return its reply (stdout).
    pub async fn send_prompt(&self, recipient: &str, prompt: &str) -> Result<String, BridgeError> {
        let stdout = self
            .invoke(
                &["send".into(), "--agent".into(), recipient.into()],
                Some(prompt.to_owned()),
            )
            .await?;
        Ok(stdout.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRunner;

    fn client(runner: Arc<FakeRunner>) -> OrchestratorClient {
        OrchestratorClient::new(
            runner,
            vec!["orc".into(), "--quiet".into()],
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn status_parses_flat_sessions() {
        let runner =
            FakeRunner::with_status(r#"{"sessions":[{"sessionId":"s-1","agentName":"Scout"}]}"#);
        let status = client(runner.clone()).status().await.unwrap();
        assert_eq!(status.sessions.len(), 1);
        assert_eq!(status.sessions[0].agent_name.as_deref(), Some("Scout"));

        // Base args are preserved ahead of the subcommand.
        let calls = runner.calls.lock();
        assert_eq!(calls[0].0, vec!["--quiet", "status", "--json"]);
    }

    #[tokio::test]
    async fn status_parses_heartbeat_shape() {
        let runner = FakeRunner::with_status(
            r#"{"heartbeat":{"agents":[{"sessionId":"s-2","agentName":"Relay"}]}}"#,
        );
        let status = client(runner).status().await.unwrap();
        assert_eq!(status.sessions[0].session_id, "s-2");
    }

    #[tokio::test]
    async fn nonzero_exit_is_status_error() {
        let runner = FakeRunner::new();
        runner.set_status(Err("boom"));
        let result = client(runner).status().await;
        assert!(matches!(
            result,
            Err(BridgeError::Status { code: 1, ref stderr }) if stderr == "boom"
        ));
    }

    #[tokio::test]
    async fn garbage_output_is_parse_error() {
        let runner = FakeRunner::with_status("not json");
        assert!(matches!(
            client(runner).status().await,
            Err(BridgeError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn send_prompt_pipes_stdin() {
        let runner = FakeRunner::new();
        runner.set_send(Ok("acknowledged\n"));
        let reply = client(runner.clone())
            .send_prompt("ATLAS", "please verify task X")
            .await
            .unwrap();
        assert_eq!(reply, "acknowledged");

        let calls = runner.calls.lock();
        assert_eq!(calls[0].0, vec!["--quiet", "send", "--agent", "ATLAS"]);
        assert_eq!(calls[0].1.as_deref(), Some("please verify task X"));
    }
}
