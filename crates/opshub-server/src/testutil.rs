//! Shared test fixtures.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use opshub_bridge::{
    BridgeError, OrchestratorClient, ProcessOutput, ProcessRunner, RunOptions, StatusCache,
};
use opshub_events::EventBus;
use opshub_store::MemoryStore;
use opshub_tasks::TaskService;

use crate::config::ServerConfig;
use crate::state::AppState;
use crate::ws::Hub;

/// Runner returning a canned stdout for every invocation.
pub(crate) struct CannedRunner {
    pub calls: Mutex<u32>,
    pub stdout: Mutex<Result<String, String>>,
    /// Artificial latency before answering.
    pub delay: Duration,
}

impl CannedRunner {
    pub(crate) fn new(stdout: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
            stdout: Mutex::new(Ok(stdout.to_owned())),
            delay: Duration::ZERO,
        })
    }

    pub(crate) fn call_count(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl ProcessRunner for CannedRunner {
    async fn run(
        &self,
        _program: &str,
        _args: &[String],
        _opts: &RunOptions,
    ) -> Result<ProcessOutput, BridgeError> {
        *self.calls.lock() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.stdout.lock().clone() {
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

/// Build an [`AppState`] over a fresh memory store and the given runner.
pub(crate) fn test_state(runner: Arc<CannedRunner>) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let tasks = Arc::new(TaskService::new(store.clone(), bus.clone(), "ATLAS"));
    let config = ServerConfig::default();
    let hub = Arc::new(Hub::new(config.max_dropped_messages));
    let orchestrator = Arc::new(OrchestratorClient::new(
        runner,
        vec!["orc".into()],
        Duration::from_secs(5),
        CancellationToken::new(),
    ));
    let state = AppState {
        store: store.clone(),
        bus,
        tasks,
        hub,
        status_cache: Arc::new(StatusCache::new(Duration::from_secs(20))),
        orchestrator,
        config: Arc::new(config),
        metrics: None,
        start_time: Instant::now(),
    };
    (state, store)
}
