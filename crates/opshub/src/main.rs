//! # opshubd
//!
//! Dashboard daemon binary: wires the store, the event bus, the task
//! service, the orchestrator bridge, and the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use opshub_bridge::{
    NotifyPipeline, OrchestratorClient, SessionReconciler, StatusCache, TokioProcessRunner,
};
use opshub_core::agent::Agent;
use opshub_events::EventBus;
use opshub_server::config::{load_settings, settings_path};
use opshub_server::ws::Hub;
use opshub_server::{AppState, HubForwarder, ShutdownCoordinator, serve};
use opshub_store::{MemoryStore, RecordStore};
use opshub_tasks::TaskService;

/// Agent fleet dashboard daemon.
#[derive(Parser, Debug)]
#[command(name = "opshubd", about = "Agent fleet dashboard daemon")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log: String,
}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log);

    let settings_path = args.settings.unwrap_or_else(settings_path);
    let mut settings = load_settings(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let metrics_handle = opshub_server::metrics::install_recorder()
        .context("failed to install metrics recorder")?;

    let shutdown = ShutdownCoordinator::new();
    let cancel = shutdown.token();

    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let coordinator = settings.bridge.coordinator.clone();

    // The coordinator always has a record, even before its first poll.
    if store.agent_by_name(&coordinator).is_none() {
        store
            .insert_agent(Agent::register(&coordinator))
            .context("failed to seed coordinator agent")?;
    }

    let tasks = Arc::new(TaskService::new(
        store.clone(),
        bus.clone(),
        coordinator.clone(),
    ));

    let hub = Arc::new(Hub::new(settings.server.max_dropped_messages));
    HubForwarder::new(hub.clone()).subscribe(&bus);

    let orchestrator = Arc::new(OrchestratorClient::new(
        Arc::new(TokioProcessRunner),
        settings.bridge.command.clone(),
        Duration::from_secs(settings.bridge.dispatch_timeout_secs),
        cancel.clone(),
    ));
    let status_cache = Arc::new(StatusCache::new(Duration::from_secs(
        settings.bridge.cache_ttl_secs,
    )));

    let pipeline = NotifyPipeline::new(
        store.clone(),
        bus.clone(),
        orchestrator.clone(),
        coordinator.clone(),
    );
    pipeline.subscribe();
    tasks.set_notifier(Arc::new(pipeline));

    let reconciler = Arc::new(SessionReconciler::new(
        store.clone(),
        bus.clone(),
        orchestrator.clone(),
        status_cache.clone(),
        coordinator,
        Duration::from_secs(settings.bridge.poll_interval_secs),
        Duration::from_secs(settings.bridge.poll_timeout_secs),
    ));
    let reconciler_handle = tokio::spawn(reconciler.run(cancel.clone()));

    let state = AppState {
        store,
        bus,
        tasks,
        hub,
        status_cache,
        orchestrator,
        config: Arc::new(settings.server.clone()),
        metrics: Some(metrics_handle),
        start_time: Instant::now(),
    };

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(error) = serve(state, server_cancel).await {
            tracing::error!(%error, "server exited with error");
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    shutdown
        .graceful_shutdown(vec![reconciler_handle, server_handle], None)
        .await;
    tracing::info!("shutdown complete");
    Ok(())
}
