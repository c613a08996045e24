//! Shared state for Axum handlers.

use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use opshub_bridge::{OrchestratorClient, OrchestratorStatus, StatusCache};
use opshub_events::EventBus;
use opshub_store::RecordStore;
use opshub_tasks::TaskService;

use crate::config::ServerConfig;
use crate::ws::Hub;

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// The record store.
    pub store: Arc<dyn RecordStore>,
    /// The in-process event bus.
    pub bus: EventBus,
    /// Task/assignment transition service.
    pub tasks: Arc<TaskService>,
    /// The realtime hub.
    pub hub: Arc<Hub>,
    /// Cached orchestrator status.
    pub status_cache: Arc<StatusCache<OrchestratorStatus>>,
    /// Orchestrator CLI client.
    pub orchestrator: Arc<OrchestratorClient>,
    /// Server section of the settings.
    pub config: Arc<ServerConfig>,
    /// Prometheus render handle; `None` when metrics are disabled (tests).
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}
