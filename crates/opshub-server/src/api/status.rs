//! Orchestrator status endpoint, served through the TTL cache so a
//! dashboard polling every second costs at most one subprocess per
//! freshness window.

use axum::Json;
use axum::extract::State;

use opshub_bridge::OrchestratorStatus;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<OrchestratorStatus>, ApiError> {
    let orchestrator = state.orchestrator.clone();
    let status = state
        .status_cache
        .fetch(|| async move { orchestrator.status().await })
        .await?;
    Ok(Json(status))
}
