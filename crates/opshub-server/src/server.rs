//! Router assembly and the serve loop.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use opshub_core::agent::AgentStatus;

use crate::api;
use crate::health::health_check;
use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws_handler))
        .route("/api/projects", post(api::create_project).get(api::get_projects))
        .route("/api/projects/{id}", get(api::get_project))
        .route("/api/tasks", post(api::create_task).get(api::get_tasks))
        .route("/api/tasks/{id}", get(api::get_task))
        .route("/api/tasks/{id}/assign", post(api::assign_task))
        .route("/api/tasks/{id}/report", post(api::report_task))
        .route("/api/tasks/{id}/verify", post(api::verify_task))
        .route("/api/tasks/{id}/reopen", post(api::reopen_task))
        .route("/api/agents", get(api::get_agents))
        .route("/api/agents/register", post(api::register_agent))
        .route("/api/notes", post(api::create_note).get(api::get_notes))
        .route("/api/messages", post(api::create_message).get(api::get_messages))
        .route("/api/messages/{id}/replies", post(api::create_reply))
        .route("/api/messages/{id}/upvote", post(api::toggle_upvote))
        .route("/api/status", get(api::get_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.hub.connection_count().await;
    let agents_online = state
        .store
        .agents()
        .iter()
        .filter(|a| a.status != AgentStatus::Offline)
        .count();
    Json(health_check(state.start_time, connections, agents_online))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Bind and serve until the shutdown token fires.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
