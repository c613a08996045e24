//! Agent endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;

use opshub_core::agent::{Agent, AgentStatus};
use opshub_events::{AgentConnectedPayload, DomainEvent};

use crate::error::ApiError;
use crate::state::AppState;

/// Body for `POST /api/agents/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgent {
    /// Agent callsign.
    pub name: String,
    /// Declared role, if any.
    pub role: Option<String>,
}

/// GET /api/agents
pub async fn get_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.store.agents())
}

/// POST /api/agents/register
///
/// Registration is an upsert: a known callsign refreshes the existing
/// record (and revives it from offline) rather than conflicting.
pub async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<RegisterAgent>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("agent name must not be empty".into()));
    }
    let agent = match state.store.agent_by_name(&body.name) {
        Some(mut agent) => {
            if body.role.is_some() {
                agent.role = body.role;
            }
            if agent.status == AgentStatus::Offline {
                agent.status = AgentStatus::Idle;
            }
            agent.last_seen = Utc::now();
            state.store.update_agent(agent.clone())?;
            agent
        }
        None => {
            let mut agent = Agent::register(&body.name);
            agent.role = body.role;
            state.store.insert_agent(agent.clone())?;
            agent
        }
    };
    state
        .bus
        .publish(DomainEvent::AgentConnected(AgentConnectedPayload {
            name: agent.name.clone(),
            session_id: None,
        }));
    Ok((StatusCode::CREATED, Json(agent)))
}
