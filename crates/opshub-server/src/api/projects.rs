//! Project endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

use opshub_core::ids::ProjectId;
use opshub_core::project::Project;

use crate::error::ApiError;
use crate::state::AppState;

use super::DEFAULT_ACTOR;

/// Body for `POST /api/projects`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    /// Display name.
    pub name: String,
    /// Longer description, if any.
    pub description: Option<String>,
    /// Who is creating the project.
    pub actor: Option<String>,
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("project name must not be empty".into()));
    }
    let actor = body.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
    let project = state
        .tasks
        .create_project(body.name, body.description, actor)?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
pub async fn get_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.store.projects())
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.store.project(&id)?))
}
