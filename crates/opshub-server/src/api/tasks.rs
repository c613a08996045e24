//! Task endpoints. Transition handlers delegate to the task service,
//! which owns the state machine and publishes `task:updated`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use opshub_core::ids::{ProjectId, TaskId};
use opshub_core::task::{Assignment, Task, TaskPriority, TaskStatus};
use opshub_store::TaskFilter;
use opshub_tasks::ReportParams;

use crate::error::ApiError;
use crate::state::AppState;

use super::DEFAULT_ACTOR;

/// Body for `POST /api/tasks`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    /// Owning project.
    pub project_id: ProjectId,
    /// Short title.
    pub title: String,
    /// Longer description, if any.
    pub description: Option<String>,
    /// Priority; defaults to medium.
    pub priority: Option<TaskPriority>,
    /// Who is creating the task.
    pub actor: Option<String>,
}

/// Query parameters for `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    /// Restrict to one project.
    pub project: Option<ProjectId>,
    /// Restrict to one assignee callsign.
    pub agent: Option<String>,
    /// Restrict to one status.
    pub status: Option<TaskStatus>,
}

/// Body for `POST /api/tasks/{id}/assign`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTask {
    /// Receiving agent callsign.
    pub to: String,
    /// Delegating identity.
    pub by: Option<String>,
    /// Parent task for sub-delegation, if any.
    pub parent_task_id: Option<TaskId>,
}

/// Body for `POST /api/tasks/{id}/report`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTask {
    /// Reporting agent callsign.
    pub agent: String,
    /// Reported progress, 0–100.
    pub progress: Option<u8>,
    /// Explicit status override.
    pub status: Option<TaskStatus>,
    /// Free-text message.
    pub message: Option<String>,
    /// What the agent is currently doing.
    pub action: Option<String>,
}

/// Body for `POST /api/tasks/{id}/verify` and `/reopen`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTask {
    /// Who verified or reopened.
    pub by: Option<String>,
    /// Free-text reason.
    pub message: Option<String>,
}

/// A task with its full delegation history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetail {
    /// The task record.
    #[serde(flatten)]
    pub task: Task,
    /// Assignments, oldest first.
    pub assignments: Vec<Assignment>,
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if body.title.trim().is_empty() {
        return Err(ApiError::Validation("task title must not be empty".into()));
    }
    let actor = body.actor.as_deref().unwrap_or(DEFAULT_ACTOR);
    let task = state.tasks.create_task(
        &body.project_id,
        body.title,
        body.description,
        body.priority,
        actor,
    )?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks
pub async fn get_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Json<Vec<Task>> {
    let filter = TaskFilter {
        project_id: query.project,
        assignee: query.agent,
        status: query.status,
    };
    Json(state.store.tasks(&filter))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Json<TaskDetail>, ApiError> {
    let task = state.store.task(&id)?;
    let assignments = state.store.assignments_for_task(&id);
    Ok(Json(TaskDetail { task, assignments }))
}

/// POST /api/tasks/{id}/assign
pub async fn assign_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<AssignTask>,
) -> Result<Json<Task>, ApiError> {
    let by = body.by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let task = state.tasks.assign(&id, &body.to, by, body.parent_task_id)?;
    Ok(Json(task))
}

/// POST /api/tasks/{id}/report
pub async fn report_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<ReportTask>,
) -> Result<Json<Task>, ApiError> {
    let params = ReportParams {
        progress: body.progress,
        status: body.status,
        message: body.message,
        action: body.action,
    };
    let task = state.tasks.report(&id, &body.agent, params)?;
    Ok(Json(task))
}

/// POST /api/tasks/{id}/verify
pub async fn verify_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<ReviewTask>,
) -> Result<Json<Task>, ApiError> {
    let by = body.by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let task = state.tasks.verify(&id, by, body.message)?;
    Ok(Json(task))
}

/// POST /api/tasks/{id}/reopen
pub async fn reopen_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<ReviewTask>,
) -> Result<Json<Task>, ApiError> {
    let by = body.by.as_deref().unwrap_or(DEFAULT_ACTOR);
    let task = state.tasks.reopen(&id, by, body.message)?;
    Ok(Json(task))
}
