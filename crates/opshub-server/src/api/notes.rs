//! Note endpoints. Creating a note publishes `note:new`, which drives
//! the notification fanout.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use opshub_core::comms::Note;
use opshub_core::ids::ProjectId;
use opshub_events::{DomainEvent, NoteNewPayload};

use crate::error::ApiError;
use crate::state::AppState;

/// Body for `POST /api/notes`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNote {
    /// Owning project.
    pub project_id: ProjectId,
    /// Author callsign or operator handle.
    pub author: String,
    /// Note body.
    pub body: String,
}

/// Query parameters for `GET /api/notes`.
#[derive(Debug, Deserialize)]
pub struct NoteQuery {
    /// The project to list notes for.
    pub project: ProjectId,
}

/// POST /api/notes
pub async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<CreateNote>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::Validation("note body must not be empty".into()));
    }
    // The project must exist; its name is denormalized into the event.
    let project = state.store.project(&body.project_id)?;
    let note = Note::new(body.project_id, body.author, body.body);
    state.store.insert_note(note.clone())?;
    state.bus.publish(DomainEvent::NoteNew(NoteNewPayload {
        note_id: note.id.clone(),
        project_id: note.project_id.clone(),
        project_name: project.name,
        author: note.author.clone(),
        body: note.body.clone(),
    }));
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/notes?project={id}
pub async fn get_notes(
    State(state): State<AppState>,
    Query(query): Query<NoteQuery>,
) -> Json<Vec<Note>> {
    Json(state.store.notes_for_project(&query.project))
}
