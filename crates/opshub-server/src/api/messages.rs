//! Message-board endpoints.
//!
//! A message scoped to a project publishes `message:new`. A message
//! with no project is a direct operator line to the coordinator and
//! publishes `comms:message:user` instead; the notification pipeline
//! answers it asynchronously with `comms:atlas:response`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use opshub_core::comms::ThreadMessage;
use opshub_core::ids::{MessageId, ProjectId};
use opshub_events::{DomainEvent, MessageNewPayload, UserMessagePayload};

use crate::error::ApiError;
use crate::state::AppState;

/// Body for `POST /api/messages`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessage {
    /// Owning project; absent for a direct coordinator message.
    pub project_id: Option<ProjectId>,
    /// Author callsign or operator handle.
    pub author: String,
    /// Message body.
    pub body: String,
}

/// Body for `POST /api/messages/{id}/replies`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReply {
    /// Reply author.
    pub author: String,
    /// Reply body.
    pub body: String,
}

/// Body for `POST /api/messages/{id}/upvote`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upvote {
    /// Who is voting.
    pub voter: String,
}

/// Response for the upvote toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpvoteResult {
    /// Whether the vote is now present.
    pub upvoted: bool,
    /// Total votes after the toggle.
    pub upvotes: usize,
}

/// POST /api/messages
pub async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<CreateMessage>,
) -> Result<(StatusCode, Json<ThreadMessage>), ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::Validation("message body must not be empty".into()));
    }
    if let Some(project_id) = &body.project_id {
        // Reject dangling project references up front.
        let _ = state.store.project(project_id)?;
    }
    let message = ThreadMessage::new(body.project_id, body.author, body.body);
    state.store.insert_message(message.clone())?;

    let event = if message.project_id.is_some() {
        DomainEvent::MessageNew(MessageNewPayload {
            message_id: message.id.clone(),
            project_id: message.project_id.clone(),
            author: message.author.clone(),
            body: message.body.clone(),
            in_reply_to: None,
        })
    } else {
        DomainEvent::UserMessage(UserMessagePayload {
            message_id: message.id.clone(),
            author: message.author.clone(),
            body: message.body.clone(),
        })
    };
    state.bus.publish(event);
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/messages
pub async fn get_messages(State(state): State<AppState>) -> Json<Vec<ThreadMessage>> {
    Json(state.store.messages())
}

/// POST /api/messages/{id}/replies
pub async fn create_reply(
    State(state): State<AppState>,
    Path(id): Path<MessageId>,
    Json(body): Json<CreateReply>,
) -> Result<(StatusCode, Json<ThreadMessage>), ApiError> {
    if body.body.trim().is_empty() {
        return Err(ApiError::Validation("reply body must not be empty".into()));
    }
    let mut message = state.store.message(&id)?;
    message.add_reply(body.author.clone(), body.body.clone());
    state.store.update_message(message.clone())?;
    state.bus.publish(DomainEvent::MessageNew(MessageNewPayload {
        message_id: message.id.clone(),
        project_id: message.project_id.clone(),
        author: body.author,
        body: body.body,
        in_reply_to: Some(message.id.clone()),
    }));
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/messages/{id}/upvote
///
/// Toggling a vote is silent: no event is published.
pub async fn toggle_upvote(
    State(state): State<AppState>,
    Path(id): Path<MessageId>,
    Json(body): Json<Upvote>,
) -> Result<Json<UpvoteResult>, ApiError> {
    let mut message = state.store.message(&id)?;
    let upvoted = message.toggle_upvote(&body.voter);
    let upvotes = message.upvotes.len();
    state.store.update_message(message)?;
    Ok(Json(UpvoteResult { upvoted, upvotes }))
}
