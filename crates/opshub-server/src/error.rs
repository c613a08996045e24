//! HTTP API error type.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use opshub_bridge::BridgeError;
use opshub_store::StoreError;
use opshub_tasks::TaskError;

/// Error returned by API handlers, rendered as a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The addressed record does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The request is structurally valid but semantically wrong.
    #[error("{0}")]
    Validation(String),
    /// The orchestrator is unreachable and no cached answer exists.
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            Self::NotFound(e.to_string())
        } else {
            Self::Validation(e.to_string())
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        if e.is_not_found() {
            Self::NotFound(e.to_string())
        } else {
            Self::Validation(e.to_string())
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        Self::Upstream(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_is_404() {
        let e: ApiError = StoreError::not_found("task", "t-1").into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn task_invalid_transition_is_400() {
        let e: ApiError = TaskError::InvalidTransition("cannot verify".into()).into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bridge_error_is_503() {
        let e: ApiError = BridgeError::Timeout(100).into();
        assert_eq!(e.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
