//! Typed API error taxonomy mapped to HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid start parameters. Rejected before any runtime is
    /// created; no side effects.
    #[error("invalid request: {0}")]
    Validation(String),
    /// A scenario with this name is already running.
    #[error("scenario named '{0}' is already running")]
    DuplicateScenario(String),
    #[error("scenario '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateScenario(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self:#}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
