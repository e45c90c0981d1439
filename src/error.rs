use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::{repository::SessionError, session::InvalidTransition};

/// Errors surfaced by the session control-plane services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller supplied an unusable payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The requested transition is not legal from the current status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// No such room or session.
    #[error("not found: {0}")]
    NotFound(String),
    /// The operation collides with an invariant the repository enforces.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::RoomBusy(_) => ServiceError::Conflict(err.to_string()),
            SessionError::NotFound(_) => ServiceError::NotFound(err.to_string()),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Errors rendered as HTTP responses by the control API.
#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload or parameters were rejected.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The request lost against a state or uniqueness invariant.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Something unexpected broke on our side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
