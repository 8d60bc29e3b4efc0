use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use userhub_core::error::error_response;

/// Users service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum UsersServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("user with this id not found")]
    UserNotFoundById,
    #[error("user with this email not found")]
    UserNotFoundByEmail,
    #[error("user with this email already exists")]
    UserAlreadyExists,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl UsersServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::UserNotFoundById | Self::UserNotFoundByEmail => "USER_NOT_FOUND",
            Self::UserAlreadyExists => "USER_ALREADY_EXISTS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UserNotFoundById | Self::UserNotFoundByEmail => StatusCode::NOT_FOUND,
            Self::UserAlreadyExists => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UsersServiceError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, "users service internal error");
        }
        error_response(self.status(), self.kind(), self.to_string())
    }
}

/// Failures inside the outbox relay. Never surfaced over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Broker rejected or did not acknowledge the message; the row is retried.
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("outbox storage error")]
    Storage(#[from] UsersServiceError),
}
