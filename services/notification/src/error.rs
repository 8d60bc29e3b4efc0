use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use userhub_core::error::error_response;

/// Notification service error variants.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Mail could not be sent; the triggering message is redelivered.
    #[error("side effect failed: {0}")]
    SideEffect(String),
    #[error("storage error")]
    Storage(anyhow::Error),
    #[error("dead letter publish failed: {0}")]
    DeadLetter(String),
    #[error("{0}")]
    Validation(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl NotificationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SideEffect(_) => "SIDE_EFFECT_FAILED",
            Self::Storage(_) => "STORAGE",
            Self::DeadLetter(_) => "DEAD_LETTER_FAILED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::SideEffect(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::DeadLetter(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(e) | Self::Internal(e) => {
                tracing::error!(error = ?e, kind = self.kind(), "notification internal error");
            }
            Self::SideEffect(e) => tracing::warn!(error = %e, "manual send failed"),
            _ => {}
        }
        let message = match &self {
            Self::Storage(_) | Self::Internal(_) => "internal error".to_owned(),
            other => other.to_string(),
        };
        error_response(self.status(), self.kind(), message)
    }
}
