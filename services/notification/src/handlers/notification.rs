use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

use crate::error::NotificationError;
use crate::state::AppState;
use crate::usecase::notification::{SendNotificationInput, SendNotificationUseCase};

// ── POST /notification/send ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

pub async fn send_notification(
    State(state): State<AppState>,
    payload: Result<Json<SendNotificationRequest>, JsonRejection>,
) -> Result<StatusCode, NotificationError> {
    let Json(body) = payload.map_err(|e| NotificationError::Validation(e.body_text()))?;
    let usecase = SendNotificationUseCase {
        mailer: state.mailer.clone(),
    };
    usecase
        .execute(SendNotificationInput {
            email: body.email,
            subject: body.subject,
            message: body.message,
        })
        .await?;
    Ok(StatusCode::OK)
}
