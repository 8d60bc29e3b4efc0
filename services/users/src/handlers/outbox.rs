use axum::{Json, extract::State};
use chrono::Utc;
use serde::Serialize;

use crate::error::UsersServiceError;
use crate::state::AppState;
use crate::usecase::outbox::GetOutboxStatsUseCase;

#[derive(Debug, Serialize)]
pub struct OutboxStatsResponse {
    pub pending: i64,
    pub published: i64,
    pub failed: i64,
    /// Age of the oldest PENDING row; `null` when nothing is pending.
    pub oldest_pending_age_secs: Option<i64>,
    pub max_pending_attempts: i32,
}

// ── GET /outbox/stats ────────────────────────────────────────────────────────

pub async fn get_outbox_stats(
    State(state): State<AppState>,
) -> Result<Json<OutboxStatsResponse>, UsersServiceError> {
    let usecase = GetOutboxStatsUseCase {
        outbox: state.outbox_repo(),
    };
    let stats = usecase.execute().await?;
    let now = Utc::now();
    Ok(Json(OutboxStatsResponse {
        pending: stats.pending,
        published: stats.published,
        failed: stats.failed,
        oldest_pending_age_secs: stats
            .oldest_pending_at
            .map(|at| (now - at).num_seconds().max(0)),
        max_pending_attempts: stats.max_pending_attempts,
    }))
}
