use axum::{Json, extract::State, http::StatusCode};
use serde_json::Value;

use userhub_core::health::readiness_report;

use crate::state::AppState;

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = state.db.ping().await.is_ok();
    readiness_report(&[("database", database)])
}
