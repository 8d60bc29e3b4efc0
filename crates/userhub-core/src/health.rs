use axum::Json;
use axum::http::StatusCode;
use serde_json::{Map, Value, json};

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Render a readiness report from named dependency checks.
///
/// 200 when every check passed, 503 otherwise. The body lists each check as
/// `"up"` or `"down"` so probes and humans see which dependency failed.
pub fn readiness_report(checks: &[(&str, bool)]) -> (StatusCode, Json<Value>) {
    let ready = checks.iter().all(|(_, ok)| *ok);
    let components: Map<String, Value> = checks
        .iter()
        .map(|(name, ok)| ((*name).to_owned(), json!(if *ok { "up" } else { "down" })))
        .collect();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "ready": ready, "components": components })))
}
