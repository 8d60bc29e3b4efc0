use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// JSON body returned for every non-2xx response.
///
/// Services map their own error enums onto this envelope in one `IntoResponse`
/// impl, so status codes and body shape are decided in a single place.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(serialize_with = "crate::serde::to_rfc3339_ms")]
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Build an error response with the shared envelope.
///
/// 5xx responses are logged here; tower-http's `TraceLayer` already records
/// method/uri/status for everything else.
pub fn error_response(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody::new(kind, message);
    if status.is_server_error() {
        tracing::error!(kind, message = %body.message, "internal error");
    }
    (status, axum::Json(body)).into_response()
}
