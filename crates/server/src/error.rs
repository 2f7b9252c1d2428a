use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use fieldgate_mqtt::MqttError;

/// Everything a handler can fail with, mapped to exactly one HTTP shape.
pub enum ApiError {
    /// Missing, malformed or non-object request body.
    InvalidRequest(&'static str),
    /// A required key was absent from an otherwise valid body.
    MissingField(&'static str),
    /// The broker round trip failed. The timestamped reading rides along
    /// so the caller keeps what was ingested.
    Transport { error: MqttError, data: Value },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(msg) | ApiError::MissingField(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Transport { error, data } => {
                error!(error = %error, "failed to forward reading to broker");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "Failed to forward data to broker",
                        "data": data,
                        "aws_sent": false,
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Last-resort mapping for anything unanticipated; detail goes to the
/// logs, the caller gets a generic 500.
pub fn internal_error_response(panic: Box<dyn std::any::Any + Send>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
