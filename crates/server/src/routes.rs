use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, warn};

use fieldgate_core::{status_text, Reading, ReadingError, STATUS_KEY};
use fieldgate_mqtt::{MqttError, Publisher};

use crate::error::{internal_error_response, ApiError};
use crate::models::{HealthResponse, IngestResponse, StatusResponse, UpdateStatusResponse};
use crate::status::StatusStore;

/// Outbound side of the bridge as the handlers see it. `Publisher` is the
/// production implementation; tests substitute a recording stub.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn forward(&self, reading: &Value) -> Result<(), MqttError>;
}

#[async_trait]
impl ReadingSink for Publisher {
    async fn forward(&self, reading: &Value) -> Result<(), MqttError> {
        self.send(reading).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub status: StatusStore,
    pub sink: Arc<dyn ReadingSink>,
    pub timezone_offset_hours: i32,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", post(ingest_reading).fallback(method_not_allowed))
        .route("/status", get(get_status).fallback(method_not_allowed))
        .route("/update_status", post(update_status).fallback(method_not_allowed))
        .route("/health", get(health).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(internal_error_response))
        .with_state(state)
}

/// `POST /data`: receives one telemetry reading from a device.
///
/// The status write happens before the publish attempt on purpose: a
/// status carried by the reading should be visible locally even when the
/// cloud round trip fails.
async fn ingest_reading(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(value) = body.map_err(|e| {
        warn!(error = %e, "rejected ingest body");
        ApiError::InvalidRequest("Invalid JSON format")
    })?;
    let mut reading = Reading::from_value(value).map_err(|e| {
        warn!(error = %e, "rejected ingest payload");
        match e {
            ReadingError::Empty => ApiError::InvalidRequest("No data provided"),
            ReadingError::NotAnObject => ApiError::InvalidRequest("Invalid data format"),
        }
    })?;

    reading.stamp(state.timezone_offset_hours);
    if let Some(status) = reading.status() {
        state.status.set(status_text(status));
    }

    let data = reading.into_value();
    info!(%data, "reading ingested");
    match state.sink.forward(&data).await {
        Ok(()) => Ok(Json(IngestResponse {
            status: "received",
            data,
            aws_sent: true,
        })),
        Err(error) => Err(ApiError::Transport { error, data }),
    }
}

/// `GET /status`: pure read of the status store.
async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.status.get(),
        timestamp: server_time(),
    })
}

/// `POST /update_status`: applies a status command from an external
/// caller. The broker path writes to the store directly and does not go
/// through here.
async fn update_status(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateStatusResponse>, ApiError> {
    let Json(value) = body.map_err(|e| {
        warn!(error = %e, "rejected status update body");
        ApiError::InvalidRequest("Invalid JSON format")
    })?;
    let command = match value {
        Value::Object(map) => map,
        _ => return Err(ApiError::InvalidRequest("Invalid data format")),
    };
    let Some(status) = command.get(STATUS_KEY) else {
        warn!("status update without status field");
        return Err(ApiError::MissingField("Missing status field"));
    };

    let status = status_text(status);
    state.status.set(status.clone());
    Ok(Json(UpdateStatusResponse {
        updated_status: status,
        timestamp: server_time(),
    }))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        timestamp: server_time(),
    })
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

fn server_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
