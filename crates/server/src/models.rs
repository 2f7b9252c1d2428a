use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub data: Value,
    // Field name kept for compatibility with existing device dashboards.
    pub aws_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub updated_status: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
}
