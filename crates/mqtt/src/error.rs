use std::path::PathBuf;
use std::time::Duration;

use rumqttc::ConnectReturnCode;
use thiserror::Error;

/// Broker-side failures. Everything here is caught at the boundary that
/// triggered it; none of these terminate a task.
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("certificate file unreadable: {path}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("broker rejected connection: {0:?}")]
    Rejected(ConnectReturnCode),

    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("broker connection failed: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("payload not serializable: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("publish not acknowledged within {0:?}")]
    AckTimeout(Duration),
}
