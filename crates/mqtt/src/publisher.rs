use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, Incoming, Outgoing, QoS};
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::certs::CertificateBundle;
use crate::config::MqttConfig;
use crate::error::MqttError;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// One-shot publisher for the sensor topic.
///
/// Each `send` opens a fresh mutual-TLS connection, publishes, waits for
/// the broker acknowledgment and tears the connection down. Reconnecting
/// per publish keeps no keep-alive or retry state on the ingestion path;
/// telemetry volume is low enough that the extra handshake is acceptable.
#[derive(Clone)]
pub struct Publisher {
    config: MqttConfig,
    certs: CertificateBundle,
}

impl Publisher {
    pub fn new(config: MqttConfig, certs: CertificateBundle) -> Self {
        Self { config, certs }
    }

    /// Serializes `payload` and publishes it to the sensor topic.
    ///
    /// Runs at most `publish_attempts` rounds, each bounded by
    /// `publish_timeout`. All failure modes come back as `MqttError`;
    /// the caller decides how to surface them.
    pub async fn send(&self, payload: &Value) -> Result<(), MqttError> {
        let body = serde_json::to_string(payload)?;
        let attempts = self.config.publish_attempts.max(1);
        let mut last_err = MqttError::AckTimeout(self.config.publish_timeout);
        for attempt in 1..=attempts {
            match timeout(self.config.publish_timeout, self.publish_once(&body, attempt)).await {
                Ok(Ok(())) => {
                    debug!(topic = %self.config.sensor_topic, attempt, "publish acknowledged");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(error = %e, attempt, "publish attempt failed");
                    last_err = e;
                }
                Err(_) => {
                    warn!(timeout = ?self.config.publish_timeout, attempt, "publish attempt timed out");
                    last_err = MqttError::AckTimeout(self.config.publish_timeout);
                }
            }
            if attempt < attempts {
                sleep(RETRY_DELAY).await;
            }
        }
        Err(last_err)
    }

    /// One connect/publish/ack round trip. The client and event loop are
    /// owned by this call, so the connection cannot outlive it on any
    /// exit path; the ack paths also disconnect explicitly.
    async fn publish_once(&self, body: &str, attempt: u32) -> Result<(), MqttError> {
        let client_id = format!("{}-pub-{}", self.config.client_id, attempt);
        let opts = self.config.broker_options(&client_id, &self.certs);
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(MqttError::Rejected(ack.code));
                    }
                    client
                        .publish(&self.config.sensor_topic, self.config.qos, false, body)
                        .await?;
                }
                Ok(Event::Outgoing(Outgoing::Publish(_))) if self.config.qos == QoS::AtMostOnce => {
                    // Nothing to wait for at QoS 0.
                    let _ = client.disconnect().await;
                    return Ok(());
                }
                Ok(Event::Incoming(Incoming::PubAck(_)))
                | Ok(Event::Incoming(Incoming::PubComp(_))) => {
                    let _ = client.disconnect().await;
                    return Ok(());
                }
                Ok(other) => debug!(?other, "publish connection event"),
                Err(e) => return Err(MqttError::Connection(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dummy_certs(cfg: &mut MqttConfig) -> Vec<NamedTempFile> {
        let files: Vec<NamedTempFile> = (0..3)
            .map(|_| {
                let mut f = NamedTempFile::new().unwrap();
                writeln!(f, "-----BEGIN CERTIFICATE-----").unwrap();
                writeln!(f, "dGVzdA==").unwrap();
                writeln!(f, "-----END CERTIFICATE-----").unwrap();
                f
            })
            .collect();
        cfg.ca_path = files[0].path().to_path_buf();
        cfg.cert_path = files[1].path().to_path_buf();
        cfg.key_path = files[2].path().to_path_buf();
        files
    }

    #[tokio::test]
    async fn unreachable_broker_is_an_error_not_a_panic() {
        let mut cfg = MqttConfig {
            endpoint: "127.0.0.1".to_string(),
            port: 1,
            publish_timeout: Duration::from_secs(2),
            publish_attempts: 1,
            ..MqttConfig::default()
        };
        let _files = dummy_certs(&mut cfg);
        let certs = CertificateBundle::load(&cfg).unwrap();
        let publisher = Publisher::new(cfg, certs);
        let result = publisher.send(&json!({"temperature": 23.5})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let mut cfg = MqttConfig {
            endpoint: "127.0.0.1".to_string(),
            port: 1,
            publish_timeout: Duration::from_secs(1),
            publish_attempts: 2,
            ..MqttConfig::default()
        };
        let _files = dummy_certs(&mut cfg);
        let certs = CertificateBundle::load(&cfg).unwrap();
        let publisher = Publisher::new(cfg, certs);
        let started = std::time::Instant::now();
        assert!(publisher.send(&json!({"humidity": 41})).await.is_err());
        // Two attempts plus one retry delay; well under a runaway loop.
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
