use std::env;
use std::path::PathBuf;
use std::time::Duration;

use hostname::get as get_hostname;
use rumqttc::{MqttOptions, QoS, Transport};

use fieldgate_core::topics::{DEFAULT_COMMAND_TOPIC, DEFAULT_SENSOR_TOPIC};

use crate::certs::CertificateBundle;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub endpoint: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u16,
    pub qos: QoS,
    pub sensor_topic: String,
    pub command_topic: String,
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Bounds one connect/publish/ack round trip.
    pub publish_timeout: Duration,
    /// 1 keeps the original single-attempt, fail-fast behavior.
    pub publish_attempts: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost".to_string(),
            port: 8883,
            client_id: default_client_id(),
            keep_alive_secs: 60,
            qos: QoS::AtLeastOnce,
            sensor_topic: DEFAULT_SENSOR_TOPIC.to_string(),
            command_topic: DEFAULT_COMMAND_TOPIC.to_string(),
            ca_path: PathBuf::from("certs/root-ca.pem"),
            cert_path: PathBuf::from("certs/device-cert.pem"),
            key_path: PathBuf::from("certs/device-key.pem"),
            publish_timeout: Duration::from_secs(10),
            publish_attempts: 1,
        }
    }
}

impl MqttConfig {
    pub fn from_env() -> Self {
        let mut cfg = MqttConfig::default();

        if let Ok(v) = env::var("MQTT_ENDPOINT") {
            if !v.is_empty() {
                cfg.endpoint = v;
            }
        }
        if let Ok(v) = env::var("MQTT_PORT") {
            if let Ok(p) = v.parse::<u16>() {
                cfg.port = p;
            }
        }
        if let Ok(v) = env::var("MQTT_CLIENT_ID") {
            if !v.is_empty() {
                cfg.client_id = v;
            }
        }
        if let Ok(v) = env::var("MQTT_KEEP_ALIVE_SECS") {
            if let Ok(s) = v.parse::<u16>() {
                cfg.keep_alive_secs = s;
            }
        }
        if let Ok(v) = env::var("MQTT_QOS") {
            if let Some(q) = v.parse::<u8>().ok().and_then(parse_qos) {
                cfg.qos = q;
            }
        }
        if let Ok(v) = env::var("SENSOR_TOPIC") {
            if !v.is_empty() {
                cfg.sensor_topic = v;
            }
        }
        if let Ok(v) = env::var("COMMAND_TOPIC") {
            if !v.is_empty() {
                cfg.command_topic = v;
            }
        }
        if let Ok(v) = env::var("MQTT_CA_PATH") {
            if !v.is_empty() {
                cfg.ca_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("MQTT_CERT_PATH") {
            if !v.is_empty() {
                cfg.cert_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("MQTT_KEY_PATH") {
            if !v.is_empty() {
                cfg.key_path = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("MQTT_PUBLISH_TIMEOUT_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.publish_timeout = Duration::from_secs(s);
            }
        }
        if let Ok(v) = env::var("MQTT_PUBLISH_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.publish_attempts = n.max(1);
            }
        }

        cfg
    }

    /// Options for one mutually-authenticated connection to the broker.
    pub(crate) fn broker_options(&self, client_id: &str, certs: &CertificateBundle) -> MqttOptions {
        let mut opts = MqttOptions::new(client_id, &self.endpoint, self.port);
        opts.set_keep_alive(Duration::from_secs(self.keep_alive_secs as u64));
        opts.set_transport(Transport::Tls(certs.tls_configuration()));
        opts
    }
}

fn parse_qos(level: u8) -> Option<QoS> {
    match level {
        0 => Some(QoS::AtMostOnce),
        1 => Some(QoS::AtLeastOnce),
        2 => Some(QoS::ExactlyOnce),
        _ => None,
    }
}

fn default_client_id() -> String {
    let host = get_hostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let pid = std::process::id();
    format!("fieldgate-{}-{}", host, pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gateway_deployment() {
        let cfg = MqttConfig::default();
        assert_eq!(cfg.port, 8883);
        assert_eq!(cfg.qos, QoS::AtLeastOnce);
        assert_eq!(cfg.publish_attempts, 1);
        assert_eq!(cfg.sensor_topic, DEFAULT_SENSOR_TOPIC);
        assert_eq!(cfg.command_topic, DEFAULT_COMMAND_TOPIC);
        assert!(cfg.client_id.starts_with("fieldgate-"));
    }

    #[test]
    fn qos_levels_parse() {
        assert_eq!(parse_qos(0), Some(QoS::AtMostOnce));
        assert_eq!(parse_qos(1), Some(QoS::AtLeastOnce));
        assert_eq!(parse_qos(2), Some(QoS::ExactlyOnce));
        assert_eq!(parse_qos(3), None);
    }
}
