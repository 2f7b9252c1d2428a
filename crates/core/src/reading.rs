use chrono::{FixedOffset, Offset, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::topics::STATUS_KEY;

/// Field added to every accepted reading before it leaves the gateway.
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Error, PartialEq)]
pub enum ReadingError {
    #[error("no data provided")]
    Empty,
    #[error("reading must be a JSON object")]
    NotAnObject,
}

/// A telemetry payload ingested from a device.
///
/// Open-ended key/value mapping; the only structural requirement is that
/// it is a non-empty JSON object. Lives for a single ingestion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading(Map<String, Value>);

impl Reading {
    pub fn from_value(value: Value) -> Result<Self, ReadingError> {
        match value {
            Value::Object(map) if !map.is_empty() => Ok(Self(map)),
            Value::Object(_) | Value::Null => Err(ReadingError::Empty),
            _ => Err(ReadingError::NotAnObject),
        }
    }

    /// Stamps the reading with the gateway-local time, replacing any
    /// timestamp the device sent itself.
    pub fn stamp(&mut self, offset_hours: i32) {
        self.0.insert(
            TIMESTAMP_KEY.to_string(),
            Value::String(local_timestamp(offset_hours)),
        );
    }

    pub fn status(&self) -> Option<&Value> {
        self.0.get(STATUS_KEY)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// ISO-8601 timestamp at a fixed offset from UTC. The default deployment
/// runs at +9 (JST); the offset is configuration, not a system timezone.
pub fn local_timestamp(offset_hours: i32) -> String {
    let secs = offset_hours.clamp(-23, 23) * 3600;
    let offset = FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix());
    Utc::now()
        .with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Status values are opaque strings. Devices occasionally send numbers or
/// other scalars in the `status` slot; those keep their JSON rendering.
pub fn status_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    #[test]
    fn accepts_non_empty_object() {
        let reading = Reading::from_value(json!({"temperature": 23.5})).unwrap();
        assert_eq!(reading.status(), None);
    }

    #[test]
    fn rejects_empty_object_and_null() {
        assert_eq!(Reading::from_value(json!({})), Err(ReadingError::Empty));
        assert_eq!(Reading::from_value(Value::Null), Err(ReadingError::Empty));
    }

    #[test]
    fn rejects_scalars_and_arrays() {
        assert_eq!(Reading::from_value(json!(42)), Err(ReadingError::NotAnObject));
        assert_eq!(
            Reading::from_value(json!([{"temperature": 1}])),
            Err(ReadingError::NotAnObject)
        );
    }

    #[test]
    fn stamp_adds_timestamp_at_configured_offset() {
        let mut reading = Reading::from_value(json!({"humidity": 41})).unwrap();
        reading.stamp(9);
        let value = reading.into_value();
        let ts = value[TIMESTAMP_KEY].as_str().unwrap();
        let parsed = DateTime::parse_from_rfc3339(ts).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn stamp_replaces_device_supplied_timestamp() {
        let mut reading =
            Reading::from_value(json!({"temperature": 1, "timestamp": "bogus"})).unwrap();
        reading.stamp(0);
        let value = reading.into_value();
        assert_ne!(value[TIMESTAMP_KEY], json!("bogus"));
        DateTime::parse_from_rfc3339(value[TIMESTAMP_KEY].as_str().unwrap()).unwrap();
    }

    #[test]
    fn status_text_keeps_strings_and_renders_scalars() {
        assert_eq!(status_text(&json!("WATERING")), "WATERING");
        assert_eq!(status_text(&json!(3)), "3");
    }

    #[test]
    fn serialization_preserves_non_ascii() {
        let reading = Reading::from_value(json!({"note": "温度センサー"})).unwrap();
        let body = serde_json::to_string(&reading.into_value()).unwrap();
        assert!(body.contains("温度センサー"));
    }
}
