// Topic names and payload keys shared by the gateway and its devices.
// Deployments override the topics via SENSOR_TOPIC / COMMAND_TOPIC.

/// Telemetry readings published by the gateway.
pub const DEFAULT_SENSOR_TOPIC: &str = "iot/gateway/sensor";

/// Control commands the gateway subscribes to.
pub const DEFAULT_COMMAND_TOPIC: &str = "cmd/gateway/control";

/// Key carrying the device status in readings and commands.
pub const STATUS_KEY: &str = "status";
