pub mod certs;
pub mod config;
pub mod error;
pub mod publisher;
pub mod subscriber;

pub use certs::CertificateBundle;
pub use config::MqttConfig;
pub use error::MqttError;
pub use publisher::Publisher;
pub use subscriber::{dispatch_command, CommandHandler, ConnectionState, Subscriber};
