use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// Hour offset from UTC applied to reading timestamps (JST deployment
    /// default).
    pub timezone_offset_hours: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            timezone_offset_hours: 9,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut cfg = ServerConfig::default();

        if let Ok(v) = env::var("HTTP_ADDR") {
            if let Ok(addr) = v.parse::<SocketAddr>() {
                cfg.http_addr = addr;
            }
        }
        if let Ok(v) = env::var("TIMEZONE_OFFSET_HOURS") {
            if let Ok(hours) = v.parse::<i32>() {
                cfg.timezone_offset_hours = hours;
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_all_interfaces_at_jst() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_addr.port(), 5000);
        assert_eq!(cfg.timezone_offset_hours, 9);
    }
}
