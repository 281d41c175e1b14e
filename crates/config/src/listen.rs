//! Ingest listener configuration

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Listener configuration
///
/// Either address may be empty to disable that listener; at least one must be
/// set. `":2003"` binds all interfaces.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// TCP ingest address (`ip:port`, empty = disabled)
    pub tcp: String,

    /// UDP ingest address (`ip:port`, empty = disabled)
    pub udp: String,

    /// How long an inbound TCP connection may sit idle between reads before
    /// the server closes it
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Lines longer than this many bytes are discarded
    pub max_line_len: usize,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            tcp: "0.0.0.0:2003".into(),
            udp: String::new(),
            idle_timeout: Duration::from_secs(90),
            max_line_len: 8192,
        }
    }
}

impl ListenConfig {
    pub fn tcp_enabled(&self) -> bool {
        !self.tcp.is_empty()
    }

    pub fn udp_enabled(&self) -> bool {
        !self.udp.is_empty()
    }
}

/// Parse an `ip:port` listen option. A leading `:` means all interfaces.
pub fn parse_listen_addr(value: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    };

    candidate
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::ListenAddr {
            value: value.to_string(),
            message: e.to_string(),
        })
}
