//! Downstream connection tuning
//!
//! These settings apply to every target host. Durations use humantime
//! strings (`"5s"`, `"250ms"`).

use std::time::Duration;

use serde::Deserialize;

/// Connection settings shared by all downstream hosts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Port used for hosts that don't carry their own
    pub target_port: u16,

    /// Deadline for one buffered write
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Deadline for establishing an outbound connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// TCP keepalive probe time on outbound connections
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,

    /// Upper bound for the reconnect backoff wait
    #[serde(with = "humantime_serde")]
    pub max_reconnect_period: Duration,

    /// Additive component of the backoff step
    #[serde(with = "humantime_serde")]
    pub reconnect_period_delta: Duration,

    /// Outbound write buffer size in bytes
    pub buf_size: usize,

    /// How often the per-host flusher pushes out buffered bytes.
    /// Zero disables the flusher.
    #[serde(with = "humantime_serde")]
    pub buf_flush_period: Duration,

    /// Close and reopen a connection that has been unused this long.
    /// Zero disables refresh.
    #[serde(with = "humantime_serde")]
    pub connection_refresh_period: Duration,

    /// Threshold for the standalone availability probe. Recognized for
    /// compatibility; the sender's own connect outcomes drive availability.
    #[serde(with = "humantime_serde")]
    pub connection_loss_threshold: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target_port: 2003,
            send_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            max_reconnect_period: Duration::from_secs(5),
            reconnect_period_delta: Duration::from_millis(10),
            buf_size: 4096,
            buf_flush_period: Duration::from_secs(2),
            connection_refresh_period: Duration::ZERO,
            connection_loss_threshold: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.target_port, 2003);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert_eq!(config.max_reconnect_period, Duration::from_secs(5));
        assert_eq!(config.reconnect_period_delta, Duration::from_millis(10));
        assert_eq!(config.buf_size, 4096);
        assert_eq!(config.connection_refresh_period, Duration::ZERO);
    }

    #[test]
    fn deserialize_durations() {
        let toml = r#"
send_timeout = "250ms"
max_reconnect_period = "1m"
buf_flush_period = "0s"
"#;
        let config: UpstreamConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.max_reconnect_period, Duration::from_secs(60));
        assert_eq!(config.buf_flush_period, Duration::ZERO);
    }
}
