//! Metrics reporting configuration

use std::time::Duration;

use serde::Deserialize;

/// Metrics reporting section
///
/// ```toml
/// [metrics]
/// enabled = true
/// interval = "30s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the periodic reporter runs
    pub enabled: bool,

    /// Reporting interval
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
        }
    }
}
