//! metro configuration
//!
//! TOML-based configuration with sensible defaults. A minimal config only
//! needs the parts that differ from the defaults; an empty file is valid and
//! listens for TCP on port 2003.
//!
//! Three files make up a deployment:
//!
//! - the main config (this crate's [`Config`]): listeners, queue sizes,
//!   worker count, upstream connection tuning, logging, metrics reporting;
//! - the rules file ([`RulesFile`]): ordered rewrite and routing rules;
//! - the clusters file ([`ClustersFile`]): named downstream clusters with a
//!   routing policy and host list.
//!
//! # Example
//!
//! ```toml
//! [listen]
//! tcp = "0.0.0.0:2003"
//! udp = ""
//!
//! [pipeline]
//! main_queue_size = 50000
//!
//! [upstream]
//! target_port = 2003
//! send_timeout = "5s"
//! ```

mod clusters;
mod error;
mod listen;
mod logging;
mod metrics;
mod pipeline;
mod rules;
mod upstream;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use clusters::{split_host_port, ClusterConfig, ClustersFile, PolicyConfig};
pub use error::{ConfigError, Result};
pub use listen::{parse_listen_addr, ListenConfig};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metrics::MetricsConfig;
pub use pipeline::PipelineConfig;
pub use rules::{RewriteRuleConfig, RouteRuleConfig, RulesFile};
pub use upstream::UpstreamConfig;

/// Main daemon configuration
///
/// All sections are optional with defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ingest listeners
    pub listen: ListenConfig,

    /// Main queue and worker pool sizing
    pub pipeline: PipelineConfig,

    /// Downstream connection tuning, applied to every host
    pub upstream: UpstreamConfig,

    /// Logging configuration
    pub log: LogConfig,

    /// Metrics reporting configuration
    pub metrics: MetricsConfig,

    /// Path to the rules file
    pub rules_file: String,

    /// Path to the clusters file
    pub clusters_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            pipeline: PipelineConfig::default(),
            upstream: UpstreamConfig::default(),
            log: LogConfig::default(),
            metrics: MetricsConfig::default(),
            rules_file: "rules.toml".into(),
            clusters_file: "clusters.toml".into(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate internal consistency (addresses parse, sizes positive,
    /// at least one listener enabled).
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
