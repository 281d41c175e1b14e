//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A listen address did not parse as `ip:port`
    #[error("invalid listen address {value:?}: {message}")]
    ListenAddr { value: String, message: String },

    /// Neither TCP nor UDP ingest is enabled
    #[error("no listeners enabled - set listen.tcp and/or listen.udp")]
    NoListeners,

    /// A field holds an unusable value
    #[error("invalid {section}.{field}: {message}")]
    InvalidValue {
        section: &'static str,
        field: &'static str,
        message: String,
    },

    /// A cluster definition is unusable
    #[error("cluster '{name}': {message}")]
    Cluster { name: String, message: String },

    /// A routing rule is unusable at the config level
    #[error("routing rule {index}: {message}")]
    Rule { index: usize, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }

    pub(crate) fn cluster(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cluster {
            name: name.into(),
            message: message.into(),
        }
    }
}
