//! Main config validation
//!
//! Checks the parts that must hold before the daemon can start:
//! - at least one listener enabled, addresses parse as `ip:port`
//! - queue sizes and buffer sizes are positive
//!
//! Regex compilation and cluster-reference resolution happen when the rule
//! engine is built, against the rules and clusters files.

use crate::error::{ConfigError, Result};
use crate::listen::parse_listen_addr;
use crate::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    validate_listen(config)?;
    validate_sizes(config)?;
    Ok(())
}

fn validate_listen(config: &Config) -> Result<()> {
    let listen = &config.listen;

    if !listen.tcp_enabled() && !listen.udp_enabled() {
        return Err(ConfigError::NoListeners);
    }
    if listen.tcp_enabled() {
        parse_listen_addr(&listen.tcp)?;
    }
    if listen.udp_enabled() {
        parse_listen_addr(&listen.udp)?;
    }
    if listen.max_line_len == 0 {
        return Err(ConfigError::invalid("listen", "max_line_len", "must be > 0"));
    }
    Ok(())
}

fn validate_sizes(config: &Config) -> Result<()> {
    if config.pipeline.main_queue_size == 0 {
        return Err(ConfigError::invalid(
            "pipeline",
            "main_queue_size",
            "must be > 0",
        ));
    }
    if config.pipeline.host_queue_size == 0 {
        return Err(ConfigError::invalid(
            "pipeline",
            "host_queue_size",
            "must be > 0",
        ));
    }
    if config.upstream.buf_size == 0 {
        return Err(ConfigError::invalid("upstream", "buf_size", "must be > 0"));
    }
    Ok(())
}
