//! Clusters file schema
//!
//! ```toml
//! [[cluster]]
//! name = "main"
//! policy = "jump"
//! hosts = ["store-1", "store-2:2004", "store-3"]
//!
//! [[cluster]]
//! name = "spill"
//! policy = "lb"
//! hosts = ["spill-1", "spill-2"]
//! lb_fallback_to_all = false
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Parsed clusters file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClustersFile {
    pub cluster: Vec<ClusterConfig>,
}

/// Routing policy name
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyConfig {
    /// Consistent-hash the record path to exactly one host
    Jump,
    /// Round-robin over currently available hosts
    Lb,
    /// Every host gets a copy
    Broadcast,
}

/// One cluster definition
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    pub name: String,

    pub policy: PolicyConfig,

    /// Host entries: `host` (uses `upstream.target_port`) or `host:port`
    pub hosts: Vec<String>,

    /// For `lb` only: when no host is available, fall back to round-robin
    /// over the full list instead of dropping the record
    #[serde(default = "default_true")]
    pub lb_fallback_to_all: bool,
}

fn default_true() -> bool {
    true
}

impl ClustersFile {
    /// Load and structurally validate a clusters file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let clusters: ClustersFile = toml::from_str(s).map_err(ConfigError::Parse)?;
        clusters.validate()?;
        Ok(clusters)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for c in &self.cluster {
            if c.name.is_empty() {
                return Err(ConfigError::cluster("", "empty cluster name"));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::cluster(&c.name, "duplicate cluster name"));
            }
            if c.hosts.is_empty() {
                return Err(ConfigError::cluster(&c.name, "no hosts listed"));
            }
            for entry in &c.hosts {
                split_host_port(entry)
                    .map_err(|m| ConfigError::cluster(&c.name, format!("host {entry:?}: {m}")))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ClustersFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split a host entry into name and optional port override.
pub fn split_host_port(entry: &str) -> std::result::Result<(&str, Option<u16>), String> {
    if entry.is_empty() {
        return Err("empty host".into());
    }
    match entry.rsplit_once(':') {
        Some((name, port)) => {
            if name.is_empty() {
                return Err("empty host name".into());
            }
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port {port:?}"))?;
            Ok((name, Some(port)))
        }
        None => Ok((entry, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clusters() {
        let toml = r#"
[[cluster]]
name = "main"
policy = "jump"
hosts = ["a", "b:2004"]

[[cluster]]
name = "mirror"
policy = "broadcast"
hosts = ["c"]
"#;
        let clusters = ClustersFile::from_str(toml).unwrap();
        assert_eq!(clusters.cluster.len(), 2);
        assert_eq!(clusters.cluster[0].policy, PolicyConfig::Jump);
        assert!(clusters.cluster[0].lb_fallback_to_all);
        assert_eq!(clusters.cluster[1].policy, PolicyConfig::Broadcast);
    }

    #[test]
    fn lb_fallback_flag() {
        let toml = r#"
[[cluster]]
name = "spill"
policy = "lb"
hosts = ["a"]
lb_fallback_to_all = false
"#;
        let clusters = ClustersFile::from_str(toml).unwrap();
        assert!(!clusters.cluster[0].lb_fallback_to_all);
    }

    #[test]
    fn empty_hosts_rejected() {
        let toml = r#"
[[cluster]]
name = "main"
policy = "jump"
hosts = []
"#;
        assert!(ClustersFile::from_str(toml).is_err());
    }

    #[test]
    fn duplicate_name_rejected() {
        let toml = r#"
[[cluster]]
name = "main"
policy = "jump"
hosts = ["a"]

[[cluster]]
name = "main"
policy = "lb"
hosts = ["b"]
"#;
        assert!(ClustersFile::from_str(toml).is_err());
    }

    #[test]
    fn unknown_policy_rejected() {
        let toml = r#"
[[cluster]]
name = "main"
policy = "random"
hosts = ["a"]
"#;
        assert!(ClustersFile::from_str(toml).is_err());
    }

    #[test]
    fn host_entry_split() {
        assert_eq!(split_host_port("store-1").unwrap(), ("store-1", None));
        assert_eq!(
            split_host_port("store-1:2004").unwrap(),
            ("store-1", Some(2004))
        );
        assert!(split_host_port("store-1:banana").is_err());
        assert!(split_host_port(":2004").is_err());
        assert!(split_host_port("").is_err());
    }
}
