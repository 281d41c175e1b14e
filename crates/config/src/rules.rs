//! Rules file schema
//!
//! The rules file holds two ordered lists: rewrites, applied first, and
//! routing rules. Order in the file is evaluation order; there is no
//! priority field.
//!
//! ```toml
//! [[rewrite]]
//! from = '^old\.'
//! to = "new."
//! stop = true
//!
//! [[route]]
//! match = '^new\.'
//! clusters = ["main"]
//! continue = false
//! ```

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Parsed rules file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    /// Rewrite rules in declaration order
    pub rewrite: Vec<RewriteRuleConfig>,

    /// Routing rules in declaration order
    pub route: Vec<RouteRuleConfig>,
}

/// One rewrite rule
#[derive(Debug, Clone, Deserialize)]
pub struct RewriteRuleConfig {
    /// Regex matched against the record path
    pub from: String,

    /// Replacement, may reference capture groups (`$1`, `${name}`)
    pub to: String,

    /// Stop the rewrite phase after this rule matches
    #[serde(default)]
    pub stop: bool,
}

/// One routing rule
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRuleConfig {
    /// Regex matched against the record path
    #[serde(rename = "match")]
    pub pattern: String,

    /// Destination cluster names
    pub clusters: Vec<String>,

    /// Keep evaluating later rules after this one matches
    #[serde(rename = "continue", default)]
    pub continue_eval: bool,
}

impl RulesFile {
    /// Load and structurally validate a rules file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let rules: RulesFile = toml::from_str(s).map_err(ConfigError::Parse)?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        for (index, rule) in self.route.iter().enumerate() {
            if rule.clusters.is_empty() {
                return Err(ConfigError::Rule {
                    index,
                    message: "no clusters listed".into(),
                });
            }
        }
        Ok(())
    }
}

impl FromStr for RulesFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
