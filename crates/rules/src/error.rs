//! Rule compilation errors

use thiserror::Error;

/// Errors from compiling the rules file against the cluster table
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule pattern failed to compile
    #[error("invalid regex {pattern:?} in {kind} rule {index}: {source}")]
    Regex {
        kind: &'static str,
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A routing rule references a cluster that is not defined
    #[error("routing rule {index} references unknown cluster '{name}'")]
    UnknownCluster { index: usize, name: String },
}
