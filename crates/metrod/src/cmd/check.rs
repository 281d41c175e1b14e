//! Check command - validate configuration without starting
//!
//! Loads the main config, the rules file and the clusters file, compiles
//! every regex and resolves every cluster reference. Exits non-zero on the
//! first problem.

use std::path::PathBuf;

use anyhow::{Context, Result};

use metro_config::{ClustersFile, Config, RulesFile};
use metro_rules::Engine;

pub fn run(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let rules = RulesFile::from_file(&config.rules_file)
        .with_context(|| format!("failed to load rules file {}", config.rules_file))?;
    let clusters = ClustersFile::from_file(&config.clusters_file)
        .with_context(|| format!("failed to load clusters file {}", config.clusters_file))?;

    let cluster_names: Vec<&str> = clusters.cluster.iter().map(|c| c.name.as_str()).collect();
    Engine::validate(&rules, &cluster_names)
        .context("rules do not compile against the cluster table")?;

    let host_count: usize = clusters.cluster.iter().map(|c| c.hosts.len()).sum();
    println!(
        "config ok: {} rewrite rule(s), {} routing rule(s), {} cluster(s), {} host(s)",
        rules.rewrite.len(),
        rules.route.len(),
        clusters.cluster.len(),
        host_count,
    );
    Ok(())
}
