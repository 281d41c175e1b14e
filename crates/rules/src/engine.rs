//! Compiled rule engine

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use metro_config::RulesFile;
use metro_record::Record;
use metro_target::Cluster;

use crate::error::RuleError;

struct RewriteRule {
    re: Regex,
    to: String,
    stop: bool,
}

struct RouteRule {
    re: Regex,
    clusters: Vec<Arc<Cluster>>,
    continue_eval: bool,
}

/// Immutable, compiled rule tables
///
/// Holds shared references to the clusters it routes to. Build once at
/// startup with [`Engine::compile`]; share behind an `Arc` across workers.
pub struct Engine {
    rewrites: Vec<RewriteRule>,
    routes: Vec<RouteRule>,
}

impl Engine {
    /// Compile the rules file, resolving cluster references.
    pub fn compile(
        rules: &RulesFile,
        clusters: &HashMap<String, Arc<Cluster>>,
    ) -> Result<Engine, RuleError> {
        let mut rewrites = Vec::with_capacity(rules.rewrite.len());
        for (index, rule) in rules.rewrite.iter().enumerate() {
            let re = Regex::new(&rule.from).map_err(|source| RuleError::Regex {
                kind: "rewrite",
                index,
                pattern: rule.from.clone(),
                source,
            })?;
            rewrites.push(RewriteRule {
                re,
                to: rule.to.clone(),
                stop: rule.stop,
            });
        }

        let mut routes = Vec::with_capacity(rules.route.len());
        for (index, rule) in rules.route.iter().enumerate() {
            let re = Regex::new(&rule.pattern).map_err(|source| RuleError::Regex {
                kind: "routing",
                index,
                pattern: rule.pattern.clone(),
                source,
            })?;
            let mut targets = Vec::with_capacity(rule.clusters.len());
            for name in &rule.clusters {
                let cluster = clusters.get(name).ok_or_else(|| RuleError::UnknownCluster {
                    index,
                    name: name.clone(),
                })?;
                targets.push(Arc::clone(cluster));
            }
            routes.push(RouteRule {
                re,
                clusters: targets,
                continue_eval: rule.continue_eval,
            });
        }

        Ok(Engine { rewrites, routes })
    }

    /// Check a rules file without building anything: regexes compile, every
    /// referenced cluster name is known.
    pub fn validate(rules: &RulesFile, cluster_names: &[&str]) -> Result<(), RuleError> {
        for (index, rule) in rules.rewrite.iter().enumerate() {
            Regex::new(&rule.from).map_err(|source| RuleError::Regex {
                kind: "rewrite",
                index,
                pattern: rule.from.clone(),
                source,
            })?;
        }
        for (index, rule) in rules.route.iter().enumerate() {
            Regex::new(&rule.pattern).map_err(|source| RuleError::Regex {
                kind: "routing",
                index,
                pattern: rule.pattern.clone(),
                source,
            })?;
            for name in &rule.clusters {
                if !cluster_names.contains(&name.as_str()) {
                    return Err(RuleError::UnknownCluster {
                        index,
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rewrite, then route. Returns whether any routing rule matched; an
    /// unmatched record is dropped by the caller.
    pub fn process(&self, mut rec: Record) -> bool {
        for rule in &self.rewrites {
            let rewritten = match rule.re.replace(&rec.path, rule.to.as_str()) {
                Cow::Owned(p) => Some(p),
                Cow::Borrowed(_) => None,
            };
            if let Some(path) = rewritten {
                rec.path = path;
                if rule.stop {
                    break;
                }
            }
        }

        let mut matched = false;
        for rule in &self.routes {
            if rule.re.is_match(&rec.path) {
                matched = true;
                for cluster in &rule.clusters {
                    cluster.dispatch(&rec);
                }
                if !rule.continue_eval {
                    break;
                }
            }
        }
        matched
    }

    pub fn rewrite_count(&self) -> usize {
        self.rewrites.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rewrites", &self.rewrites.len())
            .field("routes", &self.routes.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;
