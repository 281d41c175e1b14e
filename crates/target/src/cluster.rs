//! Clusters and routing policies
//!
//! A cluster is a named, immutable set of hosts plus a policy deciding which
//! of them receive a given record. Policies are a closed set:
//!
//! - `jump`: consistent-hash the record path to exactly one host. Hashing is
//!   over the full host list, including unavailable hosts - the policy is
//!   deterministic placement, not failover.
//! - `lb`: round-robin over the hosts currently marked available. When none
//!   are, either fall back to the full list or drop, per config.
//! - `broadcast`: every host gets a copy.

use std::sync::atomic::{AtomicUsize, Ordering};

use xxhash_rust::xxh3::xxh3_64;

use metro_record::Record;

use crate::host::Host;

/// Host selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Consistent-hash the path over the full host list
    Jump,
    /// Round-robin over available hosts
    Lb {
        /// Use the full list when no host is available (instead of dropping)
        fallback_to_all: bool,
    },
    /// Copy to every host
    Broadcast,
}

/// Named group of downstream hosts with a selection policy
pub struct Cluster {
    name: String,
    policy: Policy,
    hosts: Vec<Host>,
    rr_cursor: AtomicUsize,
}

impl Cluster {
    pub fn new(name: impl Into<String>, policy: Policy, hosts: Vec<Host>) -> Self {
        Self {
            name: name.into(),
            policy,
            hosts,
            rr_cursor: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Queue a record on the host(s) this cluster's policy selects.
    pub fn dispatch(&self, rec: &Record) {
        match self.policy {
            Policy::Broadcast => {
                for host in &self.hosts {
                    host.push(rec.clone());
                }
            }
            Policy::Jump => {
                if let Some(host) = self.jump_host(&rec.path) {
                    host.push(rec.clone());
                }
            }
            Policy::Lb { fallback_to_all } => {
                if let Some(host) = self.lb_host(fallback_to_all) {
                    host.push(rec.clone());
                }
            }
        }
    }

    /// Deterministic host for a path under the `jump` policy.
    pub(crate) fn jump_host(&self, path: &str) -> Option<&Host> {
        if self.hosts.is_empty() {
            return None;
        }
        let idx = jump_index(xxh3_64(path.as_bytes()), self.hosts.len() as u32);
        self.hosts.get(idx as usize)
    }

    /// Next host under the `lb` policy. The cursor advances atomically and
    /// is shared across callers.
    pub(crate) fn lb_host(&self, fallback_to_all: bool) -> Option<&Host> {
        let available: Vec<&Host> = self.hosts.iter().filter(|h| h.available()).collect();

        let pool: Vec<&Host> = if !available.is_empty() {
            available
        } else if fallback_to_all {
            self.hosts.iter().collect()
        } else {
            return None;
        };

        let n = self.rr_cursor.fetch_add(1, Ordering::Relaxed);
        pool.get(n % pool.len()).copied()
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("hosts", &self.hosts.len())
            .finish()
    }
}

/// Jump consistent hash (Lamping-Veach): maps a 64-bit key to a bucket in
/// `[0, buckets)` such that growing the bucket count only moves ~1/n keys.
fn jump_index(mut key: u64, buckets: u32) -> u32 {
    debug_assert!(buckets > 0);
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < i64::from(buckets) {
        b = j;
        key = key.wrapping_mul(2862933555777941757).wrapping_add(1);
        j = ((b.wrapping_add(1) as f64) * ((1u64 << 31) as f64 / ((key >> 33).wrapping_add(1) as f64)))
            as i64;
    }
    b as u32
}

#[cfg(test)]
#[path = "cluster_test.rs"]
mod cluster_test;
