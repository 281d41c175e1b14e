//! metro - Target delivery
//!
//! Everything downstream of routing: clusters, their policies, and the
//! per-host delivery actor.
//!
//! # Architecture
//!
//! ```text
//! dispatch ──► Cluster (policy: jump | lb | broadcast)
//!                 │ host.push() - non-blocking, drop + count on full
//!                 ▼
//!              Host queue ──► sender task ──► BufWriter<TcpStream> ──► downstream
//!                                  ▲                   │
//!                             flusher task ────────────┘ (periodic flush)
//! ```
//!
//! Each host owns a bounded queue, exactly one sender task, and an optional
//! periodic flusher. The sender reconnects with capped exponential backoff
//! and retries the current record until it is written. A host's `available`
//! flag follows its connect outcomes and feeds the `lb` policy.

mod cluster;
mod host;
mod metrics;
pub mod test_utils;

pub use cluster::{Cluster, Policy};
pub use host::{Host, HostConfig, HostTasks};
pub use metrics::{HostMetrics, HostMetricsHandle};
