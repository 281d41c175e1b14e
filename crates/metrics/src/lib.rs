//! metro - Metrics
//!
//! Internal metrics collection and reporting for observability.
//!
//! # Design Principles
//!
//! - **Lock-free**: all metrics are atomic counters or atomic bucket arrays
//! - **Low overhead**: no allocation on the update path
//! - **Trait-based**: components implement provider traits for collection
//!
//! # Metrics Handle Pattern
//!
//! Components own an `Arc<Metrics>` internally and expose a lightweight
//! handle implementing the matching provider trait. The handle stays valid
//! after the component's `run()` consumes it:
//!
//! ```text
//! Component (owns Arc<Metrics>)
//!     ├──► metrics_handle() → Handle (clones Arc, implements Provider)
//!     └──► run() [consumes self, Arc keeps metrics alive]
//! ```
//!
//! The daemon collects handles into a [`Reporter`], which periodically logs
//! snapshots through `tracing`.

mod histogram;
mod reporter;
mod traits;

pub use histogram::{HistogramSnapshot, LatencyHistogram};
pub use reporter::{Reporter, ReporterBuilder};
pub use traits::{
    HostMetricsProvider, HostSnapshot, ListenerMetricsProvider, ListenerSnapshot,
    PipelineMetricsProvider, PipelineSnapshot,
};
