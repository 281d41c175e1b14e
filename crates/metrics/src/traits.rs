//! Provider traits and snapshot types
//!
//! Each pipeline stage exposes its counters through one of these traits.
//! Snapshots are plain copyable structs so the reporter can diff intervals.

/// Point-in-time counters for one listener (TCP or UDP)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSnapshot {
    /// Lines accepted into the main queue
    pub in_recs: u64,

    /// Lines dropped because the main queue was full
    pub throttled_in: u64,

    /// Currently open inbound TCP connections (0 for UDP)
    pub connections_active: u64,

    /// Total inbound TCP connections accepted (0 for UDP)
    pub connections_total: u64,

    /// Lines discarded for exceeding the length limit
    pub oversized_lines: u64,

    /// Socket read / accept errors
    pub read_errors: u64,
}

/// Metrics source for a listener
pub trait ListenerMetricsProvider: Send + Sync {
    /// Listener identifier for log fields (e.g. "tcp", "udp")
    fn listener_id(&self) -> &str;

    fn snapshot(&self) -> ListenerSnapshot;
}

/// Point-in-time counters for the worker pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineSnapshot {
    /// Lines taken off the main queue
    pub lines_processed: u64,

    /// Lines rejected by the parser
    pub parse_errors: u64,

    /// Valid records that matched no routing rule
    pub unrouted: u64,

    /// Records handed to at least one cluster
    pub routed: u64,
}

/// Metrics source for the worker pool
pub trait PipelineMetricsProvider: Send + Sync {
    fn snapshot(&self) -> PipelineSnapshot;
}

/// Point-in-time counters for one downstream host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostSnapshot {
    /// Records written to the host connection
    pub out_recs: u64,

    /// Records dropped because the host queue was full
    pub throttled_out: u64,

    /// Availability edges (up→down and down→up)
    pub state_changes: u64,

    /// Connections closed and reopened for exceeding the refresh period
    pub old_connection_refresh: u64,
}

/// Metrics source for a downstream host
pub trait HostMetricsProvider: Send + Sync {
    /// Cluster the host belongs to
    fn cluster(&self) -> &str;

    /// `host:port` label
    fn host(&self) -> &str;

    /// Whether the host is currently considered reachable
    fn available(&self) -> bool;

    fn snapshot(&self) -> HostSnapshot;
}
