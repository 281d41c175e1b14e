//! metro - Ingest listeners
//!
//! The fan-in side of the daemon: a TCP acceptor and a UDP reader, both
//! pushing raw metric lines into the shared main queue.
//!
//! # Design
//!
//! - **Non-blocking ingest**: pushing to the main queue never waits. When
//!   the queue is full the line is dropped and `throttled_in` counted - a
//!   slow downstream must not block ingress.
//! - **Per-connection tasks**: each accepted TCP connection gets its own
//!   reader task with an idle deadline re-armed after every read.
//! - **Datagram splitting**: UDP payloads are split on LF; a trailing
//!   unterminated fragment is discarded.
//! - **Cooperative shutdown**: a cancellation token stops the accept loop;
//!   connection readers observe the same token and drain what they have.

mod common;
pub mod tcp;
pub mod udp;

pub use common::{LineSender, ListenerMetrics, ListenerMetricsHandle};
pub use tcp::{TcpIngest, TcpIngestConfig};
pub use udp::{UdpIngest, UdpIngestConfig};

use thiserror::Error;

/// Listener errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Failed to bind the listen address
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error outside the per-connection read path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
