//! TCP ingest listener
//!
//! Accepts connections and reads LF-delimited metric lines into the main
//! queue. Each connection gets its own reader task.
//!
//! # Behavior
//!
//! - The idle deadline is re-armed on every read; a connection that goes
//!   quiet for `idle_timeout` is closed.
//! - Lines longer than `max_line_len` are discarded (with a counter bump)
//!   by skipping bytes until the next LF.
//! - Accept errors are logged and the loop continues.
//! - On shutdown the acceptor closes first, then in-flight connection
//!   readers are awaited so every received line reaches the queue.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::{LineSender, ListenerMetrics, ListenerMetricsHandle};
use crate::IngestError;

/// Read buffer size per connection
const READ_BUF_SIZE: usize = 64 * 1024;

/// TCP listener configuration
#[derive(Debug, Clone)]
pub struct TcpIngestConfig {
    /// Address to bind
    pub addr: SocketAddr,

    /// Idle deadline between reads on one connection
    pub idle_timeout: Duration,

    /// Longest accepted line in bytes (excluding the LF)
    pub max_line_len: usize,
}

/// TCP ingest listener
pub struct TcpIngest {
    config: TcpIngestConfig,
    sender: LineSender,
    metrics: Arc<ListenerMetrics>,
}

impl TcpIngest {
    pub fn new(config: TcpIngestConfig, sender: LineSender, metrics: Arc<ListenerMetrics>) -> Self {
        Self {
            config,
            sender,
            metrics,
        }
    }

    /// Reporting handle, valid after `run()` consumes the listener.
    pub fn metrics_handle(&self) -> ListenerMetricsHandle {
        ListenerMetricsHandle {
            id: "tcp",
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Bind and accept until cancelled, then wait for in-flight connection
    /// readers to finish.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), IngestError> {
        let listener =
            TcpListener::bind(self.config.addr)
                .await
                .map_err(|e| IngestError::Bind {
                    address: self.config.addr.to_string(),
                    source: e,
                })?;

        tracing::info!(address = %self.config.addr, "TCP ingest listening");

        let mut readers = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer)) => {
                        self.metrics.connection_opened();
                        let reader = ConnReader {
                            config: self.config.clone(),
                            sender: self.sender.clone(),
                            metrics: Arc::clone(&self.metrics),
                            cancel: cancel.clone(),
                        };
                        readers.spawn(async move { reader.run(stream, peer).await });
                    }
                    Err(e) => {
                        self.metrics.read_error();
                        tracing::warn!(error = %e, "accept error");
                    }
                },
            }
        }

        drop(listener);
        tracing::info!("TCP ingest stopped accepting, draining connections");

        while readers.join_next().await.is_some() {}

        tracing::info!("TCP ingest stopped");
        Ok(())
    }
}

/// Reader task for one inbound connection
struct ConnReader {
    config: TcpIngestConfig,
    sender: LineSender,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
}

impl ConnReader {
    async fn run(self, mut stream: TcpStream, peer: SocketAddr) {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        let mut discarding = false;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = timeout(self.config.idle_timeout, stream.read_buf(&mut buf)) => {
                    match result {
                        Err(_) => {
                            tracing::debug!(peer = %peer, "idle timeout, closing connection");
                            break;
                        }
                        Ok(Ok(0)) => break, // EOF
                        Ok(Ok(_)) => self.drain_lines(&mut buf, &mut discarding),
                        Ok(Err(e)) => {
                            self.metrics.read_error();
                            tracing::debug!(peer = %peer, error = %e, "read error");
                            break;
                        }
                    }
                }
            }
        }

        // anything left in the buffer has no terminator; it is not a record
        self.metrics.connection_closed();
    }

    /// Extract every complete line from the buffer and push it.
    fn drain_lines(&self, buf: &mut BytesMut, discarding: &mut bool) {
        loop {
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    let chunk = buf.split_to(pos + 1);
                    if *discarding {
                        // tail of an over-length line
                        *discarding = false;
                        continue;
                    }

                    let mut line = &chunk[..pos];
                    if let [head @ .., b'\r'] = line {
                        line = head;
                    }
                    if line.len() > self.config.max_line_len {
                        self.metrics.oversized_line();
                        continue;
                    }
                    self.sender.push(String::from_utf8_lossy(line).into_owned());
                }
                None => {
                    if buf.len() > self.config.max_line_len {
                        if !*discarding {
                            self.metrics.oversized_line();
                            *discarding = true;
                        }
                        buf.advance(buf.len());
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
