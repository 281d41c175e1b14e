//! UDP ingest listener
//!
//! Reads datagrams and splits them on LF. Every complete line goes to the
//! main queue; a trailing fragment without a terminator is discarded (a
//! datagram is not continued by the next one).

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::common::{LineSender, ListenerMetrics, ListenerMetricsHandle};
use crate::IngestError;

/// Max UDP datagram size
const RECV_BUF_SIZE: usize = 64 * 1024;

/// UDP listener configuration
#[derive(Debug, Clone)]
pub struct UdpIngestConfig {
    /// Address to bind
    pub addr: SocketAddr,
}

/// UDP ingest listener
pub struct UdpIngest {
    config: UdpIngestConfig,
    sender: LineSender,
    metrics: Arc<ListenerMetrics>,
}

impl UdpIngest {
    pub fn new(config: UdpIngestConfig, sender: LineSender, metrics: Arc<ListenerMetrics>) -> Self {
        Self {
            config,
            sender,
            metrics,
        }
    }

    /// Reporting handle, valid after `run()` consumes the listener.
    pub fn metrics_handle(&self) -> ListenerMetricsHandle {
        ListenerMetricsHandle {
            id: "udp",
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Read datagrams until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), IngestError> {
        let socket = bind_udp(self.config.addr).map_err(|e| IngestError::Bind {
            address: self.config.addr.to_string(),
            source: e,
        })?;

        tracing::info!(address = %self.config.addr, "UDP ingest listening");

        let mut buf = vec![0u8; RECV_BUF_SIZE];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = socket.recv_from(&mut buf) => match result {
                    Ok((len, _peer)) => self.split_datagram(&buf[..len]),
                    Err(e) => {
                        self.metrics.read_error();
                        tracing::debug!(error = %e, "UDP recv error");
                    }
                },
            }
        }

        tracing::info!("UDP ingest stopped");
        Ok(())
    }

    /// Push every LF-terminated line; the final fragment is either empty
    /// (datagram ended in LF) or an incomplete record - both are dropped.
    fn split_datagram(&self, data: &[u8]) {
        let mut parts = data.split(|b| *b == b'\n').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                break;
            }
            self.sender.push(String::from_utf8_lossy(part).into_owned());
        }
    }
}

/// Bind with address reuse so a restarting daemon can rebind immediately.
fn bind_udp(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUF_SIZE * 4) {
        tracing::debug!(error = %e, "failed to set UDP SO_RCVBUF");
    }
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
