//! UDP ingest tests

use std::sync::Arc;
use std::time::Duration;

use crossfire::MAsyncRx;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::common::{LineSender, ListenerMetrics};
use crate::udp::{UdpIngest, UdpIngestConfig};
use crate::IngestError;

struct Fixture {
    port: u16,
    rx: MAsyncRx<String>,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), IngestError>>,
}

async fn start() -> Fixture {
    let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let (tx, rx) = crossfire::mpmc::bounded_async::<String>(100);
    let metrics = Arc::new(ListenerMetrics::new());
    let cancel = CancellationToken::new();

    let ingest = UdpIngest::new(
        UdpIngestConfig {
            addr: format!("127.0.0.1:{port}").parse().unwrap(),
        },
        LineSender::new(tx, Arc::clone(&metrics)),
        Arc::clone(&metrics),
    );

    let task = tokio::spawn(ingest.run(cancel.clone()));
    sleep(Duration::from_millis(50)).await;

    Fixture {
        port,
        rx,
        metrics,
        cancel,
        task,
    }
}

async fn send(port: u16, payload: &[u8]) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(payload, ("127.0.0.1", port)).await.unwrap();
}

async fn recv_line(rx: &MAsyncRx<String>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for line")
        .expect("queue closed")
}

#[tokio::test]
async fn terminated_lines_are_accepted() {
    let f = start().await;

    send(f.port, b"a.b 1 100\nc.d 2 200\n").await;

    assert_eq!(recv_line(&f.rx).await, "a.b 1 100");
    assert_eq!(recv_line(&f.rx).await, "c.d 2 200");
    assert_eq!(f.metrics.snapshot().in_recs, 2);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn trailing_fragment_is_discarded() {
    let f = start().await;

    send(f.port, b"complete 1 100\nincomplete 2").await;

    assert_eq!(recv_line(&f.rx).await, "complete 1 100");
    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.metrics.snapshot().in_recs, 1);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn datagram_without_terminator_yields_nothing() {
    let f = start().await;

    send(f.port, b"no terminator here").await;

    sleep(Duration::from_millis(100)).await;
    assert_eq!(f.metrics.snapshot().in_recs, 0);

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn empty_lines_pass_through_to_the_parser() {
    let f = start().await;

    send(f.port, b"a 1 1\n\nb 2 2\n").await;

    assert_eq!(recv_line(&f.rx).await, "a 1 1");
    assert_eq!(recv_line(&f.rx).await, "");
    assert_eq!(recv_line(&f.rx).await, "b 2 2");

    f.cancel.cancel();
    f.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancel_stops_the_reader() {
    let f = start().await;

    f.cancel.cancel();
    timeout(Duration::from_secs(2), f.task)
        .await
        .expect("UDP reader did not stop")
        .unwrap()
        .unwrap();
}
