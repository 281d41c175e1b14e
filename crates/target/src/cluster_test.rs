//! Cluster policy tests

use std::sync::Arc;

use metro_metrics::LatencyHistogram;
use metro_record::Record;
use tokio::sync::mpsc;

use crate::cluster::{Cluster, Policy};
use crate::host::{Host, HostConfig};

/// Hosts with their queues, no tasks spawned.
fn make_hosts(n: usize, queue_size: usize) -> (Vec<Host>, Vec<mpsc::Receiver<Record>>) {
    let latency = Arc::new(LatencyHistogram::new());
    let mut hosts = Vec::new();
    let mut rxs = Vec::new();
    for i in 0..n {
        let (host, rx) = Host::new_detached(
            "test",
            &format!("host-{i}"),
            2003,
            HostConfig::default(),
            queue_size,
            Arc::clone(&latency),
        );
        hosts.push(host);
        rxs.push(rx);
    }
    (hosts, rxs)
}

fn rec(path: &str) -> Record {
    Record::parse(&format!("{path} 1 1700000000")).unwrap()
}

#[test]
fn jump_is_deterministic() {
    let (hosts, _rxs) = make_hosts(3, 8);
    let cluster = Cluster::new("c", Policy::Jump, hosts);

    let first = cluster.jump_host("a.b.c").unwrap().label().to_string();
    for _ in 0..1000 {
        assert_eq!(cluster.jump_host("a.b.c").unwrap().label(), first);
    }
}

#[test]
fn jump_is_stable_across_rebuilds() {
    let (hosts_a, _ra) = make_hosts(3, 8);
    let (hosts_b, _rb) = make_hosts(3, 8);
    let a = Cluster::new("c", Policy::Jump, hosts_a);
    let b = Cluster::new("c", Policy::Jump, hosts_b);

    for path in ["x", "sys.cpu.load", "a.very.long.metric.path.indeed"] {
        assert_eq!(
            a.jump_host(path).unwrap().label(),
            b.jump_host(path).unwrap().label()
        );
    }
}

#[test]
fn jump_spreads_distinct_paths() {
    let (hosts, _rxs) = make_hosts(3, 8);
    let cluster = Cluster::new("c", Policy::Jump, hosts);

    let mut seen = std::collections::HashSet::new();
    for i in 0..100 {
        let path = format!("metric.{i}");
        seen.insert(cluster.jump_host(&path).unwrap().label().to_string());
    }
    assert_eq!(seen.len(), 3, "expected all hosts to receive some paths");
}

#[test]
fn jump_ignores_availability() {
    let (hosts, _rxs) = make_hosts(3, 8);
    let cluster = Cluster::new("c", Policy::Jump, hosts);

    let picked = cluster.jump_host("a.b").unwrap().label().to_string();
    for host in cluster.hosts() {
        host.force_available(false);
    }
    assert_eq!(cluster.jump_host("a.b").unwrap().label(), picked);
}

#[test]
fn broadcast_reaches_every_host() {
    let (hosts, mut rxs) = make_hosts(3, 8);
    let cluster = Cluster::new("c", Policy::Broadcast, hosts);

    cluster.dispatch(&rec("a.b"));

    for rx in &mut rxs {
        let got = rx.try_recv().expect("host missing its copy");
        assert_eq!(got.path, "a.b");
        assert!(rx.try_recv().is_err(), "host got more than one copy");
    }
}

#[test]
fn lb_round_robins_over_available() {
    let (hosts, _rxs) = make_hosts(3, 8);
    let cluster = Cluster::new(
        "c",
        Policy::Lb {
            fallback_to_all: true,
        },
        hosts,
    );

    let picks: Vec<String> = (0..6)
        .map(|_| cluster.lb_host(true).unwrap().label().to_string())
        .collect();
    // cursor walks the list twice
    assert_eq!(picks[0..3], picks[3..6]);
    let distinct: std::collections::HashSet<_> = picks.iter().collect();
    assert_eq!(distinct.len(), 3);
}

#[test]
fn lb_skips_unavailable_hosts() {
    let (hosts, _rxs) = make_hosts(3, 8);
    let down = hosts[1].clone();
    let cluster = Cluster::new(
        "c",
        Policy::Lb {
            fallback_to_all: true,
        },
        hosts,
    );
    down.force_available(false);

    for _ in 0..10 {
        let picked = cluster.lb_host(true).unwrap();
        assert_ne!(picked.label(), down.label());
    }
}

#[test]
fn lb_falls_back_to_full_list_when_none_available() {
    let (hosts, _rxs) = make_hosts(2, 8);
    let cluster = Cluster::new(
        "c",
        Policy::Lb {
            fallback_to_all: true,
        },
        hosts,
    );
    for host in cluster.hosts() {
        host.force_available(false);
    }

    assert!(cluster.lb_host(true).is_some());
}

#[test]
fn lb_without_fallback_drops_when_none_available() {
    let (hosts, mut rxs) = make_hosts(2, 8);
    let cluster = Cluster::new(
        "c",
        Policy::Lb {
            fallback_to_all: false,
        },
        hosts,
    );
    for host in cluster.hosts() {
        host.force_available(false);
    }

    assert!(cluster.lb_host(false).is_none());
    cluster.dispatch(&rec("a.b"));
    for rx in &mut rxs {
        assert!(rx.try_recv().is_err());
    }
}

#[test]
fn push_on_full_queue_counts_throttled() {
    let (hosts, _rxs) = make_hosts(1, 1);
    let host = &hosts[0];

    host.push(rec("a.1"));
    host.push(rec("a.2"));
    host.push(rec("a.3"));

    use metro_metrics::HostMetricsProvider;
    let snapshot = host.metrics_handle().snapshot();
    assert_eq!(snapshot.throttled_out, 2);
}
