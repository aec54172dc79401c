//! Integration tests for namespace collection.

use std::collections::BTreeSet;

use netstat::{Features, Transport, accept_all};
use tokio_util::sync::CancellationToken;

use crate::common::MockProc;

/// Host plus two named namespaces and one unnamed container.
///
/// | namespace    | pid  | tcp rows | tcp6 rows |
/// |--------------|------|----------|-----------|
/// | host         |      | 2        | 1         |
/// | testnsnet1   | 1000 | 3        | 2         |
/// | testnsnet2   | 1001 | 4        | 0         |
/// | (unnamed)    | 1002 | 5        | 1         |
fn containers() -> MockProc {
    let mock = MockProc::new();
    mock.write_rows(None, Transport::Tcp, 2, 100);
    mock.write_rows(None, Transport::Tcp6, 1, 200);

    let ns1 = mock.add_namespace("testnsnet1");
    mock.join_namespace(1000, ns1);
    mock.write_rows(Some(1000), Transport::Tcp, 3, 1100);
    mock.write_rows(Some(1000), Transport::Tcp6, 2, 1200);

    let ns2 = mock.add_namespace("testnsnet2");
    mock.join_namespace(1001, ns2);
    mock.write_rows(Some(1001), Transport::Tcp, 4, 2100);

    mock.write_rows(Some(1002), Transport::Tcp, 5, 3100);
    mock.write_rows(Some(1002), Transport::Tcp6, 1, 3200);
    mock
}

fn tcp() -> Features {
    Features {
        tcp: true,
        tcp6: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_collect_single_namespace() {
    let mock = containers();
    let features = tcp().with_namespace("testnsnet1").without_host();

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e.namespace == "testnsnet1"));
    assert!(entries.iter().all(|e| (1100..1300).contains(&e.inode)));
}

#[tokio::test]
async fn test_collect_namespace_and_host() {
    let mock = containers();
    let features = Features {
        tcp: true,
        ..Default::default()
    }
    .with_namespace("testnsnet2");

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    assert_eq!(entries.len(), 6);
    assert_eq!(entries.iter().filter(|e| e.is_host()).count(), 2);
    assert_eq!(entries.iter().filter(|e| e.namespace == "testnsnet2").count(), 4);
}

#[tokio::test]
async fn test_collect_all_namespaces() {
    let mock = containers();
    let features = tcp().with_all_namespaces();

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    assert_eq!(entries.len(), 3 + 5 + 4);
    let labels: BTreeSet<&str> = entries.iter().map(|e| e.namespace.as_str()).collect();
    assert_eq!(labels, BTreeSet::from(["", "testnsnet1", "testnsnet2"]));
}

#[tokio::test]
async fn test_collect_pid_namespace() {
    let mock = containers();
    let features = tcp().with_pid(1002).without_host();

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    assert_eq!(entries.len(), 6);
    assert!(entries.iter().all(|e| e.namespace == "1002"));
}

#[tokio::test]
async fn test_collect_pid_of_named_namespace() {
    let mock = containers();
    let features = tcp()
        .with_namespace("testnsnet1")
        .with_pid(1000)
        .with_pid(1002);

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    // pid 1000 is read once, under its namespace name.
    assert_eq!(entries.len(), 3 + 5 + 6);
    assert_eq!(entries.iter().filter(|e| e.namespace == "testnsnet1").count(), 5);
    assert_eq!(entries.iter().filter(|e| e.namespace == "1000").count(), 0);
    assert_eq!(entries.iter().filter(|e| e.namespace == "1002").count(), 6);
}

#[tokio::test]
async fn test_collect_unknown_namespace() {
    let mock = containers();
    let features = tcp().with_namespace("missing").without_host();

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_collect_missing_registry() {
    let mock = containers();
    let netstat = netstat::Netstat::with_config(
        mock.config.clone().with_netns_dir(mock.config.netns_dir.join("gone")),
    );
    let features = tcp().with_all_namespaces();

    let entries = netstat
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.is_host()));
}
