//! Integration tests for host table collection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use netstat::{Error, Features, Transport, accept_all};
use tokio_util::sync::CancellationToken;

use crate::common::{HEADER, MockProc, row};

/// Host tables where the n-th transport has n rows (36 in total).
fn host_tables(mock: &MockProc) -> usize {
    let mut total = 0;
    for (i, transport) in Transport::ALL.into_iter().enumerate() {
        let count = i + 1;
        mock.write_rows(None, transport, count, 1000 * (i as u64 + 1));
        total += count;
    }
    total
}

#[tokio::test]
async fn test_collect_all_host_tables() {
    let mock = MockProc::new();
    let total = host_tables(&mock);

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &Features::all_transports(), accept_all)
        .await
        .unwrap();

    assert_eq!(entries.len(), total);
    assert!(entries.iter().all(|e| e.is_host() && e.process.is_none()));
    for (i, transport) in Transport::ALL.into_iter().enumerate() {
        let count = entries.iter().filter(|e| e.transport == transport).count();
        assert_eq!(count, i + 1, "{}", transport);
    }
}

#[tokio::test]
async fn test_collect_preserves_row_order() {
    let mock = MockProc::new();
    let inodes = mock.write_rows(None, Transport::Tcp, 5, 500);

    let features = Features {
        tcp: true,
        ..Default::default()
    };
    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();

    let got: Vec<u64> = entries.iter().map(|e| e.inode).collect();
    assert_eq!(got, inodes);
}

#[tokio::test]
async fn test_collect_reject_all() {
    let mock = MockProc::new();
    host_tables(&mock);

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &Features::all_transports(), |_| false)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_collect_filter_runs_once_per_row() {
    let mock = MockProc::new();
    let total = host_tables(&mock);

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &Features::all_transports(), move |e| {
            counter.fetch_add(1, Ordering::Relaxed);
            e.transport == Transport::Udp
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::Relaxed), total);
    assert_eq!(entries.len(), 3);
}

#[tokio::test]
async fn test_collect_exclude_host() {
    let mock = MockProc::new();
    host_tables(&mock);

    let features = Features::all_transports().without_host();
    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_collect_missing_table_skipped() {
    let mock = MockProc::new();
    mock.write_rows(None, Transport::Tcp, 4, 100);
    mock.write_rows(None, Transport::Raw6, 2, 200);

    let entries = mock
        .netstat()
        .collect(&CancellationToken::new(), &Features::all_transports(), accept_all)
        .await
        .unwrap();
    assert_eq!(entries.len(), 6);
}

#[tokio::test]
async fn test_collect_malformed_row_aborts() {
    let mock = MockProc::new();
    mock.write_rows(None, Transport::Tcp, 3, 100);
    let content = format!(
        "{}{}   1: 0100007F:0035 00000000:0000 0A\n",
        HEADER,
        row(Transport::Udp, 0, 0x07, 200)
    );
    mock.write_raw(None, Transport::Udp, &content);

    let err = mock
        .netstat()
        .collect(&CancellationToken::new(), &Features::default_transports(), accept_all)
        .await
        .unwrap_err();

    match &err {
        Error::Table { path, line, .. } => {
            assert!(path.ends_with("net/udp"));
            assert!(line.starts_with("1: 0100007F:0035"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(matches!(err.root_cause(), Error::MalformedLine { .. }));
}

#[tokio::test]
async fn test_collect_non_utf8_row_aborts() {
    let mock = MockProc::new();
    let mut content = format!("{}{}", HEADER, row(Transport::Tcp, 0, 0x0A, 100)).into_bytes();
    content.extend_from_slice(b"   1: \xff\xfe garbage row\n");
    mock.write_raw(None, Transport::Tcp, content);

    let features = Features {
        tcp: true,
        ..Default::default()
    };
    let err = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap_err();

    match &err {
        Error::Table { path, line, .. } => {
            assert!(path.ends_with("net/tcp"));
            assert!(line.starts_with("1:"));
            assert!(line.ends_with("garbage row"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(matches!(err.root_cause(), Error::MalformedLine { .. }));
}

#[tokio::test]
async fn test_collect_bad_port_aborts() {
    let mock = MockProc::new();
    let content = format!(
        "{}   0: 0100007F:FFFF1 00000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 1 1 0000000000000000\n",
        HEADER
    );
    mock.write_raw(None, Transport::Tcp, &content);

    let features = Features {
        tcp: true,
        ..Default::default()
    };
    let err = mock
        .netstat()
        .collect(&CancellationToken::new(), &features, accept_all)
        .await
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::BadPortFormat(p) if p == "FFFF1"));
}

#[tokio::test]
async fn test_collect_cancelled() {
    let mock = MockProc::new();
    let total = host_tables(&mock);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = mock
        .netstat()
        .collect(&cancel, &Features::all_transports().with_processes(), accept_all)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    let partial = err.into_partial().unwrap();
    assert!(partial.len() <= total);
}

#[tokio::test]
async fn test_collect_cancelled_midway() {
    let mock = MockProc::new();
    let total = host_tables(&mock);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let result = mock
        .netstat()
        .collect(&cancel, &Features::all_transports(), move |_| {
            trigger.cancel();
            true
        })
        .await;

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert!(err.into_partial().unwrap().len() <= total);
}
