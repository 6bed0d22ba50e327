// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for xferbench.
//!
//! Small shell scripts stand in for the transfer endpoints: the "server"
//! records its pid and idles, the "client" copies the payload to where the
//! server would have written it.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use xferbench_core::{
    BenchmarkExecutor, ConfigLoader, EventSink, ProcessSupervisor, ResultHistory, RunEvent,
    SeriesKind, StatusLevel, StopOutcome, Transport,
};

const SERVER: &str = r#"echo $$ > server.pid
exec sleep 30"#;

/// Fails unless the server is up, answers the probe flag, otherwise
/// "transfers" by copying the payload.
const STREAM_CLIENT: &str = r#"[ -f server.pid ] || { echo "no server listening" >&2; exit 1; }
if [ "$3" = "--rtt" ]; then sleep 0.01; exit 0; fi
mkdir -p logs
cp "$1" logs/tcp_received_file.txt"#;

/// Fabric client argument order is `<target> <payload>`.
const FABRIC_CLIENT: &str = r#"if [ "$3" = "--rtt" ]; then exit 0; fi
cp "$2" received_file.bin"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn write_payload(dir: &Path, size_bytes: usize) -> PathBuf {
    let path = dir.join("payload.bin");
    let content: Vec<u8> = (0..size_bytes).map(|i| (i * 31 % 253) as u8).collect();
    std::fs::write(&path, content).expect("Failed to write payload");
    path
}

fn config_yaml(base: &Path, payload_dir: &Path, sweep: &str) -> String {
    format!(
        r#"
orchestrator:
  base_dir: "{base}"
  payload_dir: "{payloads}"
  grace_period_ms: 2000
  server_startup_delay_ms: 100
  sweep_sizes_mb: {sweep}
transports:
  stream:
    server: {{ program: stream_server.sh }}
    client: {{ program: stream_client.sh }}
    received_candidates: [logs/tcp_received_file.txt]
  fabric:
    server: {{ program: fabric_server.sh }}
    client: {{ program: fabric_client.sh }}
    received_candidates: [received_file.txt, logs/rdma_received_file.txt, received_file.bin]
"#,
        base = base.display(),
        payloads = payload_dir.display(),
    )
}

struct Harness {
    dir: TempDir,
    payload_dir: TempDir,
    executor: Arc<BenchmarkExecutor>,
    events: UnboundedReceiver<RunEvent>,
}

fn harness(sweep_sizes: &str, sweep: bool) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let payload_dir = TempDir::new().expect("Failed to create payload dir");

    let config = ConfigLoader::load_string(&config_yaml(dir.path(), payload_dir.path(), sweep_sizes))
        .expect("Config should be valid");
    let (sink, events) = EventSink::channel();
    let executor = BenchmarkExecutor::new(
        Arc::new(config),
        ProcessSupervisor::new_shared(),
        ResultHistory::new_shared(),
        sink,
    )
    .with_sweep(sweep);

    Harness {
        dir,
        payload_dir,
        executor: Arc::new(executor),
        events,
    }
}

fn drain(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn stop_outcomes(events: &[RunEvent]) -> Vec<StopOutcome> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::EndpointStopped { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .collect()
}

/// A local stream run against a healthy auto-started endpoint.
#[test]
fn test_local_stream_run_matches_and_stops_endpoint_once() {
    let mut h = harness("[]", false);
    write_script(h.dir.path(), "stream_server.sh", SERVER);
    write_script(h.dir.path(), "stream_client.sh", STREAM_CLIENT);
    let payload = write_payload(h.dir.path(), 5 * 1024 * 1024);

    let result = h
        .executor
        .run(Transport::Stream, "127.0.0.1", &payload)
        .expect("Run should produce a result");

    assert_eq!(result.transport, Transport::Stream);
    assert!((result.payload_size_mb - 5.0).abs() < 1e-9);
    assert!(result.throughput_mbps > 0.0);
    assert!(result.elapsed_seconds > 0.0);
    assert_eq!(result.integrity.label(), "MATCH");

    let events = drain(&mut h.events);
    let stops: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::EndpointStopped { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .collect();
    assert_eq!(stops, vec![StopOutcome::Stopped]);

    // Ordering: integrity before endpoint stop, result recorded last.
    let integrity_at = events
        .iter()
        .position(|e| matches!(e, RunEvent::Integrity { .. }))
        .unwrap();
    let stop_at = events
        .iter()
        .position(|e| matches!(e, RunEvent::EndpointStopped { .. }))
        .unwrap();
    let recorded_at = events
        .iter()
        .position(|e| matches!(e, RunEvent::ResultRecorded { .. }))
        .unwrap();
    assert!(integrity_at < stop_at && stop_at < recorded_at);
    assert!(matches!(events.last(), Some(RunEvent::RunFinished { .. })));

    assert_eq!(h.executor.history().result_count(Transport::Stream), 1);
    assert_eq!(h.executor.supervisor().live_count(), 0);
}

/// Missing fabric client executable: LaunchError status, nothing appended.
#[test]
fn test_missing_fabric_client_is_reported_without_result() {
    let mut h = harness("[1]", true);
    let payload = write_payload(h.dir.path(), 64 * 1024);

    let result = h.executor.run(Transport::Fabric, "127.0.0.1", &payload);
    assert!(result.is_none());
    assert_eq!(h.executor.history().result_count(Transport::Fabric), 0);
    assert!(h
        .executor
        .history()
        .series(Transport::Fabric, SeriesKind::Bandwidth)
        .is_empty());

    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Status { level: StatusLevel::Error, message, .. }
            if message.contains("Executable not found") && message.contains("fabric_client.sh")
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, RunEvent::ResultRecorded { .. })));
    assert!(matches!(
        events.last(),
        Some(RunEvent::RunFinished {
            transport: Transport::Fabric
        })
    ));
}

/// A failing client on a local run still tears down the auto-started server.
#[test]
fn test_failed_local_client_still_stops_endpoint() {
    let mut h = harness("[]", false);
    write_script(h.dir.path(), "stream_server.sh", SERVER);
    write_script(h.dir.path(), "stream_client.sh", "echo 'transfer aborted' >&2\nexit 4");
    let payload = write_payload(h.dir.path(), 4096);

    assert!(h
        .executor
        .run(Transport::Stream, "127.0.0.1", &payload)
        .is_none());
    assert_eq!(h.executor.history().result_count(Transport::Stream), 0);
    assert_eq!(h.executor.supervisor().live_count(), 0);

    let events = drain(&mut h.events);
    assert_eq!(stop_outcomes(&events), vec![StopOutcome::Stopped]);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Status { level: StatusLevel::Error, message, .. }
            if message.contains("transfer aborted")
    )));
}

/// A missing client executable aborts the run after the server was started;
/// the server is still stopped exactly once.
#[test]
fn test_missing_local_client_still_stops_endpoint() {
    let mut h = harness("[]", false);
    write_script(h.dir.path(), "stream_server.sh", SERVER);
    let payload = write_payload(h.dir.path(), 4096);

    assert!(h
        .executor
        .run(Transport::Stream, "localhost", &payload)
        .is_none());
    assert_eq!(h.executor.supervisor().live_count(), 0);

    let events = drain(&mut h.events);
    assert_eq!(stop_outcomes(&events), vec![StopOutcome::Stopped]);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Status { level: StatusLevel::Error, message, .. }
            if message.contains("stream_client.sh")
    )));
}

/// Sweep legs whose client fails are skipped and their payloads deleted.
#[test]
fn test_failed_sweep_legs_leave_no_payloads() {
    let mut h = harness("[1, 2]", true);
    write_script(
        h.dir.path(),
        "fabric_client.sh",
        r#"case "$2" in *xferbench-payload-*) echo "peer reset" >&2; exit 5;; esac
if [ "$3" = "--rtt" ]; then exit 0; fi
cp "$2" received_file.bin"#,
    );
    let payload = write_payload(h.dir.path(), 64 * 1024);

    let result = h
        .executor
        .run(Transport::Fabric, "192.0.2.8", &payload)
        .expect("primary leg should still be recorded");
    assert_eq!(result.integrity.label(), "MATCH");
    assert!(h
        .executor
        .history()
        .series(Transport::Fabric, SeriesKind::Bandwidth)
        .is_empty());

    let leftovers = std::fs::read_dir(h.payload_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);

    let skipped = drain(&mut h.events)
        .iter()
        .filter(|e| matches!(
            e,
            RunEvent::Status { level: StatusLevel::Warn, message, .. } if message.contains("skipped")
        ))
        .count();
    assert_eq!(skipped, 2);
}

/// A client that disappears mid-sweep aborts the run; the payload of the
/// aborted leg is still deleted.
#[test]
fn test_client_vanishing_mid_sweep_leaves_no_payloads() {
    let mut h = harness("[1, 2]", true);
    write_script(
        h.dir.path(),
        "fabric_client.sh",
        r#"if [ "$3" = "--rtt" ]; then exit 0; fi
cp "$2" received_file.bin
rm -f "$0""#,
    );
    let payload = write_payload(h.dir.path(), 64 * 1024);

    assert!(h
        .executor
        .run(Transport::Fabric, "192.0.2.9", &payload)
        .is_none());
    assert_eq!(h.executor.history().result_count(Transport::Fabric), 0);

    let leftovers = std::fs::read_dir(h.payload_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);

    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Status { level: StatusLevel::Error, message, .. }
            if message.contains("Executable not found")
    )));
    assert!(matches!(events.last(), Some(RunEvent::RunFinished { .. })));
}

/// Sweep over {1, 10, 100} MB yields three sorted points per series and
/// leaves no payload files behind.
#[test]
fn test_sweep_populates_sorted_series() {
    let mut h = harness("[100, 1, 10]", true);
    write_script(h.dir.path(), "fabric_client.sh", FABRIC_CLIENT);
    let payload = write_payload(h.dir.path(), 1024 * 1024);

    // Remote target: no endpoint is started.
    let result = h
        .executor
        .run(Transport::Fabric, "192.0.2.44", &payload)
        .expect("Run should produce a result");
    assert_eq!(result.integrity.label(), "MATCH");
    assert!(result.half_rtt_us > 0.0);

    let history = h.executor.history();
    let bandwidth = history.series(Transport::Fabric, SeriesKind::Bandwidth);
    let half_rtt = history.series(Transport::Fabric, SeriesKind::HalfRtt);

    let sizes = |points: &[xferbench_core::SeriesPoint]| -> Vec<f64> {
        points.iter().map(|p| p.payload_size_mb).collect()
    };
    assert_eq!(sizes(&bandwidth), vec![1.0, 10.0, 100.0]);
    assert_eq!(sizes(&half_rtt), vec![1.0, 10.0, 100.0]);
    assert!(bandwidth.iter().all(|p| p.value > 0.0));

    let leftovers = std::fs::read_dir(h.payload_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0, "sweep payloads must be deleted");

    let events = drain(&mut h.events);
    let integrity_checks = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Integrity { .. }))
        .count();
    assert_eq!(integrity_checks, 4);
    assert!(!events
        .iter()
        .any(|e| matches!(e, RunEvent::EndpointStarted { .. })));
}

/// A manually started endpoint is reused by a local run and left running.
#[test]
fn test_manual_endpoint_reused_and_kept() {
    let mut h = harness("[]", false);
    write_script(h.dir.path(), "stream_server.sh", SERVER);
    write_script(h.dir.path(), "stream_client.sh", STREAM_CLIENT);
    let payload = write_payload(h.dir.path(), 4096);

    let server = h
        .executor
        .start_endpoint(Transport::Stream)
        .expect("Server should start");
    std::thread::sleep(std::time::Duration::from_millis(100));

    assert!(h
        .executor
        .run(Transport::Stream, "localhost", &payload)
        .is_some());
    assert!(server.is_alive());
    assert_eq!(server.stop_requests(), 0);

    let outcomes = h.executor.shutdown();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1, StopOutcome::Stopped);
    assert!(!server.is_alive());

    let events = drain(&mut h.events);
    let started = events
        .iter()
        .filter(|e| matches!(e, RunEvent::EndpointStarted { .. }))
        .count();
    assert_eq!(started, 1);
}

/// Both transports run concurrently on blocking workers while the event
/// channel is drained asynchronously.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_transports_over_event_channel() {
    let mut h = harness("[1]", true);
    write_script(h.dir.path(), "stream_server.sh", SERVER);
    write_script(h.dir.path(), "stream_client.sh", STREAM_CLIENT);
    write_script(h.dir.path(), "fabric_client.sh", FABRIC_CLIENT);
    let payload = write_payload(h.dir.path(), 256 * 1024);

    let mut workers = Vec::new();
    for (transport, target) in [(Transport::Stream, "127.0.0.1"), (Transport::Fabric, "192.0.2.1")] {
        let executor = Arc::clone(&h.executor);
        let payload = payload.clone();
        workers.push(tokio::task::spawn_blocking(move || {
            executor.run(transport, target, &payload)
        }));
    }

    let mut finished = Vec::new();
    while finished.len() < 2 {
        match h.events.recv().await {
            Some(RunEvent::RunFinished { transport }) => finished.push(transport),
            Some(_) => {}
            None => break,
        }
    }
    finished.sort();
    assert_eq!(finished, vec![Transport::Stream, Transport::Fabric]);

    for worker in workers {
        let result = worker.await.unwrap().expect("Both runs should succeed");
        assert_eq!(result.integrity.label(), "MATCH");
    }

    let last = h.executor.history().last_results();
    assert_eq!(last.len(), 2);
    assert_eq!(h.executor.supervisor().live_count(), 0);
}
