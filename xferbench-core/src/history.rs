//! Per-transport result history and bandwidth/latency series.
//!
//! Appends take the shard lock for one transport; readers clone a snapshot
//! and never observe a half-written record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::checksum::IntegrityOutcome;
use crate::types::Transport;

/// Outcome of one primary benchmark run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub transport: Transport,
    pub payload_size_mb: f64,
    pub elapsed_seconds: f64,
    pub throughput_mbps: f64,
    pub avg_cpu_percent: f64,
    pub avg_memory_mb: f64,
    /// Half of the probed round trip. `0.0` when the client has no probe mode.
    pub half_rtt_us: f64,
    pub integrity: IntegrityOutcome,
    pub recorded_at: DateTime<Utc>,
}

/// One point of a size-dependent series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub payload_size_mb: f64,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(payload_size_mb: f64, value: f64) -> Self {
        Self {
            payload_size_mb,
            value,
        }
    }
}

/// The two series kept per transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// MB/s against payload size.
    Bandwidth,
    /// Microseconds against payload size.
    HalfRtt,
}

impl SeriesKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bandwidth => "bandwidth",
            Self::HalfRtt => "half-rtt",
        }
    }
}

#[derive(Debug, Default)]
struct TransportRecord {
    results: Vec<BenchmarkResult>,
    bandwidth: Vec<SeriesPoint>,
    half_rtt: Vec<SeriesPoint>,
}

/// Point-in-time copy of one transport's record, series sorted by size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    pub transport: Transport,
    pub results: Vec<BenchmarkResult>,
    pub bandwidth: Vec<SeriesPoint>,
    pub half_rtt: Vec<SeriesPoint>,
}

impl TransportSnapshot {
    pub fn last_result(&self) -> Option<&BenchmarkResult> {
        self.results.last()
    }
}

/// Thread-safe result history shared by concurrent runs.
#[derive(Debug, Default)]
pub struct ResultHistory {
    records: DashMap<Transport, TransportRecord>,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Create a history wrapped in an Arc for sharing across threads.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn append_result(&self, result: BenchmarkResult) {
        self.records
            .entry(result.transport)
            .or_default()
            .results
            .push(result);
    }

    pub fn append_point(&self, transport: Transport, kind: SeriesKind, point: SeriesPoint) {
        let mut record = self.records.entry(transport).or_default();
        match kind {
            SeriesKind::Bandwidth => record.bandwidth.push(point),
            SeriesKind::HalfRtt => record.half_rtt.push(point),
        }
    }

    /// Snapshot of one transport. Empty when nothing was recorded yet.
    pub fn snapshot(&self, transport: Transport) -> TransportSnapshot {
        let (results, mut bandwidth, mut half_rtt) = match self.records.get(&transport) {
            Some(record) => (
                record.results.clone(),
                record.bandwidth.clone(),
                record.half_rtt.clone(),
            ),
            None => Default::default(),
        };

        sort_by_size(&mut bandwidth);
        sort_by_size(&mut half_rtt);

        TransportSnapshot {
            transport,
            results,
            bandwidth,
            half_rtt,
        }
    }

    /// Snapshots of every transport, in transport order.
    pub fn snapshots(&self) -> Vec<TransportSnapshot> {
        Transport::ALL.iter().map(|t| self.snapshot(*t)).collect()
    }

    /// A series sorted ascending by payload size.
    pub fn series(&self, transport: Transport, kind: SeriesKind) -> Vec<SeriesPoint> {
        let snapshot = self.snapshot(transport);
        match kind {
            SeriesKind::Bandwidth => snapshot.bandwidth,
            SeriesKind::HalfRtt => snapshot.half_rtt,
        }
    }

    /// Latest primary result for a transport.
    pub fn last_result(&self, transport: Transport) -> Option<BenchmarkResult> {
        self.records
            .get(&transport)
            .and_then(|record| record.results.last().cloned())
    }

    /// Latest primary result of every transport that has one.
    pub fn last_results(&self) -> Vec<BenchmarkResult> {
        Transport::ALL
            .iter()
            .filter_map(|t| self.last_result(*t))
            .collect()
    }

    pub fn result_count(&self, transport: Transport) -> usize {
        self.records
            .get(&transport)
            .map(|record| record.results.len())
            .unwrap_or(0)
    }
}

fn sort_by_size(points: &mut [SeriesPoint]) {
    points.sort_by(|a, b| a.payload_size_mb.total_cmp(&b.payload_size_mb));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(transport: Transport, throughput: f64) -> BenchmarkResult {
        BenchmarkResult {
            transport,
            payload_size_mb: 5.0,
            elapsed_seconds: 5.0 / throughput,
            throughput_mbps: throughput,
            avg_cpu_percent: 12.5,
            avg_memory_mb: 3.0,
            half_rtt_us: 0.0,
            integrity: IntegrityOutcome::NotFound,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let history = ResultHistory::new();
        let snapshot = history.snapshot(Transport::Stream);
        assert!(snapshot.results.is_empty());
        assert!(snapshot.bandwidth.is_empty());
        assert!(snapshot.last_result().is_none());
        assert_eq!(history.result_count(Transport::Fabric), 0);
    }

    #[test]
    fn test_series_sorted_on_read() {
        let history = ResultHistory::new();
        for size in [100.0, 1.0, 10.0] {
            history.append_point(
                Transport::Fabric,
                SeriesKind::Bandwidth,
                SeriesPoint::new(size, size * 2.0),
            );
        }

        let sizes: Vec<f64> = history
            .series(Transport::Fabric, SeriesKind::Bandwidth)
            .iter()
            .map(|p| p.payload_size_mb)
            .collect();
        assert_eq!(sizes, vec![1.0, 10.0, 100.0]);
        assert!(history
            .series(Transport::Fabric, SeriesKind::HalfRtt)
            .is_empty());
        assert!(history
            .series(Transport::Stream, SeriesKind::Bandwidth)
            .is_empty());
    }

    #[test]
    fn test_last_results_per_transport() {
        let history = ResultHistory::new();
        history.append_result(result(Transport::Stream, 100.0));
        history.append_result(result(Transport::Stream, 120.0));
        history.append_result(result(Transport::Fabric, 900.0));

        assert_eq!(history.result_count(Transport::Stream), 2);
        assert_eq!(
            history.last_result(Transport::Stream).unwrap().throughput_mbps,
            120.0
        );

        let last: Vec<_> = history
            .last_results()
            .into_iter()
            .map(|r| r.transport)
            .collect();
        assert_eq!(last, vec![Transport::Stream, Transport::Fabric]);
    }

    #[test]
    fn test_concurrent_appends() {
        let history = ResultHistory::new_shared();
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let history = Arc::clone(&history);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let size = f64::from(i * 50 + j);
                        history.append_point(
                            Transport::Stream,
                            SeriesKind::HalfRtt,
                            SeriesPoint::new(size, 1.0),
                        );
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let series = history.series(Transport::Stream, SeriesKind::HalfRtt);
        assert_eq!(series.len(), 400);
        assert!(series
            .windows(2)
            .all(|w| w[0].payload_size_mb <= w[1].payload_size_mb));
    }
}
