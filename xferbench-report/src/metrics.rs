// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Report types for transfer benchmark results.
//!
//! A [`ComparisonReport`] captures the host, every transport's result history
//! and both size series (sorted by payload size), plus a head-to-head view of
//! the latest result of each transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use xferbench_core::{BenchmarkResult, ResultHistory, Transport, TransportSnapshot};

/// System information captured at report time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of CPU cores
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Latest stream result against latest fabric result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub stream: BenchmarkResult,
    pub fabric: BenchmarkResult,
    /// Fabric throughput divided by stream throughput. `None` when the
    /// stream throughput is zero.
    pub throughput_ratio: Option<f64>,
    /// Stream half-RTT divided by fabric half-RTT. `None` when either side
    /// has no latency figure.
    pub latency_ratio: Option<f64>,
}

impl HeadToHead {
    pub fn new(stream: BenchmarkResult, fabric: BenchmarkResult) -> Self {
        let throughput_ratio =
            (stream.throughput_mbps > 0.0).then(|| fabric.throughput_mbps / stream.throughput_mbps);
        let latency_ratio = (stream.half_rtt_us > 0.0 && fabric.half_rtt_us > 0.0)
            .then(|| stream.half_rtt_us / fabric.half_rtt_us);

        Self {
            stream,
            fabric,
            throughput_ratio,
            latency_ratio,
        }
    }
}

/// Complete comparison report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Unique report identifier
    pub report_id: Uuid,
    /// Tool version that produced the report
    pub version: String,
    /// Timestamp when the report was taken
    pub timestamp: DateTime<Utc>,
    pub system_info: SystemInfo,
    /// One entry per transport, series sorted by payload size.
    pub transports: Vec<TransportSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_to_head: Option<HeadToHead>,
}

impl ComparisonReport {
    /// Snapshot `history` into a report.
    pub fn from_history(history: &ResultHistory) -> Self {
        Self::from_snapshots(history.snapshots())
    }

    pub fn from_snapshots(transports: Vec<TransportSnapshot>) -> Self {
        let latest = |transport: Transport| {
            transports
                .iter()
                .find(|s| s.transport == transport)
                .and_then(|s| s.last_result().cloned())
        };
        let head_to_head = match (latest(Transport::Stream), latest(Transport::Fabric)) {
            (Some(stream), Some(fabric)) => Some(HeadToHead::new(stream, fabric)),
            _ => None,
        };

        Self {
            report_id: Uuid::new_v4(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            transports,
            head_to_head,
        }
    }

    pub fn transport(&self, transport: Transport) -> Option<&TransportSnapshot> {
        self.transports.iter().find(|s| s.transport == transport)
    }

    /// Whether any transport produced a result.
    pub fn is_empty(&self) -> bool {
        self.transports.iter().all(|s| s.results.is_empty())
    }
}

/// Format a size given in MB (auto-selects KB/MB/GB).
pub fn format_size_mb(mb: f64) -> String {
    if mb < 1.0 {
        format!("{:.1} KB", mb * 1024.0)
    } else if mb < 1024.0 {
        format!("{:.1} MB", mb)
    } else {
        format!("{:.2} GB", mb / 1024.0)
    }
}

/// Format a throughput given in MB/s (auto-selects KB/s, MB/s, GB/s).
pub fn format_throughput(mbps: f64) -> String {
    if mbps < 1.0 {
        format!("{:.2} KB/s", mbps * 1024.0)
    } else if mbps < 1024.0 {
        format!("{:.2} MB/s", mbps)
    } else {
        format!("{:.2} GB/s", mbps / 1024.0)
    }
}

/// Format a latency given in microseconds. Zero means "not measured".
pub fn format_latency_us(us: f64) -> String {
    if us <= 0.0 {
        "n/a".to_string()
    } else if us < 1_000.0 {
        format!("{:.1}μs", us)
    } else if us < 1_000_000.0 {
        format!("{:.2}ms", us / 1_000.0)
    } else {
        format!("{:.2}s", us / 1_000_000.0)
    }
}
