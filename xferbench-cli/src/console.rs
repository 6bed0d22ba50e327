// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Terminal output: timestamped event lines and the end-of-run summary.

use chrono::Local;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use xferbench_core::{RunEvent, SeriesKind, StatusLevel, StopOutcome, Transport};
use xferbench_report::{
    format_latency_us, format_size_mb, format_throughput, ComparisonReport,
};

/// Print every event until all senders are gone.
pub fn spawn_printer(mut events: UnboundedReceiver<RunEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = render(&event) {
                println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
            }
        }
    })
}

/// One status line for an event, or `None` for events that are not shown.
pub fn render(event: &RunEvent) -> Option<String> {
    let line = match event {
        RunEvent::Status { level, message, .. } => match level {
            StatusLevel::Info => message.clone(),
            StatusLevel::Warn => format!("⚠ {message}"),
            StatusLevel::Error => format!("✗ {message}"),
        },
        RunEvent::EndpointStarted { transport, pid } => {
            format!("▶ {transport} server started (PID: {pid})")
        }
        RunEvent::EndpointStopped {
            transport,
            pid,
            outcome,
        } => match outcome {
            StopOutcome::Stopped => format!("■ {transport} server stopped (PID: {pid})"),
            StopOutcome::AlreadyExited => {
                format!("■ {transport} server had already exited (PID: {pid})")
            }
            StopOutcome::StillRunning => {
                format!("⚠ {transport} server ignored SIGTERM (PID: {pid})")
            }
        },
        RunEvent::Integrity {
            transport,
            payload_size_mb,
            outcome,
        } => format!(
            "{transport} integrity [{}]: {}",
            format_size_mb(*payload_size_mb),
            outcome.label()
        ),
        RunEvent::SeriesPoint {
            transport,
            kind,
            point,
        } => {
            let value = match kind {
                SeriesKind::Bandwidth => format_throughput(point.value),
                SeriesKind::HalfRtt => format_latency_us(point.value),
            };
            format!(
                "{transport} {} @ {}: {value}",
                kind.name(),
                format_size_mb(point.payload_size_mb)
            )
        }
        RunEvent::ResultRecorded { result } => format!(
            "✓ {}: {} in {:.3}s",
            result.transport,
            format_throughput(result.throughput_mbps),
            result.elapsed_seconds
        ),
        RunEvent::Readiness { state } => format!("Fabric readiness: {}", state.name()),
        RunEvent::RunFinished { .. } => return None,
    };
    Some(line)
}

/// Print the latest result of each transport and the head-to-head ratios.
pub fn print_summary(report: &ComparisonReport) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                   TRANSFER BENCHMARK SUMMARY                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");

    if report.is_empty() {
        println!("  No successful runs.");
        return;
    }

    println!(
        "  {:<6} {:>10} {:>14} {:>10} {:>10} {:>12} {:>10}",
        "", "Payload", "Throughput", "Time", "CPU", "Memory", "Half-RTT"
    );
    for snapshot in &report.transports {
        let Some(result) = snapshot.last_result() else {
            continue;
        };
        println!(
            "  {:<6} {:>10} {:>14} {:>9.3}s {:>9.1}% {:>9.1} MB {:>10}   {}",
            snapshot.transport.name(),
            format_size_mb(result.payload_size_mb),
            format_throughput(result.throughput_mbps),
            result.elapsed_seconds,
            result.avg_cpu_percent,
            result.avg_memory_mb,
            format_latency_us(result.half_rtt_us),
            result.integrity.label()
        );
    }

    for snapshot in &report.transports {
        if snapshot.bandwidth.is_empty() {
            continue;
        }
        println!();
        println!("  {} sweep:", snapshot.transport.name());
        for point in &snapshot.bandwidth {
            let rtt = snapshot
                .half_rtt
                .iter()
                .find(|p| p.payload_size_mb == point.payload_size_mb)
                .map(|p| format_latency_us(p.value))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "    {:>10}  {:>14}  {:>10}",
                format_size_mb(point.payload_size_mb),
                format_throughput(point.value),
                rtt
            );
        }
    }

    if let Some(h2h) = &report.head_to_head {
        println!();
        if let Some(ratio) = h2h.throughput_ratio {
            println!(
                "  {} throughput is {ratio:.2}x {}",
                Transport::Fabric.name(),
                Transport::Stream.name()
            );
        }
        if let Some(ratio) = h2h.latency_ratio {
            println!(
                "  {} half-RTT is {ratio:.2}x lower than {}",
                Transport::Fabric.name(),
                Transport::Stream.name()
            );
        }
    }
}
