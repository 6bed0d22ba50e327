// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `xferbench serve` command - Keep a local endpoint up for remote clients.

use std::sync::Arc;
use std::time::Duration;

use xferbench_core::{
    BenchmarkExecutor, EventSink, ProcessSupervisor, ResultHistory, StopOutcome, Transport,
};

use crate::console;

const LIVENESS_POLL: Duration = Duration::from_millis(500);

pub async fn execute(config_path: &str, transport: Transport) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    tracing::info!(transport = %transport, "Starting endpoint");

    let (sink, events) = EventSink::channel();
    let printer = console::spawn_printer(events);
    let executor = Arc::new(BenchmarkExecutor::new(
        Arc::new(config),
        ProcessSupervisor::new_shared(),
        ResultHistory::new_shared(),
        sink,
    ));

    let starter = Arc::clone(&executor);
    let started = tokio::task::spawn_blocking(move || starter.start_endpoint(transport)).await?;
    let Some(handle) = started else {
        drop(executor);
        printer.await?;
        anyhow::bail!("{transport} server did not start");
    };

    println!();
    println!("{transport} server running (PID: {})", handle.pid());
    println!("Press Ctrl+C to stop...");
    println!();

    // Wait for shutdown signal or an endpoint that exits on its own
    let mut poll = tokio::time::interval(LIVENESS_POLL);
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = poll.tick() => {
                if !handle.is_alive() {
                    println!("{transport} server exited on its own");
                    break;
                }
            }
        }
    }

    println!();
    println!("Shutting down...");
    let stopper = Arc::clone(&executor);
    let outcome = tokio::task::spawn_blocking(move || stopper.stop_endpoint(transport)).await?;

    drop(executor);
    printer.await?;

    match outcome {
        Some(StopOutcome::StillRunning) => {
            anyhow::bail!("{transport} server (PID: {}) ignored SIGTERM", handle.pid())
        }
        _ => {
            println!("✓ {transport} server stopped");
            Ok(())
        }
    }
}
