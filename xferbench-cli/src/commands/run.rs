// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `xferbench run` and `xferbench compare` - Benchmark one or both transports.
//!
//! Every transport runs on its own blocking worker while this task drains the
//! event channel and watches for Ctrl+C.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::task::JoinSet;

use xferbench_core::{
    BenchmarkExecutor, BenchmarkResult, Config, EventSink, FabricReadinessManager,
    ProcessSupervisor, ResultHistory, Transport,
};
use xferbench_report::{ComparisonReport, JsonReporter};

use crate::console;

pub async fn execute(
    config_path: &str,
    transports: &[Transport],
    target: &str,
    payload: &Path,
    sweep: bool,
    report_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    if !payload.is_file() {
        anyhow::bail!("Payload file not found: {}", payload.display());
    }

    tracing::info!(
        transports = ?transports,
        target = %target,
        payload = %payload.display(),
        sweep,
        "Starting benchmark"
    );

    let (sink, events) = EventSink::channel();
    let printer = console::spawn_printer(events);
    let executor = Arc::new(build_executor(config, sweep, sink));

    let results = run_transports(&executor, transports, target, payload).await?;
    let history = Arc::clone(executor.history());

    // The printer exits once the executor's sinks are gone.
    drop(executor);
    printer.await?;

    let report = ComparisonReport::from_history(&history);
    console::print_summary(&report);

    if let Some(dir) = report_dir {
        let reporter = JsonReporter::new(dir)
            .with_context(|| format!("Cannot create report directory {}", dir.display()))?;
        let path = reporter.save(&report)?;
        println!();
        println!("Report written to {}", path.display());
    }

    let failed = results.iter().filter(|r| r.is_none()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} transport run(s) failed", results.len());
    }
    Ok(())
}

fn build_executor(config: Config, sweep: bool, sink: EventSink) -> BenchmarkExecutor {
    let readiness = config
        .fabric
        .require_ready
        .then(|| FabricReadinessManager::from_config(&config.fabric).with_events(sink.clone()));

    let executor = BenchmarkExecutor::new(
        Arc::new(config),
        ProcessSupervisor::new_shared(),
        ResultHistory::new_shared(),
        sink,
    )
    .with_sweep(sweep);

    match readiness {
        Some(manager) => executor.with_readiness(Arc::new(Mutex::new(manager))),
        None => executor,
    }
}

/// Run each transport on a blocking worker. Ctrl+C stops every tracked
/// process once; the workers then finish on their own.
async fn run_transports(
    executor: &Arc<BenchmarkExecutor>,
    transports: &[Transport],
    target: &str,
    payload: &Path,
) -> anyhow::Result<Vec<Option<BenchmarkResult>>> {
    let mut workers = JoinSet::new();
    for &transport in transports {
        let executor = Arc::clone(executor);
        let target = target.to_string();
        let payload = payload.to_path_buf();
        workers.spawn_blocking(move || executor.run(transport, &target, &payload));
    }

    let mut results = Vec::with_capacity(transports.len());
    let mut interrupted = false;
    loop {
        tokio::select! {
            joined = workers.join_next() => match joined {
                Some(result) => results.push(result?),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                interrupted = true;
                println!();
                println!("Interrupted, stopping tracked processes...");
                tracing::info!("Shutting down benchmark");

                let executor = Arc::clone(executor);
                let outcomes = tokio::task::spawn_blocking(move || executor.shutdown()).await?;
                for (role, outcome) in outcomes {
                    println!("  {role}: {outcome:?}");
                }
            }
        }
    }

    Ok(results)
}
