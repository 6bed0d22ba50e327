// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark executor.
//!
//! Runs one transport end to end: optionally boots a local endpoint, times
//! the client while sampling it, probes half-RTT, verifies integrity, tears
//! the endpoint down, then sweeps synthetic payload sizes. Every failure is
//! turned into a status event at the `run()` boundary.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::checksum::{self, IntegrityOutcome};
use crate::config::Config;
use crate::error::{ClientFailure, FabricError, XferError, XferResult};
use crate::events::{EventSink, RunEvent};
use crate::fabric::{FabricReadinessManager, FabricReadinessState};
use crate::history::{BenchmarkResult, ResultHistory, SeriesKind, SeriesPoint};
use crate::payload::SyntheticPayload;
use crate::process::{lock, LaunchSpec, ProcessHandle, ProcessSupervisor, StopOutcome};
use crate::sampler::{ResourceSampler, ResourceUsage};
use crate::types::{human_readable_size, ProcessRole, TargetAddress, TransferJob, Transport, BYTES_PER_MB};

/// Throughput in MB/s. Zero or negative elapsed time yields `0.0`.
pub fn throughput_mbps(payload_size_mb: f64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 0.0 {
        0.0
    } else {
        payload_size_mb / elapsed_seconds
    }
}

/// Measurements of one client transfer.
#[derive(Debug, Clone)]
struct LegMeasurement {
    elapsed_seconds: f64,
    throughput_mbps: f64,
    usage: ResourceUsage,
    half_rtt_us: f64,
    integrity: IntegrityOutcome,
}

enum LegOutcome {
    Completed(LegMeasurement),
    ClientFailed(ClientFailure),
}

/// Exit status and timing of a finished client.
struct ClientRun {
    exit_code: Option<i32>,
    elapsed: Duration,
    usage: ResourceUsage,
    stderr: String,
}

/// Endpoint auto-started for one leg. Stopped exactly once, on the normal
/// path or when an early return drops it.
struct AutoStartedEndpoint<'a> {
    executor: &'a BenchmarkExecutor,
    transport: Transport,
    handle: Option<Arc<ProcessHandle>>,
}

impl<'a> AutoStartedEndpoint<'a> {
    fn none(executor: &'a BenchmarkExecutor, transport: Transport) -> Self {
        Self {
            executor,
            transport,
            handle: None,
        }
    }

    fn stop(&mut self) -> Option<StopOutcome> {
        let handle = self.handle.take()?;
        Some(self.executor.stop_handle(self.transport, &handle))
    }
}

impl Drop for AutoStartedEndpoint<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Orchestrates benchmark runs for both transports.
///
/// `run()` blocks; callers put it on a worker so their event loop stays
/// responsive. Runs for different transports may proceed concurrently.
pub struct BenchmarkExecutor {
    config: Arc<Config>,
    supervisor: Arc<ProcessSupervisor>,
    history: Arc<ResultHistory>,
    events: EventSink,
    readiness: Option<Arc<Mutex<FabricReadinessManager>>>,
    sweep: bool,
    cancelled: AtomicBool,
}

impl BenchmarkExecutor {
    pub fn new(
        config: Arc<Config>,
        supervisor: Arc<ProcessSupervisor>,
        history: Arc<ResultHistory>,
        events: EventSink,
    ) -> Self {
        Self {
            config,
            supervisor,
            history,
            events,
            readiness: None,
            sweep: true,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Consult `manager` before fabric runs when `fabric.require_ready` is set.
    pub fn with_readiness(mut self, manager: Arc<Mutex<FabricReadinessManager>>) -> Self {
        self.readiness = Some(manager);
        self
    }

    /// Enable or disable the payload-size sweep after the primary run.
    pub fn with_sweep(mut self, enabled: bool) -> Self {
        self.sweep = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn history(&self) -> &Arc<ResultHistory> {
        &self.history
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.orchestrator.grace_period_ms)
    }

    /// Latest primary result for a transport.
    pub fn last_result(&self, transport: Transport) -> Option<BenchmarkResult> {
        self.history.last_result(transport)
    }

    /// Benchmark `transport` against `target` with the file at `payload`.
    ///
    /// Never fails: problems are reported as status events and yield `None`.
    /// `RunFinished` is always the last event emitted.
    pub fn run(&self, transport: Transport, target: &str, payload: &Path) -> Option<BenchmarkResult> {
        // Endpoints run in base_dir, so a relative payload must not reach them as-is.
        let outcome = TargetAddress::new(target)
            .map_err(XferError::from)
            .and_then(|target| {
                let payload = std::path::absolute(payload)
                    .map_err(|e| XferError::io("resolving payload path", e))?;
                self.execute(&TransferJob::new(transport, payload, target))
            });

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.events
                    .error(transport, format!("{transport} run failed: {e}"));
                None
            }
        };

        self.events.emit(RunEvent::RunFinished { transport });
        result
    }

    /// Start the local endpoint for `transport` by hand. A running endpoint
    /// is reported and returned, not restarted.
    pub fn start_endpoint(&self, transport: Transport) -> Option<Arc<ProcessHandle>> {
        let role = transport.server_role();
        if let Some(handle) = self.supervisor.tracked(role) {
            self.events.info(
                transport,
                format!("{transport} server already running (pid {})", handle.pid()),
            );
            return Some(handle);
        }

        let started = self
            .config
            .server_spec(transport)
            .map_err(XferError::from)
            .and_then(|spec| self.spawn_endpoint(transport, &spec));

        match started {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.events
                    .error(transport, format!("Cannot start {transport} server: {e}"));
                None
            }
        }
    }

    /// Stop the local endpoint for `transport`, if one is running.
    pub fn stop_endpoint(&self, transport: Transport) -> Option<StopOutcome> {
        match self.supervisor.tracked(transport.server_role()) {
            Some(handle) => Some(self.stop_handle(transport, &handle)),
            None => {
                self.events
                    .info(transport, format!("{transport} server not running"));
                None
            }
        }
    }

    /// Cancel sampling and sweeps, then ask every tracked process to stop.
    pub fn shutdown(&self) -> Vec<(ProcessRole, StopOutcome)> {
        self.cancelled.store(true, Ordering::Release);
        self.supervisor.shutdown(self.grace_period())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn execute(&self, job: &TransferJob) -> XferResult<Option<BenchmarkResult>> {
        self.ensure_ready(job.transport)?;

        let logs_dir = self.config.logs_dir();
        std::fs::create_dir_all(&logs_dir)
            .map_err(|e| XferError::io("creating logs directory", e))?;

        let payload_bytes = std::fs::metadata(&job.payload_path)
            .map_err(|e| XferError::io("reading payload metadata", e))?
            .len();
        let payload_size_mb = payload_bytes as f64 / BYTES_PER_MB as f64;

        self.events.info(
            job.transport,
            format!(
                "Starting {} transfer of {} ({}) to {}",
                job.transport,
                job.payload_path.display(),
                human_readable_size(payload_bytes),
                job.target_address
            ),
        );

        let leg = match self.run_leg(job, &job.payload_path, payload_size_mb)? {
            LegOutcome::Completed(leg) => leg,
            LegOutcome::ClientFailed(failure) => {
                self.events.error(job.transport, failure.to_string());
                return Ok(None);
            }
        };

        let result = BenchmarkResult {
            transport: job.transport,
            payload_size_mb,
            elapsed_seconds: leg.elapsed_seconds,
            throughput_mbps: leg.throughput_mbps,
            avg_cpu_percent: leg.usage.avg_cpu_percent,
            avg_memory_mb: leg.usage.avg_memory_mb,
            half_rtt_us: leg.half_rtt_us,
            integrity: leg.integrity,
            recorded_at: Utc::now(),
        };

        self.events.info(
            job.transport,
            format!(
                "{} transfer complete in {:.3}s: {:.2} MB/s, CPU {:.1}%, RAM {:.1} MB, half-RTT {:.1} us",
                job.transport,
                result.elapsed_seconds,
                result.throughput_mbps,
                result.avg_cpu_percent,
                result.avg_memory_mb,
                result.half_rtt_us
            ),
        );

        if self.sweep {
            self.run_sweep(job)?;
        }

        self.history.append_result(result.clone());
        self.events.emit(RunEvent::ResultRecorded {
            result: result.clone(),
        });

        Ok(Some(result))
    }

    /// Fail fast on a fabric run when readiness is required and absent.
    fn ensure_ready(&self, transport: Transport) -> XferResult<()> {
        if transport != Transport::Fabric || !self.config.fabric.require_ready {
            return Ok(());
        }
        let Some(readiness) = &self.readiness else {
            tracing::debug!("No readiness manager attached; skipping fabric gate");
            return Ok(());
        };

        let mut manager = lock(readiness);
        let state = if manager.is_ready() {
            FabricReadinessState::Ready
        } else {
            manager.check()?
        };

        if state == FabricReadinessState::Ready {
            Ok(())
        } else {
            Err(FabricError::NotReady { state: state.name() }.into())
        }
    }

    /// One timed transfer with its probe and integrity check.
    fn run_leg(
        &self,
        job: &TransferJob,
        payload: &Path,
        payload_size_mb: f64,
    ) -> XferResult<LegOutcome> {
        let transport = job.transport;
        let target = job.target_address.as_str();
        let mut endpoint = self.boot_local_endpoint(job)?;

        let spec = self.config.client_spec(transport, target, payload, false)?;
        let client = self.measure_client(transport, &spec)?;

        if client.exit_code != Some(0) {
            return Ok(LegOutcome::ClientFailed(ClientFailure {
                transport,
                exit_code: client.exit_code,
                stderr: client.stderr.trim().to_string(),
            }));
        }

        let elapsed_seconds = client.elapsed.as_secs_f64();
        let throughput = throughput_mbps(payload_size_mb, elapsed_seconds);
        let half_rtt_us = self.probe_half_rtt(transport, target, payload);

        let integrity =
            checksum::verify_received(payload, &self.config.received_candidates(transport))?;
        let message = format!("Integrity check: {integrity}");
        match integrity {
            IntegrityOutcome::Match { .. } => self.events.info(transport, message),
            _ => self.events.warn(transport, message),
        }
        self.events.emit(RunEvent::Integrity {
            transport,
            payload_size_mb,
            outcome: integrity.clone(),
        });

        endpoint.stop();

        Ok(LegOutcome::Completed(LegMeasurement {
            elapsed_seconds,
            throughput_mbps: throughput,
            usage: client.usage,
            half_rtt_us,
            integrity,
        }))
    }

    /// Start a local endpoint when the target is this host and the server
    /// executable exists. A manually started endpoint is reused and left up.
    fn boot_local_endpoint(&self, job: &TransferJob) -> XferResult<AutoStartedEndpoint<'_>> {
        let transport = job.transport;
        let mut endpoint = AutoStartedEndpoint::none(self, transport);

        if !job.is_local {
            tracing::debug!(target = %job.target_address, "Remote target; not starting an endpoint");
            return Ok(endpoint);
        }

        if let Some(handle) = self.supervisor.tracked(transport.server_role()) {
            self.events.info(
                transport,
                format!("Using running {transport} server (pid {})", handle.pid()),
            );
            return Ok(endpoint);
        }

        let spec = match self.config.server_spec(transport) {
            Ok(spec) => spec,
            Err(e) => {
                self.events.warn(
                    transport,
                    format!("No local {transport} server ({e}); assuming one is already listening"),
                );
                return Ok(endpoint);
            }
        };

        let handle = self.spawn_endpoint(transport, &spec)?;
        endpoint.handle = Some(Arc::clone(&handle));

        std::thread::sleep(Duration::from_millis(
            self.config.orchestrator.server_startup_delay_ms,
        ));
        if !handle.is_alive() {
            self.events.warn(
                transport,
                format!(
                    "{transport} server exited during startup: {}",
                    handle.stderr_text().trim()
                ),
            );
        }

        Ok(endpoint)
    }

    fn spawn_endpoint(
        &self,
        transport: Transport,
        spec: &LaunchSpec,
    ) -> XferResult<Arc<ProcessHandle>> {
        let handle = self.supervisor.start(transport.server_role(), spec)?;
        self.events.info(
            transport,
            format!("{transport} server started (pid {})", handle.pid()),
        );
        self.events.emit(RunEvent::EndpointStarted {
            transport,
            pid: handle.pid(),
        });
        Ok(handle)
    }

    fn stop_handle(&self, transport: Transport, handle: &ProcessHandle) -> StopOutcome {
        let outcome = self.supervisor.stop(handle, self.grace_period());
        match outcome {
            StopOutcome::StillRunning => self.events.warn(
                transport,
                format!(
                    "{transport} server (pid {}) ignored the termination request",
                    handle.pid()
                ),
            ),
            _ => self.events.info(
                transport,
                format!(
                    "{transport} server stopped after {:.1}s",
                    handle.uptime().as_secs_f64()
                ),
            ),
        }
        self.events.emit(RunEvent::EndpointStopped {
            transport,
            pid: handle.pid(),
            outcome,
        });
        outcome
    }

    /// Run the client to completion, sampling it concurrently.
    fn measure_client(&self, transport: Transport, spec: &LaunchSpec) -> XferResult<ClientRun> {
        let role = transport.client_role();
        let handle = self.supervisor.start(role, spec)?;
        tracing::debug!(
            transport = %transport,
            pid = %handle.pid(),
            command = handle.command(),
            "Client launched"
        );

        let started = Instant::now();
        let (exit_code, elapsed, usage) = std::thread::scope(|s| {
            let sampler = s.spawn(|| ResourceSampler::new().sample(&handle, &self.cancelled));
            let exit_code = handle.wait();
            let elapsed = started.elapsed();
            let usage = sampler.join().unwrap_or_default();
            (exit_code, elapsed, usage)
        });
        self.supervisor.release(role);

        let stderr = if exit_code == Some(0) {
            String::new()
        } else {
            handle.stderr_text()
        };

        Ok(ClientRun {
            exit_code,
            elapsed,
            usage,
            stderr,
        })
    }

    /// Half of the probe-mode round trip in microseconds, or `0.0` when the
    /// client has no probe mode or the probe fails.
    fn probe_half_rtt(&self, transport: Transport, target: &str, payload: &Path) -> f64 {
        let role = transport.client_role();
        let handle = match self
            .config
            .client_spec(transport, target, payload, true)
            .and_then(|spec| self.supervisor.start(role, &spec))
        {
            Ok(handle) => handle,
            Err(e) => {
                tracing::debug!(transport = %transport, error = %e, "Latency probe not started");
                return 0.0;
            }
        };

        let started = Instant::now();
        let exit_code = handle.wait();
        let round_trip = started.elapsed();
        self.supervisor.release(role);

        if exit_code == Some(0) {
            round_trip.as_secs_f64() * 1_000_000.0 / 2.0
        } else {
            tracing::debug!(
                transport = %transport,
                exit_code = ?exit_code,
                "Latency probe unsupported or failed; reporting 0"
            );
            0.0
        }
    }

    /// Repeat the transfer for each synthetic payload size.
    fn run_sweep(&self, job: &TransferJob) -> XferResult<()> {
        let transport = job.transport;
        let payload_dir = self.config.resolve(&self.config.orchestrator.payload_dir);
        std::fs::create_dir_all(&payload_dir)
            .map_err(|e| XferError::io("creating payload directory", e))?;

        for &size_mb in &self.config.orchestrator.sweep_sizes_mb {
            if self.is_cancelled() {
                self.events.warn(transport, "Sweep cancelled");
                break;
            }

            let payload = SyntheticPayload::create(&payload_dir, size_mb)?;
            self.events
                .info(transport, format!("Sweep: {size_mb} MB payload"));

            match self.run_leg(job, payload.path(), size_mb as f64)? {
                LegOutcome::Completed(leg) => {
                    self.record_point(transport, SeriesKind::Bandwidth, size_mb, leg.throughput_mbps);
                    self.record_point(transport, SeriesKind::HalfRtt, size_mb, leg.half_rtt_us);
                }
                LegOutcome::ClientFailed(failure) => {
                    self.events.warn(
                        transport,
                        format!("Sweep point {size_mb} MB skipped: {failure}"),
                    );
                }
            }

            // Early returns above drop the payload, which deletes it silently.
            if let Err(e) = payload.remove() {
                self.events.warn(transport, format!("Sweep payload not removed: {e}"));
            }
        }

        Ok(())
    }

    fn record_point(&self, transport: Transport, kind: SeriesKind, size_mb: u64, value: f64) {
        let point = SeriesPoint::new(size_mb as f64, value);
        self.history.append_point(transport, kind, point);
        self.events.emit(RunEvent::SeriesPoint {
            transport,
            kind,
            point,
        });
    }
}

impl std::fmt::Debug for BenchmarkExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkExecutor")
            .field("base_dir", &self.config.orchestrator.base_dir)
            .field("sweep", &self.sweep)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::fabric::{FabricPlatform, PlatformProbe};
    use std::collections::BTreeSet;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.orchestrator.base_dir = dir.to_path_buf();
        config.orchestrator.payload_dir = dir.to_path_buf();
        config.orchestrator.server_startup_delay_ms = 50;
        config.orchestrator.grace_period_ms = 2000;
        for transport in [&mut config.stream, &mut config.fabric_transport] {
            transport.server = EndpointConfig {
                program: PathBuf::from("server.sh"),
                interpreter: None,
            };
            transport.client = EndpointConfig {
                program: PathBuf::from("client.sh"),
                interpreter: None,
            };
            transport.received_candidates = vec![PathBuf::from("logs/received.bin")];
        }
        config
    }

    fn executor(config: Config) -> (BenchmarkExecutor, UnboundedReceiver<RunEvent>) {
        let (events, rx) = EventSink::channel();
        let executor = BenchmarkExecutor::new(
            Arc::new(config),
            ProcessSupervisor::new_shared(),
            ResultHistory::new_shared(),
            events,
        )
        .with_sweep(false);
        (executor, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_throughput_zero_elapsed() {
        assert_eq!(throughput_mbps(5.0, 0.0), 0.0);
        assert_eq!(throughput_mbps(5.0, -1.0), 0.0);
        assert!((throughput_mbps(10.0, 2.0) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_endpoint_control() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "server.sh", "exec sleep 30");
        let (executor, mut rx) = executor(test_config(dir.path()));

        let first = executor.start_endpoint(Transport::Stream).unwrap();
        let second = executor.start_endpoint(Transport::Stream).unwrap();
        assert_eq!(first.pid(), second.pid());

        assert_eq!(
            executor.stop_endpoint(Transport::Stream),
            Some(StopOutcome::Stopped)
        );
        assert_eq!(executor.stop_endpoint(Transport::Stream), None);

        let events = drain(&mut rx);
        let started = events
            .iter()
            .filter(|e| matches!(e, RunEvent::EndpointStarted { .. }))
            .count();
        assert_eq!(started, 1);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { message, .. } if message.contains("already running")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { message, .. } if message.contains("not running")
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { message, .. } if message.contains("server stopped after")
        )));
    }

    #[test]
    fn test_start_missing_endpoint_is_reported() {
        let dir = TempDir::new().unwrap();
        let (executor, mut rx) = executor(test_config(dir.path()));

        assert!(executor.start_endpoint(Transport::Fabric).is_none());
        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { level: crate::events::StatusLevel::Error, message, .. }
                if message.contains("Cannot start RDMA server")
        )));
    }

    #[test]
    fn test_client_failure_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "client.sh", "echo 'connection refused' >&2\nexit 3");
        let payload = write_script(dir.path(), "payload.bin", "payload");
        let (executor, mut rx) = executor(test_config(dir.path()));

        let result = executor.run(Transport::Stream, "10.0.0.7", &payload);
        assert!(result.is_none());
        assert_eq!(executor.history().result_count(Transport::Stream), 0);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { message, .. }
                if message.contains("exit code 3") && message.contains("connection refused")
        )));
        assert_eq!(
            events.last(),
            Some(&RunEvent::RunFinished {
                transport: Transport::Stream
            })
        );
    }

    #[test]
    fn test_relative_payload_resolved_before_launch() {
        let dir = TempDir::new().unwrap();
        write_script(
            dir.path(),
            "client.sh",
            "[ \"$3\" = \"--rtt\" ] && exit 0\nmkdir -p logs && cp \"$1\" logs/received.bin",
        );
        let (executor, _rx) = executor(test_config(dir.path()));

        // Relative to the test's working directory, not to base_dir.
        let payload = Path::new("Cargo.toml");
        assert!(!dir.path().join(payload).exists());

        let result = executor
            .run(Transport::Stream, "192.0.2.5", payload)
            .expect("relative payload should be resolved");
        assert_eq!(result.integrity.label(), "MATCH");
        assert!(result.payload_size_mb > 0.0);
    }

    #[test]
    fn test_invalid_target_reported() {
        let dir = TempDir::new().unwrap();
        let payload = write_script(dir.path(), "payload.bin", "payload");
        let (executor, mut rx) = executor(test_config(dir.path()));

        assert!(executor.run(Transport::Stream, "   ", &payload).is_none());
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RunEvent::Status { .. }));
    }

    #[test]
    fn test_probe_without_support_is_zero() {
        let dir = TempDir::new().unwrap();
        // Succeeds for the transfer, rejects the probe flag.
        write_script(
            dir.path(),
            "client.sh",
            "[ \"$3\" = \"--rtt\" ] && exit 2\nmkdir -p logs && cp \"$1\" logs/received.bin",
        );
        let payload = write_script(dir.path(), "payload.bin", "payload");
        let (executor, _rx) = executor(test_config(dir.path()));

        let result = executor
            .run(Transport::Stream, "192.0.2.10", &payload)
            .unwrap();
        assert_eq!(result.half_rtt_us, 0.0);
        assert_eq!(result.integrity.label(), "MATCH");
    }

    struct NotReadyPlatform;

    impl PlatformProbe for NotReadyPlatform {
        fn module_loaded(&self, _module: &str) -> bool {
            true
        }

        fn device_present(&self, _device: &str) -> bool {
            false
        }

        fn enumerate_devices(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }
    }

    impl FabricPlatform for NotReadyPlatform {
        fn default_interface(&self) -> Option<String> {
            None
        }

        fn load_module(&self, _module: &str) -> Result<(), FabricError> {
            Ok(())
        }

        fn create_device(&self, _device: &str, _interface: &str) -> Result<(), FabricError> {
            Ok(())
        }
    }

    #[test]
    fn test_required_readiness_blocks_fabric_run() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "client.sh", "touch client-ran");
        let payload = write_script(dir.path(), "payload.bin", "payload");
        let mut config = test_config(dir.path());
        config.fabric.require_ready = true;

        let manager = FabricReadinessManager::new(Box::new(NotReadyPlatform), &config.fabric);
        let (executor, mut rx) = executor(config);
        let executor = executor.with_readiness(Arc::new(Mutex::new(manager)));

        assert!(executor
            .run(Transport::Fabric, "192.0.2.10", &payload)
            .is_none());
        assert!(!dir.path().join("client-ran").exists());

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            RunEvent::Status { message, .. } if message.contains("DEVICE_MISSING")
        )));
    }
}
