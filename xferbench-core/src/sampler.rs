// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CPU and memory sampling of a running transfer client.
//!
//! The sampler runs next to the blocking wait on the client and stops when
//! the handle reports the process finished, when the process vanishes from
//! the process table, or when the cancellation flag is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use sysinfo::{Pid, System};

use crate::process::ProcessHandle;
use crate::types::BYTES_PER_MB;

/// Fixed sampling interval. CPU percent is measured over this window.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// One instantaneous observation.
#[derive(Debug, Clone, Copy)]
pub struct MetricSample {
    pub timestamp: Instant,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

/// Averaged resource usage over one client run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub avg_cpu_percent: f64,
    pub avg_memory_mb: f64,
    pub samples: usize,
}

impl ResourceUsage {
    /// Arithmetic mean of each series. Zero samples give `(0.0, 0.0)`.
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f64;
        let cpu_sum: f64 = samples.iter().map(|s| s.cpu_percent).sum();
        let mem_sum: f64 = samples
            .iter()
            .map(|s| s.memory_bytes as f64 / BYTES_PER_MB as f64)
            .sum();

        Self {
            avg_cpu_percent: cpu_sum / count,
            avg_memory_mb: mem_sum / count,
            samples: samples.len(),
        }
    }
}

/// Periodic per-process sampler backed by `sysinfo`.
pub struct ResourceSampler {
    interval: Duration,
    system: System,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self::with_interval(SAMPLE_INTERVAL)
    }

    /// Sampler with a custom interval (tests only use this to go faster).
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            system: System::new(),
        }
    }

    /// Sample `handle` until it exits or `cancel` is set, then average.
    pub fn sample(&mut self, handle: &ProcessHandle, cancel: &AtomicBool) -> ResourceUsage {
        let samples = self.collect(handle, cancel);
        let usage = ResourceUsage::from_samples(&samples);

        tracing::debug!(
            pid = %handle.pid(),
            samples = usage.samples,
            avg_cpu_percent = usage.avg_cpu_percent,
            avg_memory_mb = usage.avg_memory_mb,
            "Resource sampling finished"
        );

        usage
    }

    fn collect(&mut self, handle: &ProcessHandle, cancel: &AtomicBool) -> Vec<MetricSample> {
        let pid = Pid::from_u32(handle.pid().value());
        let mut samples = Vec::new();

        let should_stop = || cancel.load(Ordering::Acquire) || !handle.is_alive();

        if should_stop() {
            return samples;
        }

        // Prime the CPU counters so the first tick has a baseline window.
        if !self.system.refresh_process(pid) {
            return samples;
        }

        loop {
            std::thread::sleep(self.interval);
            if should_stop() {
                break;
            }

            if !self.system.refresh_process(pid) {
                break;
            }
            let Some(process) = self.system.process(pid) else {
                break;
            };

            samples.push(MetricSample {
                timestamp: Instant::now(),
                cpu_percent: f64::from(process.cpu_usage()),
                memory_bytes: process.memory(),
            });
        }

        samples
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}
