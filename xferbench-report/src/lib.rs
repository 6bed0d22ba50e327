// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! xferbench Reports
//!
//! Turns a result history into a comparison report (host information,
//! per-transport results, bandwidth and half-RTT series sorted by payload
//! size) and persists it as timestamped JSON for later plotting.

pub mod metrics;
pub mod reporter;

pub use metrics::{
    format_latency_us, format_size_mb, format_throughput, ComparisonReport, HeadToHead,
    SystemInfo,
};
pub use reporter::{JsonReporter, ReporterError};
