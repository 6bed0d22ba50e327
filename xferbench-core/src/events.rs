// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Events emitted by the orchestrator for the presentation layer.
//!
//! The core never calls into the presentation layer. It pushes [`RunEvent`]s
//! onto an unbounded channel that the consumer drains on its own schedule.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::checksum::IntegrityOutcome;
use crate::fabric::FabricReadinessState;
use crate::history::{BenchmarkResult, SeriesKind, SeriesPoint};
use crate::process::StopOutcome;
use crate::types::{ProcessId, Transport};

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

/// A single orchestrator event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Human-readable progress or failure line.
    Status {
        transport: Option<Transport>,
        level: StatusLevel,
        message: String,
    },
    EndpointStarted {
        transport: Transport,
        pid: ProcessId,
    },
    EndpointStopped {
        transport: Transport,
        pid: ProcessId,
        outcome: StopOutcome,
    },
    Integrity {
        transport: Transport,
        payload_size_mb: f64,
        outcome: IntegrityOutcome,
    },
    SeriesPoint {
        transport: Transport,
        kind: SeriesKind,
        point: SeriesPoint,
    },
    ResultRecorded {
        result: BenchmarkResult,
    },
    Readiness {
        state: FabricReadinessState,
    },
    /// Always the last event of a run, success or not.
    RunFinished {
        transport: Transport,
    },
}

/// Sending half of the event channel.
///
/// A detached sink only logs. Sending on a closed channel is silently
/// dropped; a consumer that went away is not the orchestrator's failure.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<RunEvent>>,
}

impl EventSink {
    /// Create a connected sink and its receiver.
    pub fn channel() -> (Self, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink with no consumer.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: RunEvent) {
        log_event(&event);
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn status(&self, transport: Option<Transport>, level: StatusLevel, message: impl Into<String>) {
        self.emit(RunEvent::Status {
            transport,
            level,
            message: message.into(),
        });
    }

    pub fn info(&self, transport: Transport, message: impl Into<String>) {
        self.status(Some(transport), StatusLevel::Info, message);
    }

    pub fn warn(&self, transport: Transport, message: impl Into<String>) {
        self.status(Some(transport), StatusLevel::Warn, message);
    }

    pub fn error(&self, transport: Transport, message: impl Into<String>) {
        self.status(Some(transport), StatusLevel::Error, message);
    }
}

fn log_event(event: &RunEvent) {
    match event {
        RunEvent::Status {
            transport,
            level,
            message,
        } => {
            let transport = transport.map(|t| t.name()).unwrap_or("-");
            match level {
                StatusLevel::Info => tracing::info!(transport, "{message}"),
                StatusLevel::Warn => tracing::warn!(transport, "{message}"),
                StatusLevel::Error => tracing::error!(transport, "{message}"),
            }
        }
        other => tracing::debug!(event = ?other, "Run event"),
    }
}
