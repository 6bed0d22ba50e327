//! xferbench Core Library
//!
//! Orchestrator for comparing a stream-socket transport against a fabric
//! transport. Provides process supervision, resource sampling, checksum
//! verification, payload-size sweeps, result history, and fabric readiness
//! detection/provisioning.

pub mod checksum;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod fabric;
pub mod history;
pub mod payload;
pub mod process;
pub mod sampler;
pub mod types;

// Re-export commonly used types
pub use checksum::IntegrityOutcome;
pub use config::{Config, ConfigLoader, FabricConfig, OrchestratorConfig};
pub use error::{
    ClientFailure, FabricError, HardValidationError, LaunchError, XferError, XferResult,
};
pub use events::{EventSink, RunEvent, StatusLevel};
pub use executor::{throughput_mbps, BenchmarkExecutor};
pub use fabric::{FabricReadinessManager, FabricReadinessState, FabricStatus};
pub use history::{BenchmarkResult, ResultHistory, SeriesKind, SeriesPoint, TransportSnapshot};
pub use process::{ProcessHandle, ProcessSupervisor, StopOutcome};
pub use types::{ProcessRole, TargetAddress, TransferJob, Transport};
