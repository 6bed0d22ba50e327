//! Custom error types for xferbench.
//!
//! Every failure is an explicit enum variant. Library code never returns
//! `Box<dyn Error>` or `anyhow::Result`; the benchmark executor converts
//! these into status events at the run boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ProcessRole, Transport};

/// Top-level error type for the orchestrator.
#[derive(Debug, Error)]
pub enum XferError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Process Errors
    // =========================================================================
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("{0}")]
    ClientFailure(#[from] ClientFailure),

    // =========================================================================
    // Fabric Readiness Errors
    // =========================================================================
    #[error("Fabric error: {0}")]
    Fabric(#[from] FabricError),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl XferError {
    /// Wrap an IO error with a short description of what was being done.
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Hard validation errors reject a configuration before anything runs.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid transfer target: '{value}' - {reason}")]
    InvalidTarget { value: String, reason: String },
}

/// Errors starting an external process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Executable not found: {path}")]
    ExecutableNotFound { path: PathBuf },

    #[error("Executable is not executable: {path}")]
    NotExecutable { path: PathBuf },

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Role {role} is already held by live process {pid}")]
    RoleOccupied { role: ProcessRole, pid: u32 },
}

/// A transfer client exited unsuccessfully.
#[derive(Debug, Clone, Error)]
#[error("{transport} client failed (exit code {}): {stderr}", exit_code_label(.exit_code))]
pub struct ClientFailure {
    pub transport: Transport,
    /// `None` when the client was ended by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

/// Fabric readiness detection and provisioning errors.
#[derive(Debug, Clone, Error)]
pub enum FabricError {
    #[error("No usable network interface: default route and IPv4 address scan both came up empty")]
    NoInterface,

    #[error("Provisioning step '{step}' failed: {reason}")]
    ProvisionFailure { step: &'static str, reason: String },

    #[error("Fabric transport is not ready (state: {state})")]
    NotReady { state: &'static str },
}

/// State transition errors for the readiness state machine.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition readiness from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Result type alias using XferError.
pub type XferResult<T> = Result<T, XferError>;
