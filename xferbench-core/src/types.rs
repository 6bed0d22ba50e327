// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers and small domain enums.
//!
//! Types validate their invariants at construction so the rest of the
//! crate can take them at face value.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HardValidationError, LaunchError};

/// Bytes per megabyte used for every size/throughput figure.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// The two transports being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Plain byte-stream socket transfer (baseline).
    Stream,
    /// Kernel-bypass fabric transfer (RDMA over soft RoCE).
    Fabric,
}

impl Transport {
    /// Both transports, in display order.
    pub const ALL: [Transport; 2] = [Transport::Stream, Transport::Fabric];

    /// Get the transport name for status lines.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stream => "TCP",
            Self::Fabric => "RDMA",
        }
    }

    /// Role of the receiving endpoint for this transport.
    pub const fn server_role(&self) -> ProcessRole {
        match self {
            Self::Stream => ProcessRole::StreamServer,
            Self::Fabric => ProcessRole::FabricServer,
        }
    }

    /// Role of the sending client for this transport.
    pub const fn client_role(&self) -> ProcessRole {
        match self {
            Self::Stream => ProcessRole::StreamClient,
            Self::Fabric => ProcessRole::FabricClient,
        }
    }

    /// Build the client argument list for this transport.
    ///
    /// The stream client takes `<payload> <target>`, the fabric client takes
    /// `<target> <payload>`.
    pub fn client_args(&self, target: &str, payload: &Path) -> Vec<String> {
        let payload = payload.to_string_lossy().into_owned();
        match self {
            Self::Stream => vec![payload, target.to_string()],
            Self::Fabric => vec![target.to_string(), payload],
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Slot in the process registry. At most one live process per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessRole {
    StreamServer,
    FabricServer,
    StreamClient,
    FabricClient,
}

impl ProcessRole {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StreamServer => "stream-server",
            Self::FabricServer => "fabric-server",
            Self::StreamClient => "stream-client",
            Self::FabricClient => "fabric-client",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Validated process ID.
/// Must be positive (non-zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Create a new ProcessId with validation.
    pub fn new(pid: u32) -> Result<Self, HardValidationError> {
        if pid == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "process_id",
                value: "0".to_string(),
                reason: "Process ID 0 is reserved".to_string(),
            });
        }
        Ok(Self(pid))
    }

    /// Get the inner PID value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Path to a file that exists and can be launched.
///
/// Scripts launched through an interpreter only need to exist; everything
/// else must carry an executable bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePath(PathBuf);

impl ExecutablePath {
    /// Validate a directly executed program.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LaunchError> {
        let path = Self::existing(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = path.0.metadata() {
                if metadata.is_dir() || metadata.permissions().mode() & 0o111 == 0 {
                    return Err(LaunchError::NotExecutable { path: path.0 });
                }
            }
        }

        Ok(path)
    }

    /// Validate a script handed to an interpreter (existence only).
    pub fn script(path: impl Into<PathBuf>) -> Result<Self, LaunchError> {
        Self::existing(path)
    }

    fn existing(path: impl Into<PathBuf>) -> Result<Self, LaunchError> {
        let path = path.into();
        if !path.exists() {
            return Err(LaunchError::ExecutableNotFound { path });
        }
        Ok(Self(path))
    }

    /// Get the inner path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ExecutablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A validated transfer target (IP address or host name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetAddress(String);

impl TargetAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, HardValidationError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(HardValidationError::InvalidTarget {
                value,
                reason: "Enter a server IP or host name".to_string(),
            });
        }

        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(HardValidationError::InvalidTarget {
                value,
                reason: "Target must not contain whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the target denotes this host.
    pub fn is_local(&self) -> bool {
        matches!(self.0.as_str(), "127.0.0.1" | "localhost" | "::1")
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TargetAddress {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetAddress> for String {
    fn from(target: TargetAddress) -> Self {
        target.0
    }
}

/// One benchmark invocation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub transport: Transport,
    pub payload_path: PathBuf,
    pub target_address: TargetAddress,
    pub is_local: bool,
}

impl TransferJob {
    pub fn new(transport: Transport, payload_path: impl Into<PathBuf>, target: TargetAddress) -> Self {
        let is_local = target.is_local();
        Self {
            transport,
            payload_path: payload_path.into(),
            target_address: target,
            is_local,
        }
    }
}

/// Human-readable byte count (`1.5 MB`).
pub fn human_readable_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} PB", value)
}
