// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every section has defaults matching the stock endpoint layout, so an
//! empty document is a valid configuration. Invalid values produce a
//! HardValidationError before any process is started.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HardValidationError, LaunchError, XferError, XferResult};
use crate::process::LaunchSpec;
use crate::types::{ExecutablePath, Transport};

/// Upper bound for a single sweep payload.
const MAX_SWEEP_SIZE_MB: u64 = 4096;

// =============================================================================
// Raw (unvalidated) configuration
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    orchestrator: RawOrchestratorConfig,
    #[serde(default)]
    transports: RawTransports,
    #[serde(default)]
    fabric: RawFabricConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOrchestratorConfig {
    #[serde(default = "default_base_dir")]
    base_dir: String,
    #[serde(default = "default_logs_dir")]
    logs_dir: String,
    #[serde(default)]
    payload_dir: Option<String>,
    #[serde(default = "default_grace_period_ms")]
    grace_period_ms: u64,
    #[serde(default = "default_startup_delay_ms")]
    server_startup_delay_ms: u64,
    #[serde(default = "default_sweep_sizes")]
    sweep_sizes_mb: Vec<u64>,
    #[serde(default = "default_probe_flag")]
    probe_flag: String,
}

fn default_base_dir() -> String {
    ".".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_startup_delay_ms() -> u64 {
    500
}

fn default_sweep_sizes() -> Vec<u64> {
    vec![1, 10, 100]
}

fn default_probe_flag() -> String {
    "--rtt".to_string()
}

impl Default for RawOrchestratorConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            logs_dir: default_logs_dir(),
            payload_dir: None,
            grace_period_ms: default_grace_period_ms(),
            server_startup_delay_ms: default_startup_delay_ms(),
            sweep_sizes_mb: default_sweep_sizes(),
            probe_flag: default_probe_flag(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEndpoint {
    program: String,
    #[serde(default)]
    interpreter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransportConfig {
    server: RawEndpoint,
    client: RawEndpoint,
    received_candidates: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransports {
    #[serde(default = "default_stream")]
    stream: RawTransportConfig,
    #[serde(default = "default_fabric")]
    fabric: RawTransportConfig,
}

fn default_stream() -> RawTransportConfig {
    RawTransportConfig {
        server: RawEndpoint {
            program: "tcp_server.py".to_string(),
            interpreter: Some("python3".to_string()),
        },
        client: RawEndpoint {
            program: "tcp_client.py".to_string(),
            interpreter: Some("python3".to_string()),
        },
        received_candidates: vec!["logs/tcp_received_file.txt".to_string()],
    }
}

fn default_fabric() -> RawTransportConfig {
    RawTransportConfig {
        server: RawEndpoint {
            program: "rdma_file_server".to_string(),
            interpreter: None,
        },
        client: RawEndpoint {
            program: "rdma_file_client".to_string(),
            interpreter: None,
        },
        received_candidates: vec![
            "received_file.txt".to_string(),
            "logs/rdma_received_file.txt".to_string(),
            "received_file.bin".to_string(),
        ],
    }
}

impl Default for RawTransports {
    fn default() -> Self {
        Self {
            stream: default_stream(),
            fabric: default_fabric(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFabricConfig {
    #[serde(default = "default_module")]
    module: String,
    #[serde(default = "default_device")]
    device: String,
    #[serde(default = "default_elevation")]
    elevation: String,
    #[serde(default)]
    require_ready: bool,
}

fn default_module() -> String {
    "rdma_rxe".to_string()
}

fn default_device() -> String {
    "rxe0".to_string()
}

fn default_elevation() -> String {
    "sudo".to_string()
}

impl Default for RawFabricConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            device: default_device(),
            elevation: default_elevation(),
            require_ready: false,
        }
    }
}

// =============================================================================
// Validated configuration
// =============================================================================

/// How to launch one endpoint executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Program path, relative to the base directory unless absolute.
    pub program: PathBuf,
    /// Interpreter used to run the program, if it is a script.
    pub interpreter: Option<String>,
}

/// Server/client pair plus integrity check locations for one transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server: EndpointConfig,
    pub client: EndpointConfig,
    /// Candidate received-file paths, probed in order.
    pub received_candidates: Vec<PathBuf>,
}

/// Validated orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub base_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub payload_dir: PathBuf,
    pub grace_period_ms: u64,
    pub server_startup_delay_ms: u64,
    pub sweep_sizes_mb: Vec<u64>,
    pub probe_flag: String,
}

/// Validated fabric readiness settings.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub module: String,
    pub device: String,
    pub elevation: String,
    pub require_ready: bool,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    pub stream: TransportConfig,
    pub fabric_transport: TransportConfig,
    pub fabric: FabricConfig,
}

impl Default for Config {
    fn default() -> Self {
        let raw = RawConfig::default();
        let orchestrator = raw.orchestrator;
        Self {
            orchestrator: OrchestratorConfig {
                base_dir: PathBuf::from(orchestrator.base_dir),
                logs_dir: PathBuf::from(orchestrator.logs_dir),
                payload_dir: std::env::temp_dir(),
                grace_period_ms: orchestrator.grace_period_ms,
                server_startup_delay_ms: orchestrator.server_startup_delay_ms,
                sweep_sizes_mb: orchestrator.sweep_sizes_mb,
                probe_flag: orchestrator.probe_flag,
            },
            stream: raw.transports.stream.into(),
            fabric_transport: raw.transports.fabric.into(),
            fabric: FabricConfig {
                module: raw.fabric.module,
                device: raw.fabric.device,
                elevation: raw.fabric.elevation,
                require_ready: raw.fabric.require_ready,
            },
        }
    }
}

impl From<RawEndpoint> for EndpointConfig {
    fn from(raw: RawEndpoint) -> Self {
        Self {
            program: PathBuf::from(raw.program),
            interpreter: raw.interpreter.filter(|i| !i.trim().is_empty()),
        }
    }
}

impl From<RawTransportConfig> for TransportConfig {
    fn from(raw: RawTransportConfig) -> Self {
        Self {
            server: raw.server.into(),
            client: raw.client.into(),
            received_candidates: raw.received_candidates.into_iter().map(PathBuf::from).collect(),
        }
    }
}

impl Config {
    /// Transport-specific section.
    pub fn transport(&self, transport: Transport) -> &TransportConfig {
        match transport {
            Transport::Stream => &self.stream,
            Transport::Fabric => &self.fabric_transport,
        }
    }

    /// Resolve a path against the base directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.orchestrator.base_dir.join(path)
        }
    }

    /// Logs directory, resolved against the base directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(&self.orchestrator.logs_dir)
    }

    /// Received-file candidates for a transport, resolved and in probe order.
    pub fn received_candidates(&self, transport: Transport) -> Vec<PathBuf> {
        self.transport(transport)
            .received_candidates
            .iter()
            .map(|p| self.resolve(p))
            .collect()
    }

    /// Whether the local server executable for a transport is present.
    pub fn has_server(&self, transport: Transport) -> bool {
        self.server_spec(transport).is_ok()
    }

    /// Launch description for the local server of a transport.
    pub fn server_spec(&self, transport: Transport) -> Result<LaunchSpec, LaunchError> {
        self.endpoint_spec(&self.transport(transport).server, Vec::new())
    }

    /// Launch description for a client transfer (or latency probe).
    pub fn client_spec(
        &self,
        transport: Transport,
        target: &str,
        payload: &Path,
        probe: bool,
    ) -> Result<LaunchSpec, LaunchError> {
        let mut args = transport.client_args(target, payload);
        if probe {
            args.push(self.orchestrator.probe_flag.clone());
        }
        self.endpoint_spec(&self.transport(transport).client, args)
    }

    fn endpoint_spec(
        &self,
        endpoint: &EndpointConfig,
        args: Vec<String>,
    ) -> Result<LaunchSpec, LaunchError> {
        let program = self.resolve(&endpoint.program);
        let spec = match &endpoint.interpreter {
            Some(interpreter) => {
                let script = ExecutablePath::script(program)?;
                LaunchSpec::interpreted(interpreter.clone(), script, args)
            }
            None => LaunchSpec::new(ExecutablePath::new(program)?, args),
        };
        Ok(spec.working_dir(self.orchestrator.base_dir.clone()))
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> XferResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(XferError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| XferError::io("reading config file", e))?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> XferResult<Config> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Self::validate(RawConfig::default());
        }

        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| XferError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> XferResult<Config> {
        let orchestrator = Self::validate_orchestrator(raw.orchestrator)?;
        let stream = Self::validate_transport(raw.transports.stream, "stream")?;
        let fabric_transport = Self::validate_transport(raw.transports.fabric, "fabric")?;
        let fabric = Self::validate_fabric(raw.fabric)?;

        Ok(Config {
            orchestrator,
            stream,
            fabric_transport,
            fabric,
        })
    }

    fn validate_orchestrator(raw: RawOrchestratorConfig) -> XferResult<OrchestratorConfig> {
        if raw.base_dir.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "base_dir",
                value: raw.base_dir,
                reason: "Base directory cannot be empty".to_string(),
            }
            .into());
        }

        if raw.grace_period_ms == 0 || raw.grace_period_ms > 60_000 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "grace_period_ms",
                value: raw.grace_period_ms.to_string(),
                reason: "Must be between 1 and 60000".to_string(),
            }
            .into());
        }

        if raw.server_startup_delay_ms > 10_000 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "server_startup_delay_ms",
                value: raw.server_startup_delay_ms.to_string(),
                reason: "Must not exceed 10000".to_string(),
            }
            .into());
        }

        for size in &raw.sweep_sizes_mb {
            if *size == 0 || *size > MAX_SWEEP_SIZE_MB {
                return Err(HardValidationError::InvalidFieldValue {
                    field: "sweep_sizes_mb",
                    value: size.to_string(),
                    reason: format!("Each size must be between 1 and {} MB", MAX_SWEEP_SIZE_MB),
                }
                .into());
            }
        }

        if raw.probe_flag.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "probe_flag",
                value: raw.probe_flag,
                reason: "Probe flag cannot be empty".to_string(),
            }
            .into());
        }

        let payload_dir = raw
            .payload_dir
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        Ok(OrchestratorConfig {
            base_dir: PathBuf::from(raw.base_dir),
            logs_dir: PathBuf::from(raw.logs_dir),
            payload_dir,
            grace_period_ms: raw.grace_period_ms,
            server_startup_delay_ms: raw.server_startup_delay_ms,
            sweep_sizes_mb: raw.sweep_sizes_mb,
            probe_flag: raw.probe_flag,
        })
    }

    fn validate_transport(
        raw: RawTransportConfig,
        name: &'static str,
    ) -> XferResult<TransportConfig> {
        Self::validate_endpoint(&raw.server, name, "server")?;
        Self::validate_endpoint(&raw.client, name, "client")?;

        if raw.received_candidates.is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "received_candidates",
                context: format!("transport '{}'", name),
            }
            .into());
        }

        Ok(raw.into())
    }

    fn validate_endpoint(raw: &RawEndpoint, transport: &str, side: &str) -> XferResult<()> {
        if raw.program.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "program",
                context: format!("{} {}", transport, side),
            }
            .into());
        }
        Ok(())
    }

    fn validate_fabric(raw: RawFabricConfig) -> XferResult<FabricConfig> {
        let valid_name = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        };

        if !valid_name(&raw.module) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "module",
                value: raw.module,
                reason: "Module name must be alphanumeric (with '_' or '-')".to_string(),
            }
            .into());
        }

        if !valid_name(&raw.device) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "device",
                value: raw.device,
                reason: "Device name must be alphanumeric (with '_' or '-')".to_string(),
            }
            .into());
        }

        Ok(FabricConfig {
            module: raw.module,
            device: raw.device,
            elevation: raw.elevation.trim().to_string(),
            require_ready: raw.require_ready,
        })
    }
}
