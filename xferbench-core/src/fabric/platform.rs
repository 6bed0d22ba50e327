// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Platform capabilities used by the readiness manager.
//!
//! [`PlatformProbe`] answers the three read-only questions (module loaded,
//! device present, device enumeration). [`FabricPlatform`] adds the mutating
//! steps used by provisioning. The Linux implementation shells out through a
//! [`CommandRunner`] so parsing can be tested without root or RDMA tooling.

use std::collections::BTreeSet;
use std::process::{Command, Stdio};

use crate::error::FabricError;

/// Captured result of one platform command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Failure text for status lines: stderr, falling back to stdout.
    pub fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs a platform command to completion.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput>;
}

/// Runs commands with `std::process::Command`, output captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Read-only readiness probes.
pub trait PlatformProbe: Send {
    /// Whether `module` appears in the kernel module table.
    fn module_loaded(&self, module: &str) -> bool;

    /// Whether `device` is registered as a fabric link.
    fn device_present(&self, device: &str) -> bool;

    /// Names of all fabric devices visible to userspace.
    fn enumerate_devices(&self) -> BTreeSet<String>;
}

/// Probes plus the mutating steps needed to provision readiness.
pub trait FabricPlatform: PlatformProbe {
    /// Outgoing interface of the default route, else the first interface
    /// with a non-loopback IPv4 address.
    fn default_interface(&self) -> Option<String>;

    fn load_module(&self, module: &str) -> Result<(), FabricError>;

    /// Create `device` bound to `interface`. An existing device is success.
    fn create_device(&self, device: &str, interface: &str) -> Result<(), FabricError>;
}

/// Linux implementation on top of `lsmod`, `rdma`, `ibv_devices`, `ip`
/// and `modprobe`.
#[derive(Debug)]
pub struct LinuxFabricPlatform<R = SystemCommandRunner> {
    runner: R,
    elevation: Option<String>,
}

impl LinuxFabricPlatform<SystemCommandRunner> {
    /// Mutating commands are wrapped in `elevation` unless the effective
    /// user is already root.
    pub fn new(elevation: &str) -> Self {
        let elevation = if nix::unistd::geteuid().is_root() {
            None
        } else {
            Some(elevation.to_string())
        };
        Self::with_runner(SystemCommandRunner, elevation)
    }
}

impl<R: CommandRunner> LinuxFabricPlatform<R> {
    pub fn with_runner(runner: R, elevation: Option<String>) -> Self {
        Self { runner, elevation }
    }

    /// Run a read-only query. A missing tool or non-zero exit yields `None`.
    fn query(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.runner.run(program, args) {
            Ok(output) if output.success => Some(output.stdout),
            Ok(output) => {
                tracing::debug!(program, stderr = %output.failure_text(), "Probe command failed");
                None
            }
            Err(e) => {
                tracing::debug!(program, error = %e, "Probe command unavailable");
                None
            }
        }
    }

    /// Run a mutating command, prefixed with the elevation wrapper if set.
    fn privileged(&self, step: &'static str, args: &[&str]) -> Result<CommandOutput, FabricError> {
        tracing::info!(
            step,
            command = %args.join(" "),
            elevated = self.elevation.is_some(),
            "Running provisioning command"
        );

        let result = match &self.elevation {
            Some(wrapper) => self.runner.run(wrapper, args),
            None => match args.split_first() {
                Some((program, rest)) => self.runner.run(program, rest),
                None => {
                    return Err(FabricError::ProvisionFailure {
                        step,
                        reason: "empty command".to_string(),
                    })
                }
            },
        };

        result.map_err(|e| FabricError::ProvisionFailure {
            step,
            reason: e.to_string(),
        })
    }
}

impl<R: CommandRunner> PlatformProbe for LinuxFabricPlatform<R> {
    fn module_loaded(&self, module: &str) -> bool {
        self.query("lsmod", &[])
            .is_some_and(|text| parse_module_table(&text, module))
    }

    fn device_present(&self, device: &str) -> bool {
        self.query("rdma", &["link", "show"])
            .is_some_and(|text| parse_link_registry(&text).contains(device))
    }

    fn enumerate_devices(&self) -> BTreeSet<String> {
        self.query("ibv_devices", &[])
            .map(|text| parse_device_enumeration(&text))
            .unwrap_or_default()
    }
}

impl<R: CommandRunner> FabricPlatform for LinuxFabricPlatform<R> {
    fn default_interface(&self) -> Option<String> {
        self.query("ip", &["route", "show", "default"])
            .and_then(|text| parse_default_route(&text))
            .or_else(|| {
                self.query("ip", &["-o", "-4", "addr", "show"])
                    .and_then(|text| parse_ipv4_interfaces(&text))
            })
    }

    fn load_module(&self, module: &str) -> Result<(), FabricError> {
        let output = self.privileged("load_module", &["modprobe", module])?;
        if output.success {
            Ok(())
        } else {
            Err(FabricError::ProvisionFailure {
                step: "load_module",
                reason: output.failure_text(),
            })
        }
    }

    fn create_device(&self, device: &str, interface: &str) -> Result<(), FabricError> {
        let output = self.privileged(
            "create_device",
            &["rdma", "link", "add", device, "type", "rxe", "netdev", interface],
        )?;

        if output.success || is_already_exists(&output.failure_text()) {
            Ok(())
        } else {
            Err(FabricError::ProvisionFailure {
                step: "create_device",
                reason: output.failure_text(),
            })
        }
    }
}

/// Whether `module` is listed in `lsmod` output. Dashes and underscores
/// are interchangeable in module names.
pub fn parse_module_table(text: &str, module: &str) -> bool {
    let wanted = module.replace('-', "_");
    text.lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name.replace('-', "_") == wanted)
}

/// Device names from `rdma link show` (`link rxe0/1 state ACTIVE ...`).
pub fn parse_link_registry(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("link") => tokens.next(),
                _ => None,
            }
        })
        .filter_map(|link| link.split('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Device names from `ibv_devices`, skipping the two header lines.
pub fn parse_device_enumeration(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "device" && !name.starts_with('-'))
        .map(str::to_string)
        .collect()
}

/// Interface after `dev` in the first `default` route entry.
pub fn parse_default_route(text: &str) -> Option<String> {
    text.lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|t| *t == "dev")?;
            tokens.next().map(str::to_string)
        })
}

/// First interface in `ip -o -4 addr show` output with a non-loopback
/// address.
pub fn parse_ipv4_interfaces(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let interface = tokens.get(1)?.trim_end_matches(':');
        let inet = tokens.iter().position(|t| *t == "inet")?;
        let address = tokens.get(inet + 1)?;

        if interface == "lo" || address.starts_with("127.") {
            None
        } else {
            Some(interface.to_string())
        }
    })
}

/// Failure text reporting that the device is already there.
pub fn is_already_exists(text: &str) -> bool {
    text.to_ascii_lowercase().contains("exists")
}
