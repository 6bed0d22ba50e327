// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fabric readiness detection and provisioning.
//!
//! The manager drives [`ReadinessStateMachine`] from explicit `check()` and
//! `provision()` calls. All host interaction goes through a
//! [`FabricPlatform`], so the transitions are independent of the tooling.

use std::collections::BTreeSet;

use serde::Serialize;

use super::platform::{FabricPlatform, LinuxFabricPlatform};
use super::state::{FabricReadinessState, ReadinessStateMachine};
use crate::config::FabricConfig;
use crate::error::{FabricError, XferError, XferResult};
use crate::events::{EventSink, RunEvent};
use crate::types::Transport;

/// Result of the most recent probe. Recomputed on every check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FabricStatus {
    pub kernel_module_loaded: bool,
    pub virtual_device_present: bool,
    pub enumerated_devices: BTreeSet<String>,
}

impl FabricStatus {
    /// State a completed check lands in for this status.
    pub fn readiness(&self) -> FabricReadinessState {
        if !self.kernel_module_loaded {
            FabricReadinessState::ModuleMissing
        } else if !self.virtual_device_present {
            FabricReadinessState::DeviceMissing
        } else {
            FabricReadinessState::Ready
        }
    }
}

/// Detects and provisions kernel support for the fabric transport.
pub struct FabricReadinessManager {
    platform: Box<dyn FabricPlatform>,
    module: String,
    device: String,
    machine: ReadinessStateMachine,
    status: Option<FabricStatus>,
    failure_reason: Option<String>,
    events: EventSink,
}

impl FabricReadinessManager {
    pub fn new(platform: Box<dyn FabricPlatform>, config: &FabricConfig) -> Self {
        Self {
            platform,
            module: config.module.clone(),
            device: config.device.clone(),
            machine: ReadinessStateMachine::new(),
            status: None,
            failure_reason: None,
            events: EventSink::detached(),
        }
    }

    /// Manager backed by the host's Linux tooling.
    pub fn from_config(config: &FabricConfig) -> Self {
        Self::new(Box::new(LinuxFabricPlatform::new(&config.elevation)), config)
    }

    /// Report state changes on `events`.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> FabricReadinessState {
        self.machine.state()
    }

    pub fn is_ready(&self) -> bool {
        self.machine.is_ready()
    }

    /// Status from the most recent probe, if any.
    pub fn status(&self) -> Option<&FabricStatus> {
        self.status.as_ref()
    }

    /// Why the last provisioning attempt failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Probe the host. Always lands in READY, MODULE_MISSING or DEVICE_MISSING.
    pub fn check(&mut self) -> XferResult<FabricReadinessState> {
        self.transition(FabricReadinessState::Checking)?;

        let status = self.probe();
        let next = status.readiness();

        tracing::info!(
            module = %self.module,
            module_loaded = status.kernel_module_loaded,
            device = %self.device,
            device_present = status.virtual_device_present,
            devices = ?status.enumerated_devices,
            "Fabric readiness probed"
        );

        self.status = Some(status);
        self.failure_reason = None;
        self.transition(next)?;
        self.events.info(
            Transport::Fabric,
            format!("Fabric readiness: {}", next.name()),
        );

        Ok(next)
    }

    /// Load the module and create the device if a check says they are
    /// missing. Calling it when the host is already ready is a no-op.
    ///
    /// # Errors
    /// `FabricError::NoInterface` or `FabricError::ProvisionFailure`; the
    /// state is then PROVISION_FAILED with the reason recorded.
    pub fn provision(&mut self) -> XferResult<FabricReadinessState> {
        if !self.state().needs_provisioning() {
            let state = self.check()?;
            if !state.needs_provisioning() {
                return Ok(state);
            }
        }

        self.transition(FabricReadinessState::Provisioning)?;
        self.events.info(
            Transport::Fabric,
            format!("Provisioning {} on module {}", self.device, self.module),
        );

        let outcome = match self.run_provisioning() {
            Ok(()) => self.verify_provisioned(),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.transition(FabricReadinessState::Ready)?;
                self.events
                    .info(Transport::Fabric, "Fabric provisioning complete");
                Ok(FabricReadinessState::Ready)
            }
            Err(e) => {
                self.failure_reason = Some(e.to_string());
                self.transition(FabricReadinessState::ProvisionFailed)?;
                self.events.error(
                    Transport::Fabric,
                    format!("Fabric provisioning failed: {e}"),
                );
                Err(XferError::Fabric(e))
            }
        }
    }

    fn run_provisioning(&self) -> Result<(), FabricError> {
        let interface = self
            .platform
            .default_interface()
            .ok_or(FabricError::NoInterface)?;
        tracing::info!(interface = %interface, "Binding fabric device to interface");

        let (module_loaded, device_present) = self
            .status
            .as_ref()
            .map(|s| (s.kernel_module_loaded, s.virtual_device_present))
            .unwrap_or((false, false));

        if !module_loaded {
            self.platform.load_module(&self.module)?;
        }
        if !device_present {
            self.platform.create_device(&self.device, &interface)?;
        }

        Ok(())
    }

    /// Re-probe after the provisioning commands ran.
    fn verify_provisioned(&mut self) -> Result<(), FabricError> {
        let status = self.probe();
        let ready = status.readiness() == FabricReadinessState::Ready;
        self.status = Some(status);

        if ready {
            Ok(())
        } else {
            Err(FabricError::ProvisionFailure {
                step: "verify",
                reason: format!("{} still not present after provisioning", self.device),
            })
        }
    }

    fn probe(&self) -> FabricStatus {
        let enumerated_devices = self.platform.enumerate_devices();
        let virtual_device_present = self.platform.device_present(&self.device)
            || enumerated_devices.contains(&self.device);

        FabricStatus {
            kernel_module_loaded: self.platform.module_loaded(&self.module),
            virtual_device_present,
            enumerated_devices,
        }
    }

    fn transition(&mut self, target: FabricReadinessState) -> XferResult<()> {
        let from = self.machine.state();
        let held_for = self.machine.time_in_current_state();
        self.machine.transition_to(target)?;
        tracing::debug!(
            from = from.name(),
            to = target.name(),
            held_ms = held_for.as_millis() as u64,
            "Fabric readiness transition"
        );
        self.events.emit(RunEvent::Readiness { state: target });
        Ok(())
    }
}

impl std::fmt::Debug for FabricReadinessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FabricReadinessManager")
            .field("module", &self.module)
            .field("device", &self.device)
            .field("state", &self.machine.state())
            .field("failure_reason", &self.failure_reason)
            .finish()
    }
}
