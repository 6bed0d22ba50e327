// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Fabric readiness state machine with typed state transitions.
//!
//! Unknown → Checking → {Ready, ModuleMissing, DeviceMissing}
//! {ModuleMissing, DeviceMissing} → Provisioning → {Ready, ProvisionFailed}
//! Invalid transitions result in StateTransitionError.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Host readiness for the fabric transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FabricReadinessState {
    /// Nothing has been checked yet.
    Unknown,

    /// Probing the module table, link registry and device enumeration.
    Checking,

    /// Kernel module loaded and virtual device present.
    Ready,

    ModuleMissing,

    /// Module loaded but no virtual device bound.
    DeviceMissing,

    /// Loading the module and creating the device.
    Provisioning,

    /// Provisioning failed; the reason is kept by the manager.
    ProvisionFailed,
}

impl FabricReadinessState {
    /// Get the state name for status lines and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Checking => "CHECKING",
            Self::Ready => "READY",
            Self::ModuleMissing => "MODULE_MISSING",
            Self::DeviceMissing => "DEVICE_MISSING",
            Self::Provisioning => "PROVISIONING",
            Self::ProvisionFailed => "PROVISION_FAILED",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: FabricReadinessState) -> bool {
        matches!(
            (self, target),
            // A check may start from any settled state
            (Self::Unknown, Self::Checking) |
            (Self::Ready, Self::Checking) |
            (Self::ModuleMissing, Self::Checking) |
            (Self::DeviceMissing, Self::Checking) |
            (Self::ProvisionFailed, Self::Checking) |
            // From Checking
            (Self::Checking, Self::Ready) |
            (Self::Checking, Self::ModuleMissing) |
            (Self::Checking, Self::DeviceMissing) |
            // Provisioning only repairs a known gap
            (Self::ModuleMissing, Self::Provisioning) |
            (Self::DeviceMissing, Self::Provisioning) |
            // From Provisioning
            (Self::Provisioning, Self::Ready) |
            (Self::Provisioning, Self::ProvisionFailed)
        )
    }

    /// Whether the state is the outcome of a completed check.
    pub fn is_check_outcome(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::ModuleMissing | Self::DeviceMissing
        )
    }

    /// Whether `provision()` has something to repair from this state.
    pub fn needs_provisioning(&self) -> bool {
        matches!(self, Self::ModuleMissing | Self::DeviceMissing)
    }
}

impl std::fmt::Display for FabricReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for fabric readiness.
/// Enforces valid state transitions and tracks timing.
#[derive(Debug)]
pub struct ReadinessStateMachine {
    current_state: FabricReadinessState,
    last_transition: Instant,
    transition_count: u64,
}

impl ReadinessStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: FabricReadinessState::Unknown,
            last_transition: Instant::now(),
            transition_count: 0,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> FabricReadinessState {
        self.current_state
    }

    /// Get time since last transition.
    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(
        &mut self,
        target: FabricReadinessState,
    ) -> Result<(), StateTransitionError> {
        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            from = self.current_state.name(),
            to = target.name(),
            "Readiness transition"
        );

        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.current_state == FabricReadinessState::Ready
    }
}

impl Default for ReadinessStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FabricReadinessState::*;

    const ALL: [FabricReadinessState; 7] = [
        Unknown,
        Checking,
        Ready,
        ModuleMissing,
        DeviceMissing,
        Provisioning,
        ProvisionFailed,
    ];

    #[test]
    fn test_initial_state() {
        let sm = ReadinessStateMachine::new();
        assert_eq!(sm.state(), Unknown);
        assert_eq!(sm.transition_count(), 0);
        assert!(!sm.is_ready());
    }

    #[test]
    fn test_check_then_provision_path() {
        let mut sm = ReadinessStateMachine::new();

        sm.transition_to(Checking).unwrap();
        sm.transition_to(DeviceMissing).unwrap();
        sm.transition_to(Provisioning).unwrap();
        sm.transition_to(Ready).unwrap();

        assert!(sm.is_ready());
        assert_eq!(sm.transition_count(), 4);
    }

    #[test]
    fn test_every_settled_state_can_check() {
        for state in ALL {
            let expected = state != Checking && state != Provisioning;
            assert_eq!(state.can_transition_to(Checking), expected, "{state}");
        }
    }

    #[test]
    fn test_provisioning_only_from_missing() {
        let allowed: Vec<_> = ALL
            .into_iter()
            .filter(|s| s.can_transition_to(Provisioning))
            .collect();
        assert_eq!(allowed, vec![ModuleMissing, DeviceMissing]);
        assert!(allowed.iter().all(|s| s.needs_provisioning()));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = ReadinessStateMachine::new();

        // Unknown → Ready skips the check
        let err = sm.transition_to(Ready).unwrap_err();
        assert!(err.to_string().contains("UNKNOWN"));
        assert_eq!(sm.state(), Unknown);

        // Ready → Provisioning has nothing to repair
        sm.transition_to(Checking).unwrap();
        sm.transition_to(Ready).unwrap();
        assert!(sm.transition_to(Provisioning).is_err());
        assert_eq!(sm.state(), Ready);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ProvisionFailed).unwrap();
        assert_eq!(json, "\"PROVISION_FAILED\"");
        assert_eq!(ModuleMissing.to_string(), "MODULE_MISSING");
    }
}
