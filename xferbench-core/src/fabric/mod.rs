//! Fabric transport readiness.
//!
//! Detects whether the kernel module and virtual device the fabric transport
//! needs are present, and provisions them on request.

mod manager;
mod platform;
mod state;

pub use manager::{FabricReadinessManager, FabricStatus};
pub use platform::{
    CommandOutput, CommandRunner, FabricPlatform, LinuxFabricPlatform, PlatformProbe,
    SystemCommandRunner,
};
pub use state::{FabricReadinessState, ReadinessStateMachine};
