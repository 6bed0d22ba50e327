//! External process lifecycle management.
//!
//! Starts endpoint executables, tracks at most one live process per role,
//! and stops them with a best-effort SIGTERM bounded by a grace period.

mod handle;
mod supervisor;

pub(crate) use handle::lock;
pub use handle::{Liveness, ProcessHandle, StopOutcome};
pub use supervisor::{LaunchSpec, ProcessSupervisor};
