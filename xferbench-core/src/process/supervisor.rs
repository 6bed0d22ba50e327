//! Process supervisor with a role registry.
//!
//! Each [`ProcessRole`] maps to at most one live [`ProcessHandle`]. Starting
//! a role that is still held by a live process is rejected; a finished
//! process is replaced.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::LaunchError;
use crate::process::handle::{ProcessHandle, StopOutcome};
use crate::types::{ExecutablePath, ProcessId, ProcessRole};

/// Everything needed to spawn one endpoint process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: ExecutablePath,
    interpreter: Option<String>,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    /// Run a validated executable directly.
    pub fn new(program: ExecutablePath, args: Vec<String>) -> Self {
        Self {
            program,
            interpreter: None,
            args,
            working_dir: None,
        }
    }

    /// Run a script through an interpreter (`python3 tcp_client.py ...`).
    pub fn interpreted(interpreter: String, script: ExecutablePath, args: Vec<String>) -> Self {
        Self {
            program: script,
            interpreter: Some(interpreter),
            args,
            working_dir: None,
        }
    }

    /// Set the working directory. Defaults to the orchestrator's own.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Printable command line.
    pub fn command_line(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.args.len() + 2);
        if let Some(interpreter) = &self.interpreter {
            parts.push(interpreter.clone());
        }
        parts.push(self.program.to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(self.program.as_path());
                cmd
            }
            None => Command::new(self.program.as_path()),
        };
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Starts, tracks and stops endpoint processes.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    tracked: DashMap<ProcessRole, Arc<ProcessHandle>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a supervisor wrapped in an Arc for sharing across workers.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Spawn a process for `role` and return immediately.
    ///
    /// # Errors
    /// `RoleOccupied` if a live process already holds the role,
    /// `SpawnFailed` if the OS refuses to start it.
    pub fn start(
        &self,
        role: ProcessRole,
        spec: &LaunchSpec,
    ) -> Result<Arc<ProcessHandle>, LaunchError> {
        let entry = self.tracked.entry(role);

        if let Entry::Occupied(occupied) = &entry {
            let existing = occupied.get();
            if existing.is_alive() {
                return Err(LaunchError::RoleOccupied {
                    role,
                    pid: existing.pid().value(),
                });
            }
        }

        let command_line = spec.command_line();
        let child = spec.command().spawn().map_err(|e| LaunchError::SpawnFailed {
            program: command_line.clone(),
            reason: e.to_string(),
        })?;

        let pid = ProcessId::new(child.id()).map_err(|e| LaunchError::SpawnFailed {
            program: command_line.clone(),
            reason: e.to_string(),
        })?;

        let working_dir = match &spec.working_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_default(),
        };

        tracing::debug!(
            role = %role,
            pid = %pid,
            command = %command_line,
            "Spawned process"
        );

        let handle = Arc::new(ProcessHandle::new(role, pid, command_line, working_dir, child));
        match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(Arc::clone(&handle));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&handle));
            }
        }

        Ok(handle)
    }

    /// Live process currently holding a role, if any.
    pub fn tracked(&self, role: ProcessRole) -> Option<Arc<ProcessHandle>> {
        self.tracked
            .get(&role)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|handle| handle.is_alive())
    }

    /// Block until the process exits.
    pub fn wait(&self, handle: &ProcessHandle) -> Option<i32> {
        handle.wait()
    }

    /// Non-blocking liveness probe.
    pub fn is_alive(&self, handle: &ProcessHandle) -> bool {
        handle.is_alive()
    }

    /// Request termination. Idempotent: an exited handle is a no-op.
    pub fn stop(&self, handle: &ProcessHandle, grace_period: Duration) -> StopOutcome {
        let outcome = handle.request_stop(grace_period);
        if outcome != StopOutcome::StillRunning {
            self.release(handle.role());
        }
        outcome
    }

    /// Drop the registry entry for `role` once its process has finished.
    pub fn release(&self, role: ProcessRole) {
        self.tracked.remove_if(&role, |_, handle| !handle.is_alive());
    }

    /// Number of roles held by live processes.
    pub fn live_count(&self) -> usize {
        self.tracked.iter().filter(|entry| entry.is_alive()).count()
    }

    /// Send termination requests to every tracked live process.
    pub fn shutdown(&self, grace_period: Duration) -> Vec<(ProcessRole, StopOutcome)> {
        let handles: Vec<Arc<ProcessHandle>> = self
            .tracked
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            if !handle.is_alive() {
                self.release(handle.role());
                continue;
            }
            tracing::info!(role = %handle.role(), pid = %handle.pid(), "Stopping tracked process");
            let outcome = self.stop(&handle, grace_period);
            outcomes.push((handle.role(), outcome));
        }
        outcomes
    }
}
