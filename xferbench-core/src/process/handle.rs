//! Handle to a spawned endpoint process.
//!
//! The handle owns the `Child`. One thread may block in [`ProcessHandle::wait`]
//! while others probe liveness or request termination; probes never block on
//! the waiter.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;

use crate::types::{ProcessId, ProcessRole};

/// Maximum captured bytes kept per output stream.
const CAPTURE_LIMIT: usize = 64 * 1024;

/// Poll interval while waiting for a termination acknowledgment.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long output collection waits for a stream to reach EOF.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Observed process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "code")]
pub enum Liveness {
    Running,
    /// SIGTERM was sent but the process has not exited yet.
    TerminationRequested,
    Exited(i32),
    /// Ended by a signal.
    Terminated,
}

impl Liveness {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Terminated)
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited(code),
            None => Self::Terminated,
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    /// The process had already exited; nothing was sent.
    AlreadyExited,
    /// The process exited within the grace period.
    Stopped,
    /// The process ignored SIGTERM for the whole grace period. It stays
    /// tracked as termination-requested.
    StillRunning,
}

/// Captured output of one stream, filled by a drain thread.
struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl CapturedOutput {
    fn spawn<R: Read + Send + 'static>(source: Option<R>) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let drain = source.map(|mut source| {
            let sink = Arc::clone(&buffer);
            std::thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                loop {
                    match source.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut buf = lock(&sink);
                            buf.extend_from_slice(&chunk[..n]);
                            if buf.len() > CAPTURE_LIMIT {
                                let excess = buf.len() - CAPTURE_LIMIT;
                                buf.drain(..excess);
                            }
                        }
                    }
                }
            })
        });

        Self {
            buffer,
            drain: Mutex::new(drain),
        }
    }

    /// Give the drain thread a moment to hit EOF, then return the captured
    /// text. A grandchild holding the pipe open must not hang the caller.
    fn collect(&self) -> String {
        let mut drain = lock(&self.drain);
        if let Some(handle) = drain.take() {
            let deadline = Instant::now() + DRAIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(STOP_POLL_INTERVAL);
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                *drain = Some(handle);
            }
        }
        drop(drain);
        String::from_utf8_lossy(&lock(&self.buffer)).into_owned()
    }
}

/// A spawned process, owned by the supervisor that created it.
pub struct ProcessHandle {
    role: ProcessRole,
    pid: ProcessId,
    command: String,
    working_dir: PathBuf,
    started_at: Instant,
    child: Mutex<Child>,
    liveness: Mutex<Liveness>,
    stop_requests: AtomicU32,
    stdout: CapturedOutput,
    stderr: CapturedOutput,
}

impl ProcessHandle {
    pub(crate) fn new(
        role: ProcessRole,
        pid: ProcessId,
        command: String,
        working_dir: PathBuf,
        mut child: Child,
    ) -> Self {
        let stdout = CapturedOutput::spawn(child.stdout.take());
        let stderr = CapturedOutput::spawn(child.stderr.take());

        Self {
            role,
            pid,
            command,
            working_dir,
            started_at: Instant::now(),
            child: Mutex::new(child),
            liveness: Mutex::new(Liveness::Running),
            stop_requests: AtomicU32::new(0),
            stdout,
            stderr,
        }
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Command line as launched.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Time since spawn.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Number of termination requests sent to this process.
    pub fn stop_requests(&self) -> u32 {
        self.stop_requests.load(Ordering::Acquire)
    }

    /// Current state without blocking.
    ///
    /// Reaps the child if it has exited and nobody else is waiting on it.
    pub fn liveness(&self) -> Liveness {
        let current = *lock(&self.liveness);
        if current.is_finished() {
            return current;
        }

        let mut child = match self.child.try_lock() {
            Ok(child) => child,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            // A waiter holds the child and will publish the exit.
            Err(TryLockError::WouldBlock) => return current,
        };

        match child.try_wait() {
            Ok(Some(status)) => self.publish(Liveness::from_status(status)),
            Ok(None) => current,
            Err(e) => {
                tracing::warn!(pid = %self.pid, error = %e, "Liveness probe failed");
                current
            }
        }
    }

    /// Non-blocking liveness probe.
    pub fn is_alive(&self) -> bool {
        !self.liveness().is_finished()
    }

    /// Block until the process exits. Returns the exit code, or `None` if
    /// the process was ended by a signal.
    pub fn wait(&self) -> Option<i32> {
        let current = *lock(&self.liveness);
        if let Liveness::Exited(code) = current {
            return Some(code);
        }
        if current == Liveness::Terminated {
            return None;
        }

        let status = lock(&self.child).wait();
        let liveness = match status {
            Ok(status) => Liveness::from_status(status),
            Err(e) => {
                tracing::warn!(pid = %self.pid, error = %e, "Wait on child failed");
                Liveness::Terminated
            }
        };

        match self.publish(liveness) {
            Liveness::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Send SIGTERM and wait up to `grace_period` for the exit.
    /// No escalation to SIGKILL.
    pub fn request_stop(&self, grace_period: Duration) -> StopOutcome {
        if self.liveness().is_finished() {
            return StopOutcome::AlreadyExited;
        }

        self.stop_requests.fetch_add(1, Ordering::AcqRel);
        {
            let mut liveness = lock(&self.liveness);
            if *liveness == Liveness::Running {
                *liveness = Liveness::TerminationRequested;
            }
        }

        let raw_pid = Pid::from_raw(self.pid.value() as i32);
        match signal::kill(raw_pid, Signal::SIGTERM) {
            Ok(()) => {}
            // Already gone; the next probe reaps it.
            Err(Errno::ESRCH) => {}
            Err(e) => {
                tracing::warn!(pid = %self.pid, error = %e, "Failed to signal process");
            }
        }

        let deadline = Instant::now() + grace_period;
        loop {
            if self.liveness().is_finished() {
                return StopOutcome::Stopped;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    pid = %self.pid,
                    role = %self.role,
                    grace_ms = grace_period.as_millis() as u64,
                    "Process still running after termination request"
                );
                return StopOutcome::StillRunning;
            }
            std::thread::sleep(STOP_POLL_INTERVAL);
        }
    }

    /// Captured stdout. Blocks until the stream closes, so call after exit.
    pub fn stdout_text(&self) -> String {
        self.stdout.collect()
    }

    /// Captured stderr. Blocks until the stream closes, so call after exit.
    pub fn stderr_text(&self) -> String {
        self.stderr.collect()
    }

    fn publish(&self, observed: Liveness) -> Liveness {
        let mut liveness = lock(&self.liveness);
        if !liveness.is_finished() {
            *liveness = observed;
            tracing::debug!(
                pid = %self.pid,
                role = %self.role,
                state = ?observed,
                "Process finished"
            );
        }
        *liveness
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("role", &self.role)
            .field("pid", &self.pid)
            .field("command", &self.command)
            .field("liveness", &*lock(&self.liveness))
            .finish()
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
