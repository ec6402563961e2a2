//! The seam between the update state machine and the OS. `Win32Platform`
//! (in win32.rs) is the real implementation; the tests drive everything
//! through a synthetic process table instead.
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// One row of a process snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub process_id: u32,
    pub parent_process_id: u32,
}

/// How a bounded wait on a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Exited,
    TimedOut,
    /// There's no such process (anymore).
    Gone,
    /// The process exists but we couldn't open it. Carries the Win32 error.
    OpenFailed(i32),
    /// We had a handle, but the wait itself failed.
    WaitFailed(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateStatus {
    Terminated,
    NotFound,
    OpenFailed(i32),
    Refused(i32),
}

/// Result of trying to open a file with no sharing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockProbe {
    Free,
    /// Sharing or lock violation: someone still has it open.
    Locked,
    Failed(i32),
}

pub trait ProcessApi {
    fn current_pid(&self) -> u32;
    fn snapshot(&self) -> io::Result<Vec<ProcessEntry>>;
    fn image_path(&self, pid: u32) -> Option<PathBuf>;
    fn is_alive(&self, pid: u32) -> bool;
    fn wait_for_signal(&self, pid: u32, timeout: Duration) -> WaitStatus;
    fn terminate(&self, pid: u32) -> TerminateStatus;
    fn probe_exclusive(&self, path: &Path) -> LockProbe;
    fn sleep(&self, duration: Duration);
    fn now(&self) -> Instant;
}

pub trait ElevationApi {
    /// Is the effective token a member of BUILTIN\Administrators?
    fn is_admin(&self) -> bool;
    /// ShellExecute `exe` with the "runas" verb. Returns the instance value
    /// ShellExecute reports; anything <= 32 is an error code.
    fn shell_execute_runas(&self, exe: &Path, parameters: &str) -> isize;
}

pub trait ScriptLauncher {
    /// Start `script` in a windowless interpreter that isn't tied to our
    /// lifetime.
    fn spawn_detached(&self, script: &Path, working_dir: &Path) -> io::Result<()>;
}

pub trait Platform: ProcessApi + ElevationApi + ScriptLauncher {
    fn current_exe(&self) -> io::Result<PathBuf>;
    fn temp_dir(&self) -> PathBuf;
}
