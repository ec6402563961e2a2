use std::path::{Path, PathBuf};

/// A running process whose image is the executable we're updating.
/// `executable_path` is already normalized (see `helpers::normalize_image_path`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProcessHandle {
    pub process_id: u32,
    pub executable_path: String,
}

impl ProcessHandle {
    /// Two handles are the same running image iff their normalized paths match.
    pub fn same_image(&self, other: &ProcessHandle) -> bool {
        self.executable_path == other.executable_path
    }
}

/// What the unelevated instance hands to its elevated replacement on the
/// command line. The OS parent link isn't reliable across a UAC prompt, so the
/// originating pid travels explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElevationRequest {
    pub marker: bool,
    pub originating_parent_pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePayloadLocation {
    pub directory: PathBuf,
    pub is_temporary_staging: bool,
}

impl UpdatePayloadLocation {
    /// The per-download holding area, i.e. the parent of the `update` dir.
    /// Only staging locations have one.
    pub fn staging_dir(&self) -> Option<&Path> {
        if self.is_temporary_staging {
            self.directory.parent()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// An elevated copy of ourselves was started and will do the update.
    ElevatedInstanceLaunched,
    /// The replacement script is running and owns the install dir now.
    ReplacementScriptLaunched,
}

/// Terminal states of the update state machine. The embedding layer is the one
/// that actually ends the process on `ExitRequested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    ExitRequested { code: i32, reason: ExitReason },
    /// Nothing was changed; control goes back to the caller.
    Aborted,
}
