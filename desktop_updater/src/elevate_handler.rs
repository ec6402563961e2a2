use crate::helpers::{join_args, UPDATE_ELEVATED_FLAG};
use crate::messages::ElevationRequest;
use crate::platform::ElevationApi;
use crate::tracing;
use std::ffi::OsString;
use std::path::Path;

/// ShellExecute returns an HINSTANCE for compatibility with 16-bit Windows.
/// Values greater than 32 mean it worked; everything else is an error code
/// (SE_ERR_ACCESSDENIED when the user said no to the UAC prompt).
const SHELL_EXECUTE_SUCCESS_THRESHOLD: isize = 32;

/// Whether we're allowed to write to the install dir. If we can't even build
/// the check, we say no: asking for elevation we didn't need is harmless,
/// failing halfway through a copy is not.
pub fn is_elevated(api: &impl ElevationApi) -> bool {
    api.is_admin()
}

/// Start an elevated copy of `self_path`, telling it who we are so it can wait
/// for us to go away. Returns false if the user declined or it failed in any
/// other way. Nothing has been touched at that point.
pub fn relaunch_elevated(api: &impl ElevationApi, self_path: &Path, current_pid: u32) -> bool {
    let parameters = join_args(&[UPDATE_ELEVATED_FLAG.to_string(), current_pid.to_string()]);
    tracing::trace_log_message(&format!(
        "elevate request: '{} {parameters}'",
        self_path.display()
    ));

    let result = api.shell_execute_runas(self_path, &parameters);
    let accepted = result > SHELL_EXECUTE_SUCCESS_THRESHOLD;
    tracing::trace_elevation(current_pid, result, accepted);
    accepted
}

/// Look for our marker on the command line. `args` includes the program name
/// at index 0, like `std::env::args_os()`.
///
/// A missing, unparsable or zero pid after the marker still counts as a
/// re-entry; we just don't know who started us and fall back to asking the
/// OS for our parent.
pub fn detect_elevated_reentry<I, T>(args: I) -> Option<ElevationRequest>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args = args.into_iter().skip(1).map(Into::into);
    args.by_ref().find(|arg| arg == UPDATE_ELEVATED_FLAG)?;

    let originating_parent_pid = args
        .next()
        .and_then(|pid| pid.to_str().and_then(|pid| pid.trim().parse::<u32>().ok()))
        .filter(|&pid| pid != 0);

    Some(ElevationRequest {
        marker: true,
        originating_parent_pid,
    })
}
