use crate::platform::{LockProbe, ProcessApi, TerminateStatus, WaitStatus};
use crate::process_inspector::list_processes_using_executable;
use crate::tracing;
use std::path::Path;
use std::time::Duration;

/// Wait up to `timeout` for `pid` to exit on its own, then kill it.
///
/// Returns true when the process is no longer in our way, which is not the
/// same as "it exited gracefully". The only false is a process that exists
/// but that we can't even open.
pub fn wait_for_exit(
    api: &impl ProcessApi,
    pid: u32,
    timeout: Duration,
    settle_delay: Duration,
) -> bool {
    match api.wait_for_signal(pid, timeout) {
        WaitStatus::Gone => {
            tracing::trace_wait(pid, timeout, "gone");
            true
        }
        WaitStatus::Exited => {
            tracing::trace_wait(pid, timeout, "exited");
            api.sleep(settle_delay);
            true
        }
        WaitStatus::TimedOut => {
            tracing::trace_wait(pid, timeout, "timed out");
            terminate(api, pid, settle_delay);
            true
        }
        WaitStatus::WaitFailed(code) => {
            tracing::trace_wait(pid, timeout, &format!("wait failed ({code})"));
            terminate(api, pid, settle_delay);
            true
        }
        WaitStatus::OpenFailed(code) => {
            tracing::trace_wait(pid, timeout, &format!("open failed ({code})"));
            false
        }
    }
}

/// Forcibly terminate `pid`. A process that's already gone counts as success.
pub fn terminate(api: &impl ProcessApi, pid: u32, settle_delay: Duration) -> bool {
    match api.terminate(pid) {
        TerminateStatus::Terminated => {
            tracing::trace_terminate(pid, true, 0);
            api.sleep(settle_delay);
            true
        }
        TerminateStatus::NotFound => {
            tracing::trace_terminate(pid, true, 0);
            true
        }
        TerminateStatus::OpenFailed(code) | TerminateStatus::Refused(code) => {
            tracing::trace_terminate(pid, false, code);
            false
        }
    }
}

/// Poll until `path` can be opened with no sharing, i.e. nobody has the
/// executable mapped anymore. Anything other than a sharing/lock violation
/// means the file is broken in some other way and we stop right there.
pub fn wait_for_exclusive_access(
    api: &impl ProcessApi,
    path: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let display = path.to_string_lossy();
    let start = api.now();
    while api.now().duration_since(start) < timeout {
        match api.probe_exclusive(path) {
            LockProbe::Free => {
                tracing::trace_exclusive_access(&display, true);
                return true;
            }
            LockProbe::Locked => api.sleep(poll_interval),
            LockProbe::Failed(code) => {
                tracing::trace_log_message(&format!("can't open {display}: error {code}"));
                tracing::trace_exclusive_access(&display, false);
                return false;
            }
        }
    }

    tracing::trace_exclusive_access(&display, false);
    false
}

/// Kill every live process running `path`, except us. One pass, no retries.
pub fn terminate_all_using(api: &impl ProcessApi, path: &Path, settle_delay: Duration) {
    let current_pid = api.current_pid();
    for holder in list_processes_using_executable(api, path) {
        if holder.process_id != current_pid && api.is_alive(holder.process_id) {
            tracing::trace_log_message(&format!("killing process {}", holder.process_id));
            terminate(api, holder.process_id, settle_delay);
        }
    }
}
