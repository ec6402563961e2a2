use updater_events::UpdaterEvents;

// tl:{4b1f6c2e-8d3a-5e07-9c41-7a2d0e5f3b18}
static UPDATER_EVENTS: std::sync::OnceLock<UpdaterEvents> = std::sync::OnceLock::new();

pub fn updater_events() -> &'static UpdaterEvents {
    UPDATER_EVENTS.get_or_init(UpdaterEvents::new)
}

pub fn enable_tracing() {
    updater_events();
}

pub fn trace_log_message(message: &str) {
    updater_events().message(None, message);
}

pub fn trace_update_started(originating_pid: Option<u32>, is_elevated_reentry: bool) {
    updater_events().update_started(None, is_elevated_reentry, originating_pid.unwrap_or(0));
}

pub fn trace_elevation(current_pid: u32, shell_result: isize, accepted: bool) {
    updater_events().elevation_requested(None, current_pid, accepted, shell_result as i64);
}

pub fn trace_holders_found(executable_path: &str, count: usize) {
    updater_events().holders_found(None, executable_path, count.try_into().unwrap_or(u32::MAX));
}

pub fn trace_wait(pid: u32, timeout: std::time::Duration, outcome: &str) {
    let timeout_ms = timeout.as_millis().try_into().unwrap_or(u32::MAX);
    updater_events().process_wait(None, pid, timeout_ms, outcome);
}

pub fn trace_terminate(pid: u32, succeeded: bool, error_code: i32) {
    updater_events().process_terminated(None, pid, succeeded, error_code);
}

pub fn trace_exclusive_access(executable_path: &str, acquired: bool) {
    updater_events().exclusive_access(None, executable_path, acquired);
}

pub fn trace_payload(directory: &str, is_temporary_staging: bool) {
    updater_events().payload_located(None, directory, is_temporary_staging);
}

pub fn trace_script_launched(script_path: &str, succeeded: bool) {
    updater_events().script_launched(None, script_path, succeeded);
}
