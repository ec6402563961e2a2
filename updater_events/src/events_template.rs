use win_etw_macros::trace_logging_provider;
// Note: Generate GUID using TlgGuid.exe tool
#[trace_logging_provider(
    name = "DesktopUpdater",
    guid = "4b1f6c2e-8d3a-5e07-9c41-7a2d0e5f3b18",
    provider_group_guid = "ffffffff-ffff-ffff-ffff-ffffffffffff"
)]
// tl:{4b1f6c2e-8d3a-5e07-9c41-7a2d0e5f3b18}

pub trait UpdaterEvents {
    fn message(message: &str);

    // is_elevated_reentry: true when we were started with --update-elevated.
    // originating_pid: 0 if the pid wasn't handed over.
    fn update_started(is_elevated_reentry: bool, originating_pid: u32);

    fn elevation_requested(current_pid: u32, accepted: bool, shell_result: i64);

    fn holders_found(executable_path: &str, count: u32);

    fn process_wait(pid: u32, timeout_ms: u32, outcome: &str);

    fn process_terminated(pid: u32, succeeded: bool, error_code: i32);

    fn exclusive_access(executable_path: &str, acquired: bool);

    fn payload_located(directory: &str, is_temporary_staging: bool);

    fn script_launched(script_path: &str, succeeded: bool);
}
