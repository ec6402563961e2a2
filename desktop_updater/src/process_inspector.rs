use crate::helpers::normalize_image_path;
use crate::messages::ProcessHandle;
use crate::platform::ProcessApi;
use crate::tracing;
use std::path::Path;

/// Every process (other than us) whose image is `executable_path`.
///
/// If we can't take a snapshot at all this returns nothing. Treating that as
/// "blocked everywhere" would wedge the update forever, so we fail open and let
/// the file lock check catch what we missed.
pub fn list_processes_using_executable(
    api: &impl ProcessApi,
    executable_path: &Path,
) -> Vec<ProcessHandle> {
    let target = normalize_image_path(executable_path);
    let current_pid = api.current_pid();

    let entries = match api.snapshot() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::trace_log_message(&format!("process snapshot failed: {err}"));
            return Vec::new();
        }
    };

    let holders: Vec<ProcessHandle> = entries
        .iter()
        .filter(|entry| entry.process_id != current_pid)
        .filter_map(|entry| {
            // Processes we can't open (protected, or exited since the
            // snapshot) can't be matched, so they don't count.
            let image = api.image_path(entry.process_id)?;
            let image = normalize_image_path(&image);
            (image == target).then(|| ProcessHandle {
                process_id: entry.process_id,
                executable_path: image,
            })
        })
        .collect();

    tracing::trace_holders_found(&target, holders.len());
    holders
}

/// Best effort lookup of the parent of `pid` in a fresh snapshot.
pub fn parent_of(api: &impl ProcessApi, pid: u32) -> Option<u32> {
    let entries = match api.snapshot() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::trace_log_message(&format!("process snapshot failed: {err}"));
            return None;
        }
    };
    entries
        .iter()
        .find(|entry| entry.process_id == pid)
        .map(|entry| entry.parent_process_id)
        .filter(|&parent| parent != 0)
}

/// Is anyone other than us running `executable_path` right now?
pub fn any_holder_alive(api: &impl ProcessApi, executable_path: &Path) -> bool {
    let current_pid = api.current_pid();
    list_processes_using_executable(api, executable_path)
        .iter()
        .any(|holder| holder.process_id != current_pid && api.is_alive(holder.process_id))
}
