use crate::messages::UpdatePayloadLocation;
use crate::tracing;
use std::fs;
use std::path::{Path, PathBuf};

/// Name prefix of the per-download holding areas the downloader creates in
/// the temp directory.
pub const STAGING_PREFIX: &str = "desktop_updater_download";
/// Where the new files live inside a holding area, and also the name of the
/// fallback payload directory beside the executable.
pub const PAYLOAD_DIR_NAME: &str = "update";

/// File names are case insensitive on Windows, so the prefix is too.
fn has_staging_prefix(name: &str) -> bool {
    name.as_bytes()
        .get(..STAGING_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(STAGING_PREFIX.as_bytes()))
}

/// Look for a staged download under `temp_dir`. The first holding area (in
/// directory enumeration order) that has an `update` subdirectory wins.
pub fn find_staged_payload(temp_dir: &Path) -> Option<UpdatePayloadLocation> {
    let entries = match fs::read_dir(temp_dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::trace_log_message(&format!("can't list {}: {err}", temp_dir.display()));
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name != "." && name != ".." && has_staging_prefix(&name)
        })
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path().join(PAYLOAD_DIR_NAME))
        .find(|candidate| candidate.is_dir())
        .map(|directory| UpdatePayloadLocation {
            directory,
            is_temporary_staging: true,
        })
}

/// The payload to install: a staged download if there is one, otherwise the
/// `update` directory in `install_dir`.
pub fn locate_payload(temp_dir: &Path, install_dir: &Path) -> UpdatePayloadLocation {
    let location = find_staged_payload(temp_dir).unwrap_or_else(|| UpdatePayloadLocation {
        directory: fallback_payload_dir(install_dir),
        is_temporary_staging: false,
    });
    tracing::trace_payload(
        &location.directory.to_string_lossy(),
        location.is_temporary_staging,
    );
    location
}

pub fn fallback_payload_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(PAYLOAD_DIR_NAME)
}
