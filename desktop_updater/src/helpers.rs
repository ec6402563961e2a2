use crate::tracing::trace_log_message;
use std::io;
use std::path::Path;
use std::time::Duration;

#[cfg(windows)]
use std::{ffi::OsString, os::windows::ffi::OsStringExt, path::PathBuf};
#[cfg(windows)]
use windows::{
    core::*,
    Win32::Foundation::*,
    Win32::Storage::FileSystem::{GetFullPathNameW, GetLongPathNameW},
};

/// The command line token that marks the elevated re-entry of the updater.
pub const UPDATE_ELEVATED_FLAG: &str = "--update-elevated";

/// Canonical textual form of an image path: verbatim prefixes dropped, every
/// separator turned into `\`, ASCII case folded.
///
/// This is the half of [`normalize_image_path`] that doesn't touch the file
/// system. It must be applied to both sides of any comparison.
pub fn fold_path(path: &str) -> String {
    let path = path.replace('/', "\\");
    let path = if let Some(rest) = path.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{rest}")
    } else if let Some(rest) = path.strip_prefix(r"\\?\") {
        rest.to_owned()
    } else {
        path
    };
    path.to_ascii_lowercase()
}

/// Resolve `path` to an absolute, long-form path and fold it. If the OS can't
/// resolve it (the file may already be gone) we fold what we were given, so
/// the comparison stays symmetric.
pub fn normalize_image_path(path: &Path) -> String {
    fold_path(&resolve_image_path(path).to_string_lossy())
}

#[cfg(windows)]
fn resolve_image_path(path: &Path) -> PathBuf {
    let full = match absolute_path(path) {
        Ok(full) => full,
        Err(_) => return path.to_path_buf(),
    };
    long_path(&full).unwrap_or(full)
}

#[cfg(not(windows))]
fn resolve_image_path(path: &Path) -> std::path::PathBuf {
    path.to_path_buf()
}

/// Make a Windows path absolute, using GetFullPathNameW to resolve the file on disk.
/// Largely lifted from the rust stdlib, because it's _currently_ a nightly-only function.
#[cfg(windows)]
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().as_encoded_bytes().starts_with(br"\\?\") {
        return Ok(path.into());
    }
    let lpfilename = HSTRING::from(path.as_os_str());
    let mut buffer = vec![0u16; MAX_PATH as usize];
    loop {
        // GetFullPathNameW will return the required buffer size if the buffer is too small.
        let res = unsafe { GetFullPathNameW(&lpfilename, Some(buffer.as_mut_slice()), None) };
        match res as usize {
            0 => return Err(Error::from_win32()), // returns GLE
            len if len <= buffer.len() => {
                return Ok(PathBuf::from(OsString::from_wide(&buffer[..len])))
            }
            new_len => buffer.resize(new_len, 0),
        }
    }
}

/// Expand any 8.3 components (`PROGRA~1`) of an existing path.
#[cfg(windows)]
pub fn long_path(path: &Path) -> Result<PathBuf> {
    let short = HSTRING::from(path.as_os_str());
    let mut buffer = vec![0u16; MAX_PATH as usize];
    loop {
        // Same contract as GetFullPathNameW: too small a buffer gets us the
        // required size (including the null) instead of a length.
        let res = unsafe { GetLongPathNameW(&short, Some(buffer.as_mut_slice())) };
        match res as usize {
            0 => return Err(Error::from_win32()),
            len if len < buffer.len() => {
                return Ok(PathBuf::from(OsString::from_wide(&buffer[..len])))
            }
            new_len => buffer.resize(new_len, 0),
        }
    }
}

/// Windows does not actually support distinct command line parameters. They're all just given as a single string.
/// We can't just use `.join(" ")` either, because this breaks arguments with whitespaces. This function handles these details.
pub fn join_args<T: AsRef<str>>(args: &[T]) -> String {
    let mut accumulator = String::with_capacity(args.iter().map(|s| s.as_ref().len() + 3).sum());

    for (idx, arg) in args.iter().enumerate() {
        if idx != 0 {
            accumulator.push(' ');
        }

        let str = arg.as_ref();
        let quote = str.is_empty() || str.contains(' ') || str.contains('\t');
        if quote {
            accumulator.push('"');
        }

        let mut backslashes: usize = 0;
        for x in str.chars() {
            if x == '\\' {
                backslashes += 1;
            } else {
                if x == '"' {
                    accumulator.extend((0..=backslashes).map(|_| '\\'));
                }
                backslashes = 0;
            }
            accumulator.push(x);
        }

        if quote {
            accumulator.extend((0..backslashes).map(|_| '\\'));
            accumulator.push('"');
        }
    }

    accumulator
}

pub trait ConfigProvider {
    /// Per-user value. `NotFound` when it isn't set.
    fn get_setting(&self, name: &str) -> io::Result<u32>;
    /// Machine policy value. `NotFound` when it isn't set.
    fn get_policy(&self, name: &str) -> io::Result<u32>;
}

#[cfg(windows)]
#[derive(Default)]
pub struct RegistryConfigProvider;

#[cfg(windows)]
impl RegistryConfigProvider {
    fn read(key: &windows_registry::Key, path: &str, name: &str) -> io::Result<u32> {
        key.open(path)
            .and_then(|key| key.get_u32(name))
            .map_err(|e| {
                if e.code() == ERROR_FILE_NOT_FOUND.to_hresult() {
                    io::ErrorKind::NotFound.into()
                } else {
                    io::Error::from_raw_os_error(e.code().0)
                }
            })
    }
}

#[cfg(windows)]
impl ConfigProvider for RegistryConfigProvider {
    fn get_setting(&self, name: &str) -> io::Result<u32> {
        Self::read(
            windows_registry::CURRENT_USER,
            "Software\\DesktopUpdater",
            name,
        )
    }
    fn get_policy(&self, name: &str) -> io::Result<u32> {
        Self::read(
            windows_registry::LOCAL_MACHINE,
            "SOFTWARE\\Policies\\DesktopUpdater",
            name,
        )
    }
}

const MAX_TIMEOUT_SECONDS: u32 = 300;
const MAX_DELAY_MILLISECONDS: u32 = 60_000;

/// Every wait the update cycle performs. All of them are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdaterSettings {
    /// How long the instance that asked for the update gets to exit.
    pub parent_exit_timeout: Duration,
    /// How long every other running instance gets to exit.
    pub holder_exit_timeout: Duration,
    /// How long we wait for the executable file to become openable.
    pub exclusive_access_timeout: Duration,
    pub lock_poll_interval: Duration,
    /// Pause after a process exits or is killed, for the OS to let go of its handles.
    pub settle_delay: Duration,
    /// Pause after a forced sweep over all remaining instances.
    pub post_kill_pause: Duration,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            parent_exit_timeout: Duration::from_secs(15),
            holder_exit_timeout: Duration::from_secs(10),
            exclusive_access_timeout: Duration::from_secs(15),
            lock_poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(1000),
            post_kill_pause: Duration::from_millis(2000),
        }
    }
}

/// Look up a value, letting the policy win over the user setting (when policy
/// overrides are compiled in). Unset or unreadable values give `None`.
fn read_value(config: &impl ConfigProvider, name: &str) -> Option<u32> {
    if cfg!(feature = "Feature_policy_overrides") {
        match config.get_policy(name) {
            Ok(v) => return Some(v),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => trace_log_message(&format!("failed to read policy {name}: {e}")),
        }
    }
    match config.get_setting(name) {
        Ok(v) => Some(v),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            trace_log_message(&format!("failed to read setting {name}: {e}"));
            None
        }
    }
}

fn seconds(config: &impl ConfigProvider, name: &str, default: Duration) -> Duration {
    read_value(config, name)
        .map(|v| Duration::from_secs(v.min(MAX_TIMEOUT_SECONDS).into()))
        .unwrap_or(default)
}

fn millis(config: &impl ConfigProvider, name: &str, default: Duration) -> Duration {
    read_value(config, name)
        .map(|v| Duration::from_millis(v.min(MAX_DELAY_MILLISECONDS).into()))
        .unwrap_or(default)
}

impl UpdaterSettings {
    pub fn load(config: &impl ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            parent_exit_timeout: seconds(
                config,
                "ParentExitTimeoutSeconds",
                defaults.parent_exit_timeout,
            ),
            holder_exit_timeout: seconds(
                config,
                "HolderExitTimeoutSeconds",
                defaults.holder_exit_timeout,
            ),
            exclusive_access_timeout: seconds(
                config,
                "ExclusiveAccessTimeoutSeconds",
                defaults.exclusive_access_timeout,
            ),
            lock_poll_interval: millis(
                config,
                "LockPollIntervalMilliseconds",
                defaults.lock_poll_interval,
            ),
            settle_delay: millis(config, "SettleDelayMilliseconds", defaults.settle_delay),
            post_kill_pause: millis(config, "PostKillPauseMilliseconds", defaults.post_kill_pause),
        }
    }
}
