//! The surface the host application talks to. Everything here is bound to the
//! real OS; the logic behind it takes a `Platform` so it can be tested.
use crate::elevate_handler::detect_elevated_reentry;
use crate::messages::{ElevationRequest, UpdateOutcome, UpdatePayloadLocation};
use crate::payload_locator::locate_payload;
use std::ffi::OsString;

pub use crate::error::{Result, UpdaterError};

#[cfg(windows)]
use crate::{helpers::RegistryConfigProvider, helpers::UpdaterSettings};
#[cfg(windows)]
use crate::{update_handler::UpdateHandler, win32::Win32Platform};

/// "Windows 10+", "Windows 8" or "Windows 7".
#[cfg(windows)]
pub fn platform_version() -> String {
    win32resources::os_version()
        .map(|version| version.display_name())
        .unwrap_or_else(|| "Windows ".to_owned())
}

#[cfg(not(windows))]
pub fn platform_version() -> String {
    std::env::consts::OS.to_owned()
}

/// Full path of the running executable.
pub fn executable_path() -> Result<String> {
    let exe = std::env::current_exe().map_err(UpdaterError::CurrentExe)?;
    Ok(exe.to_string_lossy().into_owned())
}

/// Where `restart_app` would take the new files from right now.
pub fn pending_payload() -> Result<UpdatePayloadLocation> {
    let exe = std::env::current_exe().map_err(UpdaterError::CurrentExe)?;
    let install_dir = exe
        .parent()
        .ok_or_else(|| UpdaterError::NoInstallDir(exe.clone()))?;
    Ok(locate_payload(&std::env::temp_dir(), install_dir))
}

/// The build number embedded in our own VERSIONINFO, i.e. whatever follows
/// the `+` in the ProductVersion string.
#[cfg(windows)]
pub fn current_version() -> Result<String> {
    let exe = std::env::current_exe().map_err(UpdaterError::CurrentExe)?;
    let product_version = win32resources::product_version(&exe)?;
    Ok(win32resources::build_number(&product_version)?)
}

#[cfg(not(windows))]
pub fn current_version() -> Result<String> {
    Err(UpdaterError::Unsupported)
}

#[cfg(windows)]
fn with_handler<R>(f: impl FnOnce(&UpdateHandler<Win32Platform>) -> R) -> R {
    let platform = Win32Platform;
    let settings = UpdaterSettings::load(&RegistryConfigProvider);
    f(&UpdateHandler::new(&platform, settings))
}

/// Install the pending update and restart. On `ExitRequested` the caller must
/// exit with the given code straight away.
#[cfg(windows)]
pub fn restart_app() -> Result<UpdateOutcome> {
    with_handler(|handler| handler.restart_app())
}

#[cfg(not(windows))]
pub fn restart_app() -> Result<UpdateOutcome> {
    Err(UpdaterError::Unsupported)
}

/// Runs `run` only when `args` carry the elevated re-entry marker.
fn on_elevated_reentry<I, T, R>(args: I, run: impl FnOnce(&ElevationRequest) -> R) -> Option<R>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    detect_elevated_reentry(args).map(|request| run(&request))
}

/// Has to run before anything else at startup. `None` means this is a normal
/// launch, and nothing else (not even the settings) has been looked at.
#[cfg(windows)]
pub fn check_for_elevated_update<I, T>(args: I) -> Option<Result<UpdateOutcome>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    on_elevated_reentry(args, |request| {
        with_handler(|handler| handler.run_elevated_update(request))
    })
}

#[cfg(not(windows))]
pub fn check_for_elevated_update<I, T>(args: I) -> Option<Result<UpdateOutcome>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    on_elevated_reentry(args, |_| Err(UpdaterError::Unsupported))
}
