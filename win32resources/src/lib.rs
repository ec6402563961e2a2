//! Provides APIs for accessing the Win32 resources the updater cares about:
//! the VERSIONINFO block embedded in an executable, and the version of the OS
//! we're running on.
//!
//! Example usage:
//! let build = win32resources::build_number(&win32resources::product_version(&exe)?)?;
//! println!("build {}", build);
use thiserror::Error;

#[cfg(windows)]
mod version_info;
#[cfg(windows)]
pub use version_info::{os_version, product_version};

/// One variant per lookup stage, so callers can tell which part of the
/// VERSIONINFO walk failed.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum VersionError {
    #[error("Unable to get version size.")]
    Size,
    #[error("Unable to get version info.")]
    Info,
    #[error("Unable to get translation info.")]
    Translation,
    #[error("Unable to query version value.")]
    Value,
    #[error("Invalid version format.")]
    Format,
}

/// Extracts the build number from a product version like `1.0.0+2`. The build
/// number is whatever follows the first `+`, with trailing spaces removed.
pub fn build_number(product_version: &str) -> Result<String, VersionError> {
    let (_, build) = product_version
        .split_once('+')
        .ok_or(VersionError::Format)?;
    if build.is_empty() {
        return Err(VersionError::Format);
    }
    Ok(build.trim_end_matches(' ').to_owned())
}

/// `dwMajorVersion`/`dwMinorVersion` as reported by RtlGetVersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl OsVersion {
    /// Coarse, user-facing name of the Windows release. 6.2 and 6.3 are both
    /// reported as 8; anything older than 7 just gets the bare prefix.
    pub fn display_name(&self) -> String {
        let suffix = match (self.major, self.minor) {
            (major, _) if major >= 10 => "10+",
            (6, minor) if minor >= 2 => "8",
            (6, 1) => "7",
            _ => "",
        };
        format!("Windows {suffix}")
    }
}
