use crate::{OsVersion, VersionError};
use std::ffi::c_void;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr::null_mut;
use std::slice::from_raw_parts;

#[link(name = "version")]
extern "system" {
    fn GetFileVersionInfoSizeW(lptstrFilename: *const u16, lpdwHandle: *mut u32) -> u32;
    fn GetFileVersionInfoW(
        lptstrFilename: *const u16,
        dwHandle: u32,
        dwLen: u32,
        lpData: *mut c_void,
    ) -> i32;
    fn VerQueryValueW(
        pBlock: *const c_void,
        lpSubBlock: *const u16,
        lplpBuffer: *mut *mut c_void,
        puLen: *mut u32,
    ) -> i32;
}

#[allow(non_snake_case)]
#[repr(C)]
struct OSVERSIONINFOW {
    dwOSVersionInfoSize: u32,
    dwMajorVersion: u32,
    dwMinorVersion: u32,
    dwBuildNumber: u32,
    dwPlatformId: u32,
    szCSDVersion: [u16; 128],
}

#[link(name = "ntdll")]
extern "system" {
    // Unlike GetVersionExW, this one isn't lied to by the compatibility shims.
    fn RtlGetVersion(lpVersionInformation: *mut OSVERSIONINFOW) -> i32;
}

#[repr(C)]
#[derive(Clone, Copy)]
struct LangAndCodePage {
    language: u16,
    code_page: u16,
}

fn to_wide_null(s: impl AsRef<std::ffi::OsStr>) -> Vec<u16> {
    s.as_ref().encode_wide().chain(Some(0)).collect()
}

/// Reads the `ProductVersion` string of the first translation in the
/// VERSIONINFO resource of `path`.
pub fn product_version(path: &Path) -> Result<String, VersionError> {
    let file_name = to_wide_null(path);

    let mut handle = 0u32;
    let size = unsafe { GetFileVersionInfoSizeW(file_name.as_ptr(), &mut handle) };
    if size == 0 {
        return Err(VersionError::Size);
    }

    let mut data = vec![0u8; size as usize];
    if unsafe { GetFileVersionInfoW(file_name.as_ptr(), handle, size, data.as_mut_ptr() as _) }
        == 0
    {
        return Err(VersionError::Info);
    }

    let translation = unsafe {
        let mut buffer: *mut c_void = null_mut();
        let mut len = 0u32;
        let sub_block = to_wide_null(r"\VarFileInfo\Translation");
        let found = VerQueryValueW(
            data.as_ptr() as _,
            sub_block.as_ptr(),
            &mut buffer,
            &mut len,
        );
        if found == 0
            || buffer.is_null()
            || (len as usize) < std::mem::size_of::<LangAndCodePage>()
        {
            return Err(VersionError::Translation);
        }
        std::ptr::read_unaligned(buffer as *const LangAndCodePage)
    };

    let sub_block = to_wide_null(format!(
        r"\StringFileInfo\{:04x}{:04x}\ProductVersion",
        translation.language, translation.code_page
    ));
    unsafe {
        let mut buffer: *mut c_void = null_mut();
        let mut len = 0u32;
        if VerQueryValueW(data.as_ptr() as _, sub_block.as_ptr(), &mut buffer, &mut len) == 0
            || buffer.is_null()
        {
            return Err(VersionError::Value);
        }
        // `len` is in characters and usually includes the terminating null.
        let value = from_raw_parts(buffer as *const u16, len as usize);
        let value = String::from_utf16_lossy(value);
        Ok(value.trim_end_matches('\0').to_owned())
    }
}

pub fn os_version() -> Option<OsVersion> {
    let mut info = OSVERSIONINFOW {
        dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOW>() as u32,
        dwMajorVersion: 0,
        dwMinorVersion: 0,
        dwBuildNumber: 0,
        dwPlatformId: 0,
        szCSDVersion: [0; 128],
    };
    // STATUS_SUCCESS is 0.
    if unsafe { RtlGetVersion(&mut info) } != 0 {
        return None;
    }
    Some(OsVersion {
        major: info.dwMajorVersion,
        minor: info.dwMinorVersion,
        build: info.dwBuildNumber,
    })
}
