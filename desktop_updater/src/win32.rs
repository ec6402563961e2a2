use crate::platform::*;
use crate::tracing::trace_log_message;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::mem::size_of;
use std::os::windows::ffi::OsStringExt;
use std::os::windows::fs::OpenOptionsExt;
use std::os::windows::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use windows::{
    core::*, Win32::Foundation::*, Win32::Security::*, Win32::System::Diagnostics::ToolHelp::*,
    Win32::System::Threading::*, Win32::UI::Shell::*, Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL,
};

// From winnt.h. Not worth pulling in Win32_System_SystemServices for two RIDs.
const SECURITY_BUILTIN_DOMAIN_RID: u32 = 0x20;
const DOMAIN_ALIAS_RID_ADMINS: u32 = 0x220;
const SECURITY_NT_AUTHORITY: SID_IDENTIFIER_AUTHORITY = SID_IDENTIFIER_AUTHORITY {
    Value: [0, 0, 0, 0, 0, 5],
};

/// The real thing: Toolhelp snapshots, process handles, ShellExecute and
/// cmd.exe.
#[derive(Default)]
pub struct Win32Platform;

/// The Win32 error code hiding in `err`, for logging and for the status enums.
/// HRESULTs that don't wrap a Win32 error are passed through as-is.
fn win32_code(err: &Error) -> i32 {
    let hr = err.code().0;
    if (hr as u32) & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}

/// OpenProcess on a pid that doesn't exist fails with ERROR_INVALID_PARAMETER.
fn is_no_such_process(err: &Error) -> bool {
    err.code() == ERROR_INVALID_PARAMETER.to_hresult()
}

fn open_process(access: PROCESS_ACCESS_RIGHTS, pid: u32) -> Result<Owned<HANDLE>> {
    unsafe { Ok(Owned::new(OpenProcess(access, false, pid)?)) }
}

pub fn get_process_path_from_handle(process: HANDLE) -> Result<PathBuf> {
    let mut buffer = vec![0u16; MAX_PATH as usize];

    // QueryFullProcessImageNameW doesn't tell us how big the buffer needs to
    // be, so keep doubling until it fits.
    loop {
        let mut len = buffer.len() as u32;
        match unsafe {
            QueryFullProcessImageNameW(
                process,
                Default::default(),
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            )
        } {
            Ok(()) => return Ok(PathBuf::from(OsString::from_wide(&buffer[..len as usize]))),
            Err(err) if err.code() != ERROR_INSUFFICIENT_BUFFER.to_hresult() => return Err(err),
            Err(_) => buffer.resize(buffer.len() * 2, 0),
        };
    }
}

fn snapshot_processes() -> Result<Vec<ProcessEntry>> {
    let snapshot = unsafe { Owned::new(CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)?) };
    let mut entry = PROCESSENTRY32W {
        dwSize: size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut entries = Vec::new();
    unsafe { Process32FirstW(*snapshot, &mut entry)? };
    loop {
        entries.push(ProcessEntry {
            process_id: entry.th32ProcessID,
            parent_process_id: entry.th32ParentProcessID,
        });
        // Fails with ERROR_NO_MORE_FILES at the end of the list.
        if unsafe { Process32NextW(*snapshot, &mut entry) }.is_err() {
            break;
        }
    }
    Ok(entries)
}

fn is_member_of_administrators() -> Result<bool> {
    let mut admin_group = PSID::default();
    unsafe {
        AllocateAndInitializeSid(
            &SECURITY_NT_AUTHORITY,
            2,
            SECURITY_BUILTIN_DOMAIN_RID,
            DOMAIN_ALIAS_RID_ADMINS,
            0,
            0,
            0,
            0,
            0,
            0,
            &mut admin_group,
        )?;
        let mut is_member = BOOL::default();
        let checked = CheckTokenMembership(HANDLE::default(), admin_group, &mut is_member);
        _ = FreeSid(admin_group);
        checked?;
        Ok(is_member.as_bool())
    }
}

impl ProcessApi for Win32Platform {
    fn current_pid(&self) -> u32 {
        std::process::id()
    }

    fn snapshot(&self) -> io::Result<Vec<ProcessEntry>> {
        snapshot_processes().map_err(|err| io::Error::from_raw_os_error(win32_code(&err)))
    }

    fn image_path(&self, pid: u32) -> Option<PathBuf> {
        let process = open_process(PROCESS_QUERY_LIMITED_INFORMATION, pid).ok()?;
        get_process_path_from_handle(*process).ok()
    }

    fn is_alive(&self, pid: u32) -> bool {
        let Ok(process) = open_process(PROCESS_QUERY_LIMITED_INFORMATION, pid) else {
            return false;
        };
        let mut status = 0u32;
        unsafe { GetExitCodeProcess(*process, &mut status) }.is_ok()
            && status == STILL_ACTIVE.0 as u32
    }

    fn wait_for_signal(&self, pid: u32, timeout: Duration) -> WaitStatus {
        let process = match open_process(PROCESS_SYNCHRONIZE, pid) {
            Ok(process) => process,
            Err(err) if is_no_such_process(&err) => return WaitStatus::Gone,
            Err(err) => return WaitStatus::OpenFailed(win32_code(&err)),
        };
        // Stay clear of INFINITE.
        let millis = timeout.as_millis().min(u128::from(INFINITE - 1)) as u32;
        let result = unsafe { WaitForSingleObject(*process, millis) };
        if result == WAIT_OBJECT_0 {
            WaitStatus::Exited
        } else if result == WAIT_TIMEOUT {
            WaitStatus::TimedOut
        } else {
            WaitStatus::WaitFailed(win32_code(&Error::from_win32()))
        }
    }

    fn terminate(&self, pid: u32) -> TerminateStatus {
        let process = match open_process(PROCESS_TERMINATE, pid) {
            Ok(process) => process,
            Err(err) if is_no_such_process(&err) => return TerminateStatus::NotFound,
            Err(err) => return TerminateStatus::OpenFailed(win32_code(&err)),
        };
        match unsafe { TerminateProcess(*process, 1) } {
            Ok(()) => TerminateStatus::Terminated,
            Err(err) => TerminateStatus::Refused(win32_code(&err)),
        }
    }

    fn probe_exclusive(&self, path: &Path) -> LockProbe {
        let opened = OpenOptions::new()
            .read(true)
            .write(true)
            .share_mode(0)
            .open(path);
        match opened {
            Ok(_) => LockProbe::Free,
            Err(err) => match err.raw_os_error() {
                Some(code)
                    if code == ERROR_SHARING_VIOLATION.0 as i32
                        || code == ERROR_LOCK_VIOLATION.0 as i32 =>
                {
                    LockProbe::Locked
                }
                Some(code) => LockProbe::Failed(code),
                None => LockProbe::Failed(ERROR_GEN_FAILURE.0 as i32),
            },
        }
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl ElevationApi for Win32Platform {
    fn is_admin(&self) -> bool {
        is_member_of_administrators().unwrap_or_else(|err| {
            trace_log_message(&format!("admin check failed: {err}"));
            false
        })
    }

    fn shell_execute_runas(&self, exe: &Path, parameters: &str) -> isize {
        let cwd = exe
            .parent()
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        let h_exe = HSTRING::from(exe.as_os_str());
        let h_parameters = HSTRING::from(parameters);
        let h_cwd = HSTRING::from(cwd.as_os_str());
        let mut sei = SHELLEXECUTEINFOW {
            cbSize: size_of::<SHELLEXECUTEINFOW>() as u32,
            lpVerb: w!("runas"),
            lpFile: PCWSTR(h_exe.as_ptr()),
            lpParameters: PCWSTR(h_parameters.as_ptr()),
            lpDirectory: PCWSTR(h_cwd.as_ptr()),
            nShow: SW_SHOWNORMAL.0,
            ..Default::default()
        };
        if let Err(err) = unsafe { ShellExecuteExW(&mut sei) } {
            trace_log_message(&format!("ShellExecuteExW failed: {err}"));
            // hInstApp isn't always filled in on failure.
            let result = sei.hInstApp.0 as isize;
            return if result > 32 { 0 } else { result };
        }
        sei.hInstApp.0 as isize
    }
}

impl ScriptLauncher for Win32Platform {
    fn spawn_detached(&self, script: &Path, working_dir: &Path) -> io::Result<()> {
        let interpreter = which::which("cmd.exe").unwrap_or_else(|_| PathBuf::from("cmd.exe"));

        // Plain `/c "path"` only keeps its quotes when the path has none of
        // `&<>()@^|` in it. With `/s` cmd always strips exactly the outer
        // pair, so the inner pair survives whatever the install dir is called.
        let target = script.strip_prefix(working_dir).unwrap_or(script);
        let mut command_line = OsString::from("\"\"");
        command_line.push(target);
        command_line.push("\"\"");

        Command::new(interpreter)
            .raw_arg("/d /s /c")
            .raw_arg(command_line)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags((CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP).0)
            .spawn()
            .map(drop)
    }
}

impl Platform for Win32Platform {
    fn current_exe(&self) -> io::Result<PathBuf> {
        std::env::current_exe()
    }

    fn temp_dir(&self) -> PathBuf {
        std::env::temp_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::normalize_image_path;
    use crate::script_emitter::SCRIPT_NAME;
    use std::fs;

    fn wait_for_file(path: &Path) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !path.exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(100));
        }
        path.exists()
    }

    /// A pid that was in use a moment ago and isn't anymore.
    fn exited_pid() -> u32 {
        let mut child = Command::new("cmd.exe")
            .args(["/c", "exit"])
            .spawn()
            .unwrap();
        child.wait().unwrap();
        // Dropping the handle lets the process object go away.
        let pid = child.id();
        drop(child);
        pid
    }

    #[test]
    fn test_snapshot_contains_self() {
        let entries = Win32Platform.snapshot().unwrap();
        assert!(entries
            .iter()
            .any(|entry| entry.process_id == std::process::id()));
    }

    #[test]
    fn test_own_image_path() {
        let platform = Win32Platform;
        let image = platform.image_path(std::process::id()).unwrap();
        assert_eq!(
            normalize_image_path(&image),
            normalize_image_path(&platform.current_exe().unwrap())
        );
        assert!(platform.is_alive(std::process::id()));
    }

    #[test]
    fn test_probe_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("demo.exe");
        fs::write(&file, b"MZ").unwrap();

        let held = OpenOptions::new()
            .read(true)
            .share_mode(0)
            .open(&file)
            .unwrap();
        assert_eq!(Win32Platform.probe_exclusive(&file), LockProbe::Locked);
        drop(held);
        assert_eq!(Win32Platform.probe_exclusive(&file), LockProbe::Free);

        assert_eq!(
            Win32Platform.probe_exclusive(&dir.path().join("missing.exe")),
            LockProbe::Failed(ERROR_FILE_NOT_FOUND.0 as i32)
        );
    }

    #[test]
    fn test_missing_process() {
        let pid = exited_pid();
        let platform = Win32Platform;
        assert_eq!(
            platform.wait_for_signal(pid, Duration::from_secs(1)),
            WaitStatus::Gone
        );
        assert_eq!(platform.terminate(pid), TerminateStatus::NotFound);
        assert!(!platform.is_alive(pid));
    }

    #[test]
    fn test_wait_and_terminate_live_process() {
        let mut child = Command::new("cmd.exe")
            .args(["/c", "ping -n 30 127.0.0.1 > NUL"])
            .spawn()
            .unwrap();
        let pid = child.id();
        let platform = Win32Platform;

        assert!(platform.is_alive(pid));
        assert_eq!(
            platform.wait_for_signal(pid, Duration::from_millis(50)),
            WaitStatus::TimedOut
        );
        assert_eq!(platform.terminate(pid), TerminateStatus::Terminated);
        assert_eq!(child.wait().unwrap().code(), Some(1));
    }

    #[test]
    fn test_script_runs_from_awkward_install_dir() {
        let root = tempfile::tempdir().unwrap();
        let install_dir = root.path().join("a (x86) & b");
        fs::create_dir(&install_dir).unwrap();
        let script = install_dir.join(SCRIPT_NAME);
        fs::write(&script, "@echo off\r\necho done> marker.txt\r\n").unwrap();

        Win32Platform.spawn_detached(&script, &install_dir).unwrap();
        assert!(wait_for_file(&install_dir.join("marker.txt")));
    }

    #[test]
    fn test_script_outside_working_dir() {
        let root = tempfile::tempdir().unwrap();
        let script_dir = root.path().join("Program Files (x86)");
        fs::create_dir(&script_dir).unwrap();
        let script = script_dir.join(SCRIPT_NAME);
        fs::write(&script, "@echo off\r\necho done> marker.txt\r\n").unwrap();

        Win32Platform.spawn_detached(&script, root.path()).unwrap();
        assert!(wait_for_file(&root.path().join("marker.txt")));
    }
}
