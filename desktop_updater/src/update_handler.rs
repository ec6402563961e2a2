use crate::elevate_handler::{detect_elevated_reentry, is_elevated, relaunch_elevated};
use crate::error::{Result, UpdaterError};
use crate::helpers::UpdaterSettings;
use crate::messages::{ElevationRequest, ExitReason, UpdateOutcome};
use crate::payload_locator::locate_payload;
use crate::platform::Platform;
use crate::process_inspector::{any_holder_alive, list_processes_using_executable, parent_of};
use crate::process_terminator::{terminate_all_using, wait_for_exclusive_access, wait_for_exit};
use crate::script_emitter;
use crate::tracing;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Drives one update from "the user clicked restart" to "the replacement
/// script owns the install dir". It never ends the process itself; the
/// terminal states come back as `UpdateOutcome::ExitRequested` and whoever
/// embeds us is expected to exit right away.
pub struct UpdateHandler<'a, P: Platform> {
    platform: &'a P,
    settings: UpdaterSettings,
}

impl<'a, P: Platform> UpdateHandler<'a, P> {
    pub fn new(platform: &'a P, settings: UpdaterSettings) -> Self {
        Self { platform, settings }
    }

    /// Call this first thing at startup. If we were started as the elevated
    /// half of an update, this runs the update and returns its outcome;
    /// otherwise it returns `None` and the application starts normally.
    pub fn handle_startup<I, T>(&self, args: I) -> Option<Result<UpdateOutcome>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let request = detect_elevated_reentry(args)?;
        Some(self.run_elevated_update(&request))
    }

    /// The "restart app" entry point for a normal (not re-entered) run.
    ///
    /// * Already admin: run the update right here.
    /// * Not admin: start an elevated copy of ourselves to do it, and ask to
    ///   exit. If the user declines the prompt, nothing happened and we
    ///   return `Aborted`.
    pub fn restart_app(&self) -> Result<UpdateOutcome> {
        if is_elevated(self.platform) {
            tracing::trace_log_message("already elevated, updating in place");
            tracing::trace_update_started(None, false);
            return self.run_update_cycle(None);
        }

        let exe = self.current_exe()?;
        if relaunch_elevated(self.platform, &exe, self.platform.current_pid()) {
            tracing::trace_log_message("elevated instance started, exiting");
            Ok(UpdateOutcome::ExitRequested {
                code: 0,
                reason: ExitReason::ElevatedInstanceLaunched,
            })
        } else {
            tracing::trace_log_message("elevation declined or failed, update cancelled");
            Ok(UpdateOutcome::Aborted)
        }
    }

    pub fn run_elevated_update(&self, request: &ElevationRequest) -> Result<UpdateOutcome> {
        tracing::trace_update_started(request.originating_parent_pid, request.marker);
        self.run_update_cycle(request.originating_parent_pid)
    }

    /// Clear every holder of our executable, then hand the copy off to the
    /// replacement script. Each of the wait/kill stages re-reads the OS state,
    /// so running them again after a kill is harmless.
    pub fn run_update_cycle(&self, originating_pid: Option<u32>) -> Result<UpdateOutcome> {
        let api = self.platform;
        let settings = &self.settings;
        let exe = self.current_exe()?;
        let install_dir = install_dir_of(&exe)?;
        let current_pid = api.current_pid();

        let holders = list_processes_using_executable(api, &exe);

        // The originating process is whoever handed us the pid, else our OS
        // parent. Either way it only gets waited on (and killed) if it's
        // running our executable, so a stale or foreign pid can't take down
        // whatever shell happens to own it now.
        let is_holder = |pid: &u32| holders.iter().any(|h| h.process_id == *pid);
        let originating_pid = match originating_pid {
            Some(pid) if !is_holder(&pid) => {
                tracing::trace_log_message(&format!(
                    "process {pid} isn't running our executable, not waiting for it"
                ));
                None
            }
            Some(pid) => Some(pid),
            None => parent_of(api, current_pid).filter(is_holder),
        }
        .filter(|&pid| pid != current_pid);

        if let Some(pid) = originating_pid {
            tracing::trace_log_message(&format!("waiting for the originating process {pid}"));
            wait_for_exit(api, pid, settings.parent_exit_timeout, settings.settle_delay);
        }

        for holder in &holders {
            let pid = holder.process_id;
            if Some(pid) == originating_pid || pid == current_pid || !api.is_alive(pid) {
                continue;
            }
            tracing::trace_log_message(&format!("waiting for additional process {pid}"));
            wait_for_exit(api, pid, settings.holder_exit_timeout, settings.settle_delay);
        }

        if any_holder_alive(api, &exe) {
            tracing::trace_log_message("processes still running, terminating all of them");
            terminate_all_using(api, &exe, settings.settle_delay);
            api.sleep(settings.post_kill_pause);
        }

        if !wait_for_exclusive_access(
            api,
            &exe,
            settings.exclusive_access_timeout,
            settings.lock_poll_interval,
        ) {
            tracing::trace_log_message("executable still in use, terminating again");
            terminate_all_using(api, &exe, settings.settle_delay);
            api.sleep(settings.post_kill_pause);
        }

        let payload = locate_payload(&api.temp_dir(), &install_dir);
        let script = script_emitter::emit(
            &payload.directory,
            &install_dir,
            &exe,
            payload.staging_dir(),
        )?;
        let script_path = script.write_to(&install_dir)?;

        let launched = api.spawn_detached(&script_path, &install_dir);
        tracing::trace_script_launched(&script_path.to_string_lossy(), launched.is_ok());
        launched.map_err(|source| UpdaterError::Launch {
            path: script_path.clone(),
            source,
        })?;

        Ok(UpdateOutcome::ExitRequested {
            code: 0,
            reason: ExitReason::ReplacementScriptLaunched,
        })
    }

    fn current_exe(&self) -> Result<PathBuf> {
        self.platform.current_exe().map_err(UpdaterError::CurrentExe)
    }
}

fn install_dir_of(exe: &Path) -> Result<PathBuf> {
    exe.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| UpdaterError::NoInstallDir(exe.to_path_buf()))
}
