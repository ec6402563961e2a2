
#[cfg(test)]
mod tests {
    use super::fake_platform::FakePlatform;
    use crate::error::UpdaterError;
    use crate::helpers::UpdaterSettings;
    use crate::messages::{ExitReason, UpdateOutcome};
    use crate::platform::ProcessApi;
    use crate::script_emitter::{ReplacementScript, ScriptOp, SCRIPT_NAME};
    use crate::update_handler::UpdateHandler;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const SCRIPT_LAUNCHED: UpdateOutcome = UpdateOutcome::ExitRequested {
        code: 0,
        reason: ExitReason::ReplacementScriptLaunched,
    };

    /// An install dir with a (fake) executable in it, plus an empty temp dir.
    struct Install {
        root: TempDir,
        temp: TempDir,
    }

    impl Install {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            fs::write(root.path().join("demo.exe"), b"MZ").unwrap();
            Self {
                root,
                temp: tempfile::tempdir().unwrap(),
            }
        }

        fn exe(&self) -> PathBuf {
            self.root.path().join("demo.exe")
        }

        fn platform(&self) -> FakePlatform {
            let platform = FakePlatform::new(100, self.exe());
            platform.set_temp_dir(self.temp.path());
            platform
        }

        fn stage_download(&self, name: &str) -> PathBuf {
            let staging = self.temp.path().join(name);
            fs::create_dir_all(staging.join("update")).unwrap();
            staging
        }

        fn script(&self) -> Vec<ScriptOp> {
            let text = fs::read_to_string(self.root.path().join(SCRIPT_NAME)).unwrap();
            ReplacementScript::parse(&text).operations().to_vec()
        }
    }

    fn text(path: &Path) -> String {
        path.to_str().unwrap().to_owned()
    }

    #[test]
    fn test_startup_without_marker_does_nothing() {
        let install = Install::new();
        let platform = install.platform();
        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());

        assert!(handler.handle_startup(["demo.exe", "restart"]).is_none());
        assert!(platform.waits().is_empty());
        assert!(platform.spawned().is_empty());
    }

    #[test]
    fn test_elevated_reentry_waits_for_originating_instance() {
        let install = Install::new();
        let staging = install.stage_download("desktop_updater_download7f3a");
        let platform = install.platform();
        platform.add_process(200, 1, install.exe());
        platform.exits_after(200, Duration::from_secs(2));
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        let outcome = handler
            .handle_startup(["demo.exe", "--update-elevated", "200"])
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SCRIPT_LAUNCHED);
        assert_eq!(platform.waits(), [(200, Duration::from_secs(15))]);
        assert!(platform.terminated().is_empty());
        // 2s for the exit plus the settle delay, and the file was free at once.
        assert_eq!(platform.elapsed(), Duration::from_secs(3));

        let script_path = install.root.path().join(SCRIPT_NAME);
        assert_eq!(
            platform.spawned(),
            [(script_path, install.root.path().to_path_buf())]
        );

        let ops = install.script();
        assert!(ops.contains(&ScriptOp::CopyTree {
            from: text(&staging.join("update")),
            to: text(install.root.path()),
        }));
        assert!(ops.contains(&ScriptOp::RemoveTree {
            path: text(&staging)
        }));
        assert!(ops.contains(&ScriptOp::Launch {
            executable: text(&install.exe())
        }));
    }

    #[test]
    fn test_declined_elevation_changes_nothing() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(200, 1, install.exe());
        // SE_ERR_ACCESSDENIED
        platform.set_runas_result(5);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        assert_eq!(handler.restart_app().unwrap(), UpdateOutcome::Aborted);

        assert_eq!(
            platform.runas_calls(),
            [(install.exe(), "--update-elevated 100".to_string())]
        );
        assert!(platform.terminated().is_empty());
        assert!(platform.waits().is_empty());
        assert!(platform.spawned().is_empty());
        assert!(!install.root.path().join(SCRIPT_NAME).exists());
    }

    #[test]
    fn test_accepted_elevation_hands_off() {
        let install = Install::new();
        let platform = install.platform();
        platform.set_runas_result(42);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        assert_eq!(
            handler.restart_app().unwrap(),
            UpdateOutcome::ExitRequested {
                code: 0,
                reason: ExitReason::ElevatedInstanceLaunched,
            }
        );
        // The elevated copy does the rest.
        assert!(platform.spawned().is_empty());
        assert!(platform.waits().is_empty());
    }

    #[test]
    fn test_admin_updates_in_place_and_kills_stragglers() {
        let install = Install::new();
        let platform = install.platform();
        platform.set_admin(true);
        platform.add_process(300, 1, install.exe());
        platform.add_process(400, 1, install.temp.path().join("other.exe"));
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        assert_eq!(handler.restart_app().unwrap(), SCRIPT_LAUNCHED);

        assert!(platform.runas_calls().is_empty());
        // Our parent (pid 1) isn't an instance of us, so only 300 is waited on.
        assert_eq!(platform.waits(), [(300, Duration::from_secs(10))]);
        assert_eq!(platform.terminated(), [300]);
        assert!(platform.is_alive(400));
        assert_eq!(platform.elapsed(), Duration::from_secs(11));

        // No staged download, so the update dir beside the executable is used
        // and removed afterwards.
        let update_dir = text(&install.root.path().join("update"));
        let ops = install.script();
        assert!(ops.contains(&ScriptOp::CopyTree {
            from: update_dir.clone(),
            to: text(install.root.path()),
        }));
        assert!(ops.contains(&ScriptOp::RemoveTree { path: update_dir }));
    }

    #[test]
    fn test_parent_instance_found_without_pid() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(200, 1, install.exe());
        platform.set_parent(100, 200);
        platform.exits_after(200, Duration::from_secs(1));
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        let outcome = handler
            .handle_startup(["demo.exe", "--update-elevated"])
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SCRIPT_LAUNCHED);
        assert_eq!(platform.waits(), [(200, Duration::from_secs(15))]);
        assert!(platform.terminated().is_empty());
    }

    #[test]
    fn test_unrelated_parent_is_left_alone() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(50, 1, install.temp.path().join("explorer.exe"));
        platform.set_parent(100, 50);
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        assert_eq!(handler.run_update_cycle(None).unwrap(), SCRIPT_LAUNCHED);

        assert!(platform.waits().is_empty());
        assert!(platform.terminated().is_empty());
        assert!(platform.is_alive(50));
    }

    #[test]
    fn test_foreign_pid_on_command_line_is_left_alone() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(50, 1, install.temp.path().join("explorer.exe"));
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        let outcome = handler
            .handle_startup(["demo.exe", "--update-elevated", "50"])
            .unwrap()
            .unwrap();

        assert_eq!(outcome, SCRIPT_LAUNCHED);
        assert!(platform.waits().is_empty());
        assert!(platform.terminated().is_empty());
        assert!(platform.is_alive(50));
    }

    #[test]
    fn test_locked_executable_gets_a_second_sweep() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(300, 1, install.exe());
        platform.exits_after(300, Duration::from_secs(1));

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        assert_eq!(handler.run_update_cycle(None).unwrap(), SCRIPT_LAUNCHED);

        // 1s exit + 1s settle, 15s of lock polling, 2s after the sweep.
        assert_eq!(platform.elapsed(), Duration::from_secs(19));
        assert!(platform.terminated().is_empty());
        assert_eq!(platform.spawned().len(), 1);
    }

    #[test]
    fn test_configured_timeouts_are_used() {
        let install = Install::new();
        let platform = install.platform();
        platform.add_process(300, 1, install.exe());
        platform.unlock_after(Duration::ZERO);

        let settings = UpdaterSettings {
            holder_exit_timeout: Duration::from_secs(3),
            settle_delay: Duration::ZERO,
            ..UpdaterSettings::default()
        };
        let handler = UpdateHandler::new(&platform, settings);
        handler.run_update_cycle(None).unwrap();

        assert_eq!(platform.waits(), [(300, Duration::from_secs(3))]);
        assert_eq!(platform.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_launch_failure_is_returned() {
        let install = Install::new();
        let platform = install.platform();
        platform.unlock_after(Duration::ZERO);
        platform.fail_spawns();

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        let err = handler.run_update_cycle(None).unwrap_err();

        assert!(matches!(err, UpdaterError::Launch { .. }));
        assert!(install.root.path().join(SCRIPT_NAME).exists());
    }

    #[test]
    fn test_executable_without_directory() {
        let platform = FakePlatform::new(100, "demo.exe");
        platform.unlock_after(Duration::ZERO);

        let handler = UpdateHandler::new(&platform, UpdaterSettings::default());
        let err = handler.run_update_cycle(None).unwrap_err();
        assert!(matches!(err, UpdaterError::NoInstallDir(_)));
        assert!(platform.spawned().is_empty());
    }
}
