use clap::{Arg, ArgAction, Command};
use desktop_updater::api;
use desktop_updater::messages::UpdateOutcome;
use desktop_updater::tracing::{enable_tracing, trace_log_message};

fn updater_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .about("Install a downloaded update of this application and restart it")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("restart")
                .about("Replace the running build with the downloaded one and restart")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Only report where the update would be taken from"),
                ),
        )
        .subcommand(Command::new("platform-version").about("Print the Windows release"))
        .subcommand(Command::new("exe-path").about("Print the path of this executable"))
        .subcommand(
            Command::new("current-version").about("Print the build number of this executable"),
        )
}

fn exit_code(outcome: api::Result<UpdateOutcome>) -> i32 {
    match outcome {
        Ok(UpdateOutcome::ExitRequested { code, .. }) => code,
        Ok(UpdateOutcome::Aborted) => {
            eprintln!("Update cancelled.");
            1
        }
        Err(err) => {
            trace_log_message(&format!("update failed: {err:?}"));
            eprintln!("Update failed: {err}");
            1
        }
    }
}

fn print_result(result: api::Result<String>) -> i32 {
    match result {
        Ok(value) => {
            println!("{value}");
            0
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

fn main() {
    enable_tracing();

    // The elevated half of an update. This has to be looked at before clap
    // gets the command line, and it never falls through to normal startup.
    if let Some(outcome) = api::check_for_elevated_update(std::env::args_os()) {
        std::process::exit(exit_code(outcome));
    }

    let matches = updater_cli().get_matches();
    let code = match matches.subcommand() {
        Some(("restart", sub)) if sub.get_flag("dry-run") => {
            print_result(api::pending_payload().map(|location| {
                format!(
                    "{} (staged download: {})",
                    location.directory.display(),
                    location.is_temporary_staging
                )
            }))
        }
        Some(("restart", _)) => exit_code(api::restart_app()),
        Some(("platform-version", _)) => print_result(Ok(api::platform_version())),
        Some(("exe-path", _)) => print_result(api::executable_path()),
        Some(("current-version", _)) => print_result(api::current_version()),
        _ => 2,
    };
    std::process::exit(code);
}
