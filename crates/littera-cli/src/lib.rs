//! Command-line interface runtime for Littera.
//!
//! The module owns argument parsing, telemetry installation, and dispatch of
//! the `db` maintenance commands. The interface is designed to be exercised
//! both from the binary entrypoint and from tests where the configuration
//! loader, watcher launcher, provisioner, and IO streams are substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use littera_db::PostgresProvisioner;
use littera_db::lease::SystemWatcherLauncher;
use littera_db::session::WorkConfigLoader;
use littera_db::telemetry;

mod cli;
mod db;
mod errors;

use cli::{Cli, CliCommand};
use db::{DbOutput, DbServices, run_db_action};
pub(crate) use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let launcher = SystemWatcherLauncher::default();
    let provisioner = PostgresProvisioner::default();
    let services = DbServices {
        loader: &WorkConfigLoader,
        launcher: &launcher,
        provisioner: &provisioner,
    };
    run_with_services(args, stdout, stderr, services)
}

/// Runs the CLI with explicit collaborators.
pub(crate) fn run_with_services<I, W, E>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    services: DbServices<'_>,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = write!(stderr, "{}", AppError::CliUsage(error));
            return ExitCode::FAILURE;
        }
    };

    let result = telemetry::initialise(&cli.log_settings())
        .map_err(AppError::from)
        .and_then(|_| match cli.command {
            CliCommand::Db { action } => {
                let mut output = DbOutput::new(&mut *stdout, &mut *stderr);
                run_db_action(action, &cli.work_dir, services, &mut output)
            }
        });

    match result {
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}
