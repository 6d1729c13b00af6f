//! Implements the `littera db` maintenance commands.
//!
//! Each command resolves the work's cluster, performs one lifecycle step, and
//! reports the outcome in a single line. A start that trips over an unclean
//! shutdown prints the engine log tail and the two recovery commands instead
//! of guessing which one the operator wants.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::time::SystemTime;

use littera_config::ClusterConfig;
use littera_db::connect::DatabaseProvisioner;
use littera_db::lease::{self, LeaseStatus, WatcherLauncher, spawn_watcher};
use littera_db::process::{self, StopMode};
use littera_db::recovery::{self, DataLossConfirmation};
use littera_db::session::ClusterConfigLoader;
use littera_db::{RecoveryError, StartError, bootstrap};
use tracing::debug;

use crate::AppError;
use crate::cli::{DbAction, RecoverAction};

const CLI_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::db");

/// Collaborators used by the maintenance commands.
#[derive(Clone, Copy)]
pub(crate) struct DbServices<'a> {
    pub(crate) loader: &'a dyn ClusterConfigLoader,
    pub(crate) launcher: &'a dyn WatcherLauncher,
    pub(crate) provisioner: &'a dyn DatabaseProvisioner,
}

/// Wrapper around the CLI output streams used by command handlers.
pub(crate) struct DbOutput<W, E> {
    pub(crate) stdout: W,
    pub(crate) stderr: E,
}

impl<W: Write, E: Write> DbOutput<W, E> {
    pub(crate) fn new(stdout: W, stderr: E) -> Self {
        Self { stdout, stderr }
    }

    fn stdout_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stdout.write_fmt(args)?;
        self.stdout.write_all(b"\n")?;
        Ok(())
    }

    fn stderr_line(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stderr.write_fmt(args)?;
        self.stderr.write_all(b"\n")?;
        Ok(())
    }
}

/// Runs one `db` action against the work rooted at `work_dir`.
pub(crate) fn run_db_action<W: Write, E: Write>(
    action: DbAction,
    work_dir: &Path,
    services: DbServices<'_>,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let config = services.loader.load(work_dir)?;
    debug!(
        target: CLI_TARGET,
        data_dir = %config.data_dir().display(),
        port = config.port(),
        "resolved cluster"
    );
    match action {
        DbAction::Status => status(&config, output),
        DbAction::Start { lease_seconds } => start(&config, lease_seconds, services, output),
        DbAction::Stop { mode } => stop(&config, mode, output),
        DbAction::Lease { seconds } => lease_command(&config, seconds, output),
        DbAction::Recover { strategy } => recover(&config, strategy, services, output),
    }
}

fn status<W: Write, E: Write>(
    config: &ClusterConfig,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let state = process::state(config);
    match state.pid {
        Some(pid) if state.running => output.stdout_line(format_args!(
            "Postgres: running (port {}, pid {pid})",
            config.port()
        ))?,
        _ => output.stdout_line(format_args!("Postgres: not running"))?,
    }

    match lease::read(config.paths().lease_path()) {
        LeaseStatus::Active(lease) => output.stdout_line(format_args!(
            "Lease: expires in {}s",
            lease.remaining(SystemTime::now()).as_secs()
        ))?,
        LeaseStatus::Missing => output.stdout_line(format_args!("Lease: none"))?,
        LeaseStatus::Malformed => output.stdout_line(format_args!("Lease: unreadable"))?,
    }
    Ok(ExitCode::SUCCESS)
}

fn start<W: Write, E: Write>(
    config: &ClusterConfig,
    lease_seconds: Option<i64>,
    services: DbServices<'_>,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    bootstrap::ensure(config)?;
    let started_here = match process::start(config) {
        Ok(started_here) => started_here,
        Err(StartError::Recovery(error)) => {
            report_recovery_required(&error, output)?;
            return Ok(ExitCode::FAILURE);
        }
        Err(other) => return Err(other.into()),
    };

    let seconds = lease_seconds.unwrap_or_else(lease::effective_duration);
    keep_alive(config, started_here, seconds, services)?;

    if started_here {
        output.stdout_line(format_args!("Started Postgres (port {})", config.port()))?;
    } else {
        output.stdout_line(format_args!(
            "Postgres already running (port {})",
            config.port()
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn stop<W: Write, E: Write>(
    config: &ClusterConfig,
    mode: StopMode,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    if process::stop(config, mode) {
        output.stdout_line(format_args!("Stopped Postgres"))?;
    } else {
        output.stdout_line(format_args!("Postgres was not running"))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn lease_command<W: Write, E: Write>(
    config: &ClusterConfig,
    seconds: Option<i64>,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    let paths = config.paths();
    let Some(seconds) = seconds else {
        return match lease::read(paths.lease_path()) {
            LeaseStatus::Active(lease) => {
                let remaining = lease.remaining(SystemTime::now()).as_secs();
                output.stdout_line(format_args!("{remaining}"))?;
                Ok(ExitCode::SUCCESS)
            }
            LeaseStatus::Missing => {
                output.stdout_line(format_args!("(no lease)"))?;
                Ok(ExitCode::SUCCESS)
            }
            LeaseStatus::Malformed => {
                output.stdout_line(format_args!("(unreadable)"))?;
                Ok(ExitCode::FAILURE)
            }
        };
    };

    lease::renew(paths.lease_path(), seconds)?;
    output.stdout_line(format_args!("Lease renewed: {seconds}s"))?;
    Ok(ExitCode::SUCCESS)
}

fn recover<W: Write, E: Write>(
    config: &ClusterConfig,
    strategy: RecoverAction,
    services: DbServices<'_>,
    output: &mut DbOutput<W, E>,
) -> Result<ExitCode, AppError> {
    match strategy {
        RecoverAction::Reset => {
            let outcome = recovery::reset(config)?;
            keep_alive(config, outcome.started_here, lease::effective_duration(), services)?;
            output.stdout_line(format_args!(
                "Write-ahead log reset; Postgres running (port {})",
                config.port()
            ))?;
        }
        RecoverAction::Reinit { confirm_data_loss } => {
            if !confirm_data_loss {
                return Err(AppError::ConfirmationRequired);
            }
            let outcome = recovery::reinitialize(
                config,
                DataLossConfirmation::acknowledge_all_data_will_be_lost(),
                services.provisioner,
            )?;
            keep_alive(config, outcome.started_here, lease::effective_duration(), services)?;
            output.stdout_line(format_args!(
                "Cluster re-initialised; {} migrations applied; Postgres running (port {})",
                outcome.migrations_applied,
                config.port()
            ))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Renews the lease and, for an engine this command started, launches the
/// watcher that will eventually stop it.
fn keep_alive(
    config: &ClusterConfig,
    started_here: bool,
    seconds: i64,
    services: DbServices<'_>,
) -> Result<(), AppError> {
    let paths = config.paths();
    lease::renew(paths.lease_path(), seconds)?;
    if started_here && seconds > 0 {
        spawn_watcher(services.launcher, &paths);
    }
    Ok(())
}

fn report_recovery_required<W: Write, E: Write>(
    error: &RecoveryError,
    output: &mut DbOutput<W, E>,
) -> Result<(), AppError> {
    output.stderr_line(format_args!("{error}"))?;
    output.stderr_line(format_args!("Recent log output:"))?;
    for line in error.log_tail() {
        output.stderr_line(format_args!("{line}"))?;
    }
    output.stderr_line(format_args!("Recover with one of:"))?;
    output.stderr_line(format_args!(
        "  littera db recover reset                        (keeps data)"
    ))?;
    output.stderr_line(format_args!(
        "  littera db recover reinit --confirm-data-loss   (deletes all data)"
    ))?;
    Ok(())
}
