//! CLI argument definitions for the Littera maintenance commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use littera_config::{DEFAULT_LOG_FILTER, LogFormat, LogSettings};
use littera_db::StopMode;

/// Command-line interface for Littera.
#[derive(Parser, Debug)]
#[command(name = "littera", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Root of the work (the directory containing `.littera/`).
    #[arg(long, global = true, value_name = "PATH", default_value = ".")]
    pub(crate) work_dir: PathBuf,
    /// Log filter expression, for example `littera_db=debug`.
    #[arg(
        long,
        global = true,
        env = "LITTERA_LOG",
        value_name = "FILTER",
        default_value = DEFAULT_LOG_FILTER
    )]
    pub(crate) log_filter: String,
    /// Log output format (`compact` or `json`).
    #[arg(
        long,
        global = true,
        env = "LITTERA_LOG_FORMAT",
        value_name = "FORMAT",
        default_value_t = LogFormat::Compact
    )]
    pub(crate) log_format: LogFormat,
    /// Command group to run.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

impl Cli {
    /// Logging settings selected by flags and environment.
    pub(crate) fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.log_filter.clone(), self.log_format)
    }
}

/// Top-level command groups.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Maintains the work's embedded database.
    Db {
        /// The maintenance action to perform.
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Embedded database maintenance actions.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum DbAction {
    /// Shows whether the database runs and how long its lease lasts.
    Status,
    /// Starts the database and renews its lease.
    Start {
        /// Lease duration in seconds; `0` disables the lease.
        #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
        lease_seconds: Option<i64>,
    },
    /// Stops the database.
    Stop {
        /// Shutdown mode passed to the engine.
        #[arg(long, value_enum, default_value_t = StopMode::Fast)]
        mode: StopMode,
    },
    /// Shows the remaining lease, or renews it for the given duration.
    Lease {
        /// New lease duration in seconds.
        #[arg(value_name = "SECONDS", allow_negative_numbers = true)]
        seconds: Option<i64>,
    },
    /// Recovers a cluster that failed to start after an unclean shutdown.
    Recover {
        /// The recovery strategy.
        #[command(subcommand)]
        strategy: RecoverAction,
    },
}

/// Recovery strategies.
#[derive(Subcommand, Debug, Clone, Copy)]
pub(crate) enum RecoverAction {
    /// Resets the write-ahead log and keeps the data.
    Reset,
    /// Deletes the cluster and rebuilds it from scratch.
    Reinit {
        /// Acknowledges that every row in the database will be lost.
        #[arg(long)]
        confirm_data_loss: bool,
    },
}
