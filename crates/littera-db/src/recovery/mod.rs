//! Crash diagnostics and the two recovery strategies.
//!
//! When the engine refuses to start, the tail of its log is matched against
//! the phrases PostgreSQL emits after an unclean shutdown. A match becomes a
//! [`RecoveryError`] carrying the verbatim tail so a human can decide between
//! [`reset`], which rewrites the write-ahead log and keeps the data, and
//! [`reinitialize`], which discards the cluster and needs an explicit
//! [`DataLossConfirmation`]. Neither strategy is ever chosen automatically.

mod tool;

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use littera_config::ClusterConfig;
use thiserror::Error;
use tracing::{info, warn};

pub use tool::{RESET_TOOL_STEM, ResetToolSearch, locate_reset_tool, locate_reset_tool_with};

use crate::bootstrap::{self, BootstrapError};
use crate::connect::{DatabaseProvisioner, ProvisionError};
use crate::process::{self, StartError, StopMode};

const RECOVERY_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::recovery");

/// Log phrases that mean the cluster needs manual recovery.
pub const CORRUPTION_SIGNATURES: &[&str] = &[
    "could not locate a valid checkpoint record",
    "invalid checkpoint record",
    "invalid primary checkpoint record",
    "could not locate required checkpoint record",
];

/// Bytes read from the end of the engine log when collecting a tail.
const TAIL_WINDOW_BYTES: u64 = 64 * 1024;

/// The engine refused to start after an unclean shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database did not shut down cleanly ({signature}); recovery is required")]
pub struct RecoveryError {
    signature: &'static str,
    log_tail: Vec<String>,
}

impl RecoveryError {
    pub(crate) fn new(signature: &'static str, log_tail: Vec<String>) -> Self {
        Self {
            signature,
            log_tail,
        }
    }

    /// The phrase that identified the failure.
    #[must_use]
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Engine log lines exactly as they were read.
    #[must_use]
    pub fn log_tail(&self) -> &[String] {
        &self.log_tail
    }

    /// The log tail joined into a single block of text.
    #[must_use]
    pub fn log_tail_text(&self) -> String {
        self.log_tail.join("\n")
    }
}

/// Returns the first unclean-shutdown signature present in `log_tail`.
#[must_use]
pub fn diagnose(log_tail: &[String]) -> Option<&'static str> {
    CORRUPTION_SIGNATURES
        .iter()
        .copied()
        .find(|signature| log_tail.iter().any(|line| line.contains(signature)))
}

/// Reads up to the last `lines` lines of the file at `path`.
///
/// A missing or unreadable log yields an empty tail.
#[must_use]
pub fn read_log_tail(path: &Path, lines: usize) -> Vec<String> {
    let Ok(text) = read_tail_window(path) else {
        return Vec::new();
    };
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines);
    all.into_iter().skip(skip).map(str::to_owned).collect()
}

fn read_tail_window(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let length = file.metadata()?.len();
    let offset = length.saturating_sub(TAIL_WINDOW_BYTES);
    file.seek(SeekFrom::Start(offset))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if offset == 0 {
        return Ok(text);
    }
    // Drop the partial first line left by seeking into the middle of the file.
    Ok(text
        .split_once('\n')
        .map_or_else(String::new, |(_, rest)| rest.to_owned()))
}

/// Proof that the operator accepted losing every row in the cluster.
///
/// Only obtainable through
/// [`DataLossConfirmation::acknowledge_all_data_will_be_lost`].
#[derive(Debug)]
pub struct DataLossConfirmation {
    _private: (),
}

impl DataLossConfirmation {
    /// Records the operator's explicit consent to discard the cluster.
    #[must_use]
    pub fn acknowledge_all_data_will_be_lost() -> Self {
        Self { _private: () }
    }
}

/// Result of a successful recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Whether the final start was issued by this call.
    pub started_here: bool,
    /// Migrations re-applied after a re-initialisation.
    pub migrations_applied: usize,
}

/// Errors raised while carrying out a recovery strategy.
#[derive(Debug, Error)]
pub enum RecoveryActionError {
    /// No write-ahead log reset tool was found.
    #[error("could not find pg_resetwal (searched: {})", display_paths(.searched))]
    ToolNotFound {
        /// Every location that was checked, in order.
        searched: Vec<PathBuf>,
    },
    /// The engine is running, so its files must not be touched.
    #[error("database is running (pid {pid}); stop it before recovering")]
    EngineRunning {
        /// PID holding the marker.
        pid: u32,
    },
    /// The reset tool could not be launched.
    #[error("failed to launch '{program}': {source}")]
    ResetLaunch {
        /// Tool that failed to spawn.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The reset tool ran and reported failure.
    #[error("write-ahead log reset failed (status: {status:?}): {stderr}")]
    ResetFailed {
        /// Exit code, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error of the tool.
        stderr: String,
    },
    /// The data directory could not be deleted.
    #[error("failed to remove data directory '{path}': {source}")]
    RemoveDataDir {
        /// Data directory path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Re-creating the cluster failed.
    #[error("failed to re-create cluster: {0}")]
    Bootstrap(#[from] BootstrapError),
    /// The engine still failed to start after recovery.
    #[error("database failed to start after recovery: {0}")]
    Restart(#[from] StartError),
    /// Re-creating the database or its schema failed.
    #[error("failed to restore database: {0}")]
    Provision(#[from] ProvisionError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rewrites the write-ahead log, then starts the engine once.
///
/// Preserves the data files. Uses the system search order to find the tool.
///
/// # Errors
///
/// See [`reset_with`].
pub fn reset(config: &ClusterConfig) -> Result<RecoveryOutcome, RecoveryActionError> {
    reset_with(config, &ResetToolSearch::system())
}

/// Rewrites the write-ahead log using an explicit tool search, then starts
/// the engine once.
///
/// # Errors
///
/// Returns [`RecoveryActionError`] when the engine is running, the tool is
/// missing or fails, or the engine still does not start afterwards.
pub fn reset_with(
    config: &ClusterConfig,
    search: &ResetToolSearch,
) -> Result<RecoveryOutcome, RecoveryActionError> {
    ensure_stopped(config)?;
    let tool = locate_reset_tool_with(config, search)?;

    info!(
        target: RECOVERY_TARGET,
        tool = %tool.display(),
        data_dir = %config.data_dir().display(),
        "resetting write-ahead log"
    );
    let output = Command::new(&tool)
        .arg("-f")
        .arg("-D")
        .arg(config.data_dir())
        .stdin(Stdio::null())
        .output()
        .map_err(|source| RecoveryActionError::ResetLaunch {
            program: tool.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(RecoveryActionError::ResetFailed {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    let started_here = process::start(config)?;
    Ok(RecoveryOutcome {
        started_here,
        migrations_applied: 0,
    })
}

/// Discards the cluster and rebuilds it from scratch.
///
/// Deletes the data directory, re-runs the bootstrap, starts the engine once,
/// recreates the application database and re-applies migrations. A running
/// engine is stopped immediately first since its data is being thrown away.
///
/// # Errors
///
/// Returns [`RecoveryActionError`] when any step fails; there is no retry.
pub fn reinitialize(
    config: &ClusterConfig,
    _confirmation: DataLossConfirmation,
    provisioner: &dyn DatabaseProvisioner,
) -> Result<RecoveryOutcome, RecoveryActionError> {
    if process::state(config).running {
        warn!(target: RECOVERY_TARGET, "stopping running database before re-initialisation");
        process::stop(config, StopMode::Immediate);
    }

    warn!(
        target: RECOVERY_TARGET,
        data_dir = %config.data_dir().display(),
        "discarding cluster"
    );
    match fs::remove_dir_all(config.data_dir()) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => {
            return Err(RecoveryActionError::RemoveDataDir {
                path: config.data_dir().to_path_buf(),
                source: error,
            });
        }
        _ => {}
    }

    bootstrap::ensure(config)?;
    let started_here = process::start(config)?;
    provisioner.ensure_database(config)?;
    let migrations_applied = provisioner.migrate(config)?;
    info!(
        target: RECOVERY_TARGET,
        migrations_applied,
        "cluster re-initialised"
    );
    Ok(RecoveryOutcome {
        started_here,
        migrations_applied,
    })
}

fn ensure_stopped(config: &ClusterConfig) -> Result<(), RecoveryActionError> {
    match process::state(config) {
        process::ClusterState {
            running: true,
            pid: Some(pid),
        } => Err(RecoveryActionError::EngineRunning { pid }),
        _ => Ok(()),
    }
}
