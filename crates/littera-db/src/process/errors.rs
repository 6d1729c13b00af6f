//! Error surface of the process controller.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::recovery::RecoveryError;

/// Errors surfaced while starting the engine.
#[derive(Debug, Error)]
pub enum StartError {
    /// The runtime directory holding the start lock could not be prepared.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The advisory start lock could not be taken.
    #[error("failed to lock '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A stale PID marker could not be removed.
    #[error("failed to remove stale pid marker '{path}': {source}")]
    Cleanup {
        /// Marker path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The control executable could not be launched.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Executable that failed to spawn.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The engine failed to start for a reason that is not recognised.
    #[error("database failed to start (status: {status:?}): {stderr}")]
    Control {
        /// Exit code of the control executable, absent when signalled.
        status: Option<i32>,
        /// Captured standard error of the control executable.
        stderr: String,
        /// Last lines of the engine log.
        log_tail: Vec<String>,
    },
    /// The engine refused to start after an unclean shutdown.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

impl StartError {
    /// Engine log lines captured alongside the failure, if any.
    #[must_use]
    pub fn log_tail(&self) -> &[String] {
        match self {
            Self::Control { log_tail, .. } => log_tail,
            Self::Recovery(error) => error.log_tail(),
            _ => &[],
        }
    }
}
