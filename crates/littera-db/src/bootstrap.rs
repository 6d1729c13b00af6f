//! Materialises the cluster directory on first use.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use littera_config::ClusterConfig;
use thiserror::Error;
use tracing::{debug, info};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::bootstrap");

/// Errors surfaced while preparing the cluster directory.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The data directory could not be created.
    #[error("failed to create data directory '{path}': {source}")]
    CreateDataDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The init executable could not be launched.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        /// Executable that failed to spawn.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The init executable ran and reported failure.
    #[error("cluster initialisation failed (status: {status:?}): {stderr}")]
    InitFailed {
        /// Exit code, absent when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error of the init executable.
        stderr: String,
    },
}

/// Ensures the cluster exists on disk without starting it.
///
/// The data directory and its parents are created when missing. The init
/// executable runs only when the cluster marker (`PG_VERSION`) is absent, so
/// repeated calls are cheap. A failed initialisation leaves whatever the init
/// executable wrote in place for inspection.
///
/// # Errors
///
/// Returns [`BootstrapError`] when the directory cannot be created or the init
/// executable cannot be launched or exits unsuccessfully.
pub fn ensure(config: &ClusterConfig) -> Result<(), BootstrapError> {
    let paths = config.paths();
    fs::create_dir_all(paths.data_dir()).map_err(|source| BootstrapError::CreateDataDir {
        path: paths.data_dir().to_path_buf(),
        source,
    })?;

    if paths.cluster_marker_path().is_file() {
        debug!(
            target: BOOTSTRAP_TARGET,
            data_dir = %paths.data_dir().display(),
            "cluster already initialised"
        );
        return Ok(());
    }

    info!(
        target: BOOTSTRAP_TARGET,
        data_dir = %paths.data_dir().display(),
        superuser = config.superuser(),
        "initialising cluster"
    );
    let output = Command::new(config.init_exe_path())
        .arg("-D")
        .arg(paths.data_dir())
        .arg("--no-locale")
        .arg("--encoding=UTF8")
        .arg(format!("--username={}", config.superuser()))
        .stdin(Stdio::null())
        .output()
        .map_err(|source| BootstrapError::Launch {
            program: config.init_exe_path().to_path_buf(),
            source,
        })?;

    if output.status.success() {
        info!(target: BOOTSTRAP_TARGET, "cluster initialised");
        Ok(())
    } else {
        Err(BootstrapError::InitFailed {
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}
