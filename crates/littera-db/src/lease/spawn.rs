//! Launches the detached lease watcher.
//!
//! The watcher runs as its own executable and detaches into a new session as
//! soon as it starts, so it outlives the short-lived caller and its terminal.
//! It receives only the work's runtime directory and rediscovers everything
//! else from there.

use std::env;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use littera_config::{ClusterPaths, WATCHER_BIN_ENV_VAR, executable_name};
use thiserror::Error;
use tracing::{info, warn};

use super::LEASE_TARGET;

/// File stem of the watcher executable.
pub const WATCHER_BIN_NAME: &str = "littera-lease-watcher";

/// Errors raised while launching the watcher.
#[derive(Debug, Error)]
pub enum WatcherSpawnError {
    /// The watcher log could not be opened.
    #[error("failed to open watcher log '{path}': {source}")]
    Log {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The watcher executable could not be spawned.
    #[error("failed to spawn lease watcher '{binary:?}': {source}")]
    Spawn {
        /// Executable that failed to spawn.
        binary: OsString,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Starts a watcher for the lease described by `paths`.
pub trait WatcherLauncher {
    /// Launches the watcher without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherSpawnError`] when the process cannot be started.
    fn launch(&self, paths: &ClusterPaths) -> Result<(), WatcherSpawnError>;
}

/// Launcher that spawns the `littera-lease-watcher` executable.
#[derive(Debug, Default, Clone)]
pub struct SystemWatcherLauncher {
    binary: Option<OsString>,
}

impl SystemWatcherLauncher {
    /// Uses an explicit watcher executable.
    #[must_use]
    pub fn with_binary(binary: impl Into<OsString>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    /// Resolves the executable: the explicit override, `LITTERA_WATCHER_BIN`,
    /// a sibling of the current executable, then a `PATH` lookup by name.
    #[must_use]
    pub fn resolve_binary(&self) -> OsString {
        self.binary
            .clone()
            .or_else(|| env::var_os(WATCHER_BIN_ENV_VAR))
            .or_else(sibling_binary)
            .unwrap_or_else(|| OsString::from(WATCHER_BIN_NAME))
    }
}

fn sibling_binary() -> Option<OsString> {
    let current = env::current_exe().ok()?;
    let candidate = current.parent()?.join(executable_name(WATCHER_BIN_NAME));
    candidate.is_file().then(|| candidate.into_os_string())
}

impl WatcherLauncher for SystemWatcherLauncher {
    fn launch(&self, paths: &ClusterPaths) -> Result<(), WatcherSpawnError> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths.watcher_log_path())
            .map_err(|source| WatcherSpawnError::Log {
                path: paths.watcher_log_path().to_path_buf(),
                source,
            })?;

        let binary = self.resolve_binary();
        let mut command = Command::new(&binary);
        command
            .arg("--littera-dir")
            .arg(paths.runtime_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log));
        let child = command
            .spawn()
            .map_err(|source| WatcherSpawnError::Spawn { binary, source })?;
        info!(
            target: LEASE_TARGET,
            pid = child.id(),
            "lease watcher launched"
        );
        Ok(())
    }
}

/// Launches a watcher, logging and swallowing any failure.
///
/// Without a watcher the engine simply stays up until stopped explicitly.
pub fn spawn_watcher(launcher: &dyn WatcherLauncher, paths: &ClusterPaths) {
    if let Err(error) = launcher.launch(paths) {
        warn!(
            target: LEASE_TARGET,
            error = %error,
            "failed to launch lease watcher; database will stay up"
        );
    }
}
