//! Work session context: acquire a ready connection, release it safely.
//!
//! Acquiring runs the whole lifecycle in order: resolve the cluster
//! configuration, bootstrap, start, renew the lease, launch the watcher when
//! this caller started the engine, and connect. The resulting
//! [`WorkSession`] remembers whether it started the engine. On release the
//! connection is closed first; the engine is stopped only by its owner and
//! only when no lease keeps it alive.

use std::path::Path;

use littera_config::{BundledBinaries, ClusterConfig, ConfigError, WorkLayout};
use thiserror::Error;
use tracing::{debug, info};

use crate::bootstrap::{self, BootstrapError};
use crate::connect::{ConnectError, Connector, PostgresConnector};
use crate::lease::{self, LeaseError, SystemWatcherLauncher, WatcherLauncher, spawn_watcher};
use crate::process::{self, StartError, StopMode};
use crate::recovery::RecoveryError;

const SESSION_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::session");

/// Resolves the cluster configuration for a work directory.
pub trait ClusterConfigLoader {
    /// Loads the configuration of the work rooted at `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the directory is not a valid work.
    fn load(&self, work_dir: &Path) -> Result<ClusterConfig, ConfigError>;
}

/// Loader that reads `.littera/config.yml` and the bundled engine binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkConfigLoader;

impl ClusterConfigLoader for WorkConfigLoader {
    fn load(&self, work_dir: &Path) -> Result<ClusterConfig, ConfigError> {
        let layout = WorkLayout::locate(work_dir)?;
        let work = layout.load()?;
        let binaries = BundledBinaries::for_runtime_dir(layout.runtime_dir());
        Ok(ClusterConfig::from_work(&layout, &work, &binaries))
    }
}

/// Errors surfaced while acquiring a work session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The work configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The cluster could not be initialised.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The engine needs manual recovery before it can start.
    #[error("{error}")]
    Recovery {
        /// Configuration to hand to the chosen recovery strategy.
        config: Box<ClusterConfig>,
        /// Diagnosis carrying the engine log tail.
        #[source]
        error: RecoveryError,
    },
    /// The engine failed to start for another reason.
    #[error(transparent)]
    Start(StartError),
    /// The keep-alive lease could not be written.
    #[error(transparent)]
    Lease(#[from] LeaseError),
    /// The engine is up but refused the connection.
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl From<StartError> for SessionError {
    fn from(source: StartError) -> Self {
        Self::Start(source)
    }
}

/// Opens [`WorkSession`]s for work directories.
#[derive(Debug, Clone)]
pub struct WorkSessionManager<L, C, W> {
    loader: L,
    connector: C,
    launcher: W,
    lease_seconds: i64,
}

impl WorkSessionManager<WorkConfigLoader, PostgresConnector, SystemWatcherLauncher> {
    /// Manager wired to the real configuration, client, and watcher.
    #[must_use]
    pub fn system() -> Self {
        Self::new(
            WorkConfigLoader,
            PostgresConnector,
            SystemWatcherLauncher::default(),
        )
    }
}

impl<L, C, W> WorkSessionManager<L, C, W>
where
    L: ClusterConfigLoader,
    C: Connector,
    W: WatcherLauncher,
{
    /// Builds a manager using the process's effective lease duration.
    pub fn new(loader: L, connector: C, launcher: W) -> Self {
        Self {
            loader,
            connector,
            launcher,
            lease_seconds: lease::effective_duration(),
        }
    }

    /// Overrides the lease duration for sessions opened by this manager.
    #[must_use]
    pub fn with_lease_seconds(mut self, seconds: i64) -> Self {
        self.lease_seconds = seconds;
        self
    }

    /// Lease duration applied on every acquisition.
    pub fn lease_seconds(&self) -> i64 {
        self.lease_seconds
    }

    /// Opens a session on the work rooted at `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Recovery`] when the engine log shows an
    /// unclean shutdown, and other [`SessionError`] variants when a lifecycle
    /// step fails.
    pub fn acquire(&self, work_dir: &Path) -> Result<WorkSession<C::Connection>, SessionError> {
        let config = self.loader.load(work_dir)?;
        self.acquire_config(config)
    }

    /// Opens a session on an already resolved cluster.
    ///
    /// # Errors
    ///
    /// See [`WorkSessionManager::acquire`].
    pub fn acquire_config(
        &self,
        config: ClusterConfig,
    ) -> Result<WorkSession<C::Connection>, SessionError> {
        bootstrap::ensure(&config)?;
        let started_here = match process::start(&config) {
            Ok(started_here) => started_here,
            Err(StartError::Recovery(error)) => {
                return Err(SessionError::Recovery {
                    config: Box::new(config),
                    error,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let guard = EngineGuard::new(config, started_here, self.lease_seconds);
        let paths = guard.config.paths();
        if let Err(error) = lease::renew(paths.lease_path(), self.lease_seconds) {
            // No watcher will ever see this lease, so an owner must not leave
            // the engine behind.
            if started_here {
                process::stop(&guard.config, StopMode::Fast);
            }
            guard.disarm();
            return Err(error.into());
        }
        if started_here && self.lease_seconds > 0 {
            spawn_watcher(&self.launcher, &paths);
        }

        let connection = self.connector.connect(&guard.config)?;
        info!(
            target: SESSION_TARGET,
            started_here,
            lease_seconds = self.lease_seconds,
            "work session acquired"
        );
        Ok(WorkSession { connection, guard })
    }
}

/// A live connection plus the knowledge of who owns the engine.
///
/// Dropping the session has the same effect as [`WorkSession::release`].
#[derive(Debug)]
pub struct WorkSession<Conn> {
    // Declared first so the connection closes before the guard runs.
    connection: Conn,
    guard: EngineGuard,
}

impl<Conn> WorkSession<Conn> {
    /// The connection opened for this session.
    pub fn connection(&mut self) -> &mut Conn {
        &mut self.connection
    }

    /// Cluster this session is bound to.
    pub fn config(&self) -> &ClusterConfig {
        &self.guard.config
    }

    /// Whether this session's acquisition started the engine.
    pub fn started_here(&self) -> bool {
        self.guard.started_here
    }

    /// Lease duration in force when the session was acquired.
    pub fn lease_seconds(&self) -> i64 {
        self.guard.lease_seconds
    }

    /// Closes the connection, then stops the engine when this session owns
    /// it and no lease keeps it alive.
    ///
    /// Returns whether a stop was requested.
    pub fn release(self) -> bool {
        let Self { connection, guard } = self;
        drop(connection);
        guard.release()
    }
}

/// Applies the stop-on-release rule exactly once.
#[derive(Debug)]
struct EngineGuard {
    config: ClusterConfig,
    started_here: bool,
    lease_seconds: i64,
    armed: bool,
}

impl EngineGuard {
    fn new(config: ClusterConfig, started_here: bool, lease_seconds: i64) -> Self {
        Self {
            config,
            started_here,
            lease_seconds,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }

    fn release(mut self) -> bool {
        self.finish()
    }

    fn finish(&mut self) -> bool {
        if !std::mem::replace(&mut self.armed, false) {
            return false;
        }
        if self.started_here && self.lease_seconds <= 0 {
            debug!(target: SESSION_TARGET, "owner releasing without lease; stopping database");
            return process::stop(&self.config, StopMode::Fast);
        }
        debug!(
            target: SESSION_TARGET,
            started_here = self.started_here,
            lease_seconds = self.lease_seconds,
            "leaving database running"
        );
        false
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        self.finish();
    }
}
