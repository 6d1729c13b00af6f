//! Derives the on-disk artefacts shared by every lifecycle participant.
//!
//! The engine owns the PID marker, log, and cluster marker inside the data
//! directory. The lifecycle manager owns the lease, start lock, and watcher
//! log inside the work's runtime directory. Every process must agree on these
//! names, so they are derived in exactly one place.

use std::path::{Path, PathBuf};

const PID_FILE_NAME: &str = "postmaster.pid";
const LOG_FILE_NAME: &str = "postgres.log";
const CLUSTER_MARKER_NAME: &str = "PG_VERSION";
const LEASE_FILE_NAME: &str = "pg_lease.json";
const START_LOCK_NAME: &str = "pg_start.lock";
const WATCHER_LOG_NAME: &str = "lease-watcher.log";

/// Canonical paths for the artefacts of one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPaths {
    data_dir: PathBuf,
    runtime_dir: PathBuf,
    pid_path: PathBuf,
    log_path: PathBuf,
    cluster_marker_path: PathBuf,
    lease_path: PathBuf,
    start_lock_path: PathBuf,
    watcher_log_path: PathBuf,
}

impl ClusterPaths {
    /// Derives the artefact layout for a data directory and runtime directory.
    #[must_use]
    pub fn new(data_dir: &Path, runtime_dir: &Path) -> Self {
        Self {
            pid_path: data_dir.join(PID_FILE_NAME),
            log_path: data_dir.join(LOG_FILE_NAME),
            cluster_marker_path: data_dir.join(CLUSTER_MARKER_NAME),
            lease_path: runtime_dir.join(LEASE_FILE_NAME),
            start_lock_path: runtime_dir.join(START_LOCK_NAME),
            watcher_log_path: runtime_dir.join(WATCHER_LOG_NAME),
            data_dir: data_dir.to_path_buf(),
            runtime_dir: runtime_dir.to_path_buf(),
        }
    }

    /// Directory holding the cluster files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    /// Private directory holding lifecycle coordination files.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// PID marker written by the engine while it runs.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Engine log, tailed for crash diagnostics.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log_path.as_path()
    }

    /// File whose presence means the cluster was initialised.
    #[must_use]
    pub fn cluster_marker_path(&self) -> &Path {
        self.cluster_marker_path.as_path()
    }

    /// Keep-alive lease consulted by the watcher.
    #[must_use]
    pub fn lease_path(&self) -> &Path {
        self.lease_path.as_path()
    }

    /// Advisory lock serialising check-then-start sequences.
    #[must_use]
    pub fn start_lock_path(&self) -> &Path {
        self.start_lock_path.as_path()
    }

    /// Destination for the detached watcher's diagnostics.
    #[must_use]
    pub fn watcher_log_path(&self) -> &Path {
        self.watcher_log_path.as_path()
    }
}
