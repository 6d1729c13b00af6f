//! Keep-alive lease shared by every front end of a work.
//!
//! A lease is a small JSON document, `{"version": 1, "expires_at": <epoch
//! seconds>}`, rewritten in full on every renewal. While it is in the future
//! the engine is expected to stay up; once it lapses the detached watcher
//! stops the engine. The lease is never deleted here: a missing file simply
//! means nobody claims the keep-alive window.

mod spawn;
mod watcher;

use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH};

use littera_config::{DEFAULT_LEASE_SECONDS, LEASE_SECONDS_ENV_VAR, TEST_MODE_ENV_VAR};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub use spawn::{
    SystemWatcherLauncher, WATCHER_BIN_NAME, WatcherLauncher, WatcherSpawnError, spawn_watcher,
};
pub use watcher::{
    MAX_POLL_INTERVAL, MIN_POLL_INTERVAL, SystemClock, WatchClock, WatchOutcome, run_watcher,
};

pub(crate) const LEASE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::lease");

/// Schema version written into every lease.
pub const LEASE_VERSION: u32 = 1;

/// A parsed keep-alive lease.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// Schema version of the document.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Expiry instant in seconds since the Unix epoch.
    pub expires_at: f64,
}

const fn default_version() -> u32 {
    LEASE_VERSION
}

impl Lease {
    /// Builds a lease expiring `duration` after `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Clock`] when `now` precedes the Unix epoch.
    pub fn expiring_after(now: SystemTime, duration: Duration) -> Result<Self, LeaseError> {
        let now = epoch_seconds(now)?;
        Ok(Self {
            version: LEASE_VERSION,
            expires_at: now + duration.as_secs_f64(),
        })
    }

    /// Whether the lease has lapsed at `now`, that is `now >= expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        signed_epoch_seconds(now) >= self.expires_at
    }

    /// Time left before expiry.
    ///
    /// Zero once lapsed; saturates at [`Duration::MAX`] for expiries too far
    /// out to represent.
    #[must_use]
    pub fn remaining(&self, now: SystemTime) -> Duration {
        if self.is_expired(now) {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.expires_at - signed_epoch_seconds(now))
            .unwrap_or(Duration::MAX)
    }
}

/// What a reader found at the lease path.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaseStatus {
    /// No lease file exists.
    Missing,
    /// The file exists but is unreadable, not JSON, or lacks `expires_at`.
    Malformed,
    /// A well-formed lease, expired or not.
    Active(Lease),
}

/// Errors raised while renewing a lease.
#[derive(Debug, Error)]
pub enum LeaseError {
    /// The system clock is before the Unix epoch.
    #[error("failed to read system time: {source}")]
    Clock {
        /// Underlying system time error.
        #[source]
        source: SystemTimeError,
    },
    /// The lease document could not be serialised.
    #[error("failed to serialise lease: {source}")]
    Serialise {
        /// Underlying serialisation error.
        #[from]
        source: serde_json::Error,
    },
    /// The lease path names no directory to stage the new lease in.
    #[error("lease path '{path}' has no parent directory")]
    NoParent {
        /// Lease file path.
        path: PathBuf,
    },
    /// The lease file could not be written.
    #[error("failed to write lease '{path}': {source}")]
    Write {
        /// Lease file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

fn epoch_seconds(instant: SystemTime) -> Result<f64, LeaseError> {
    instant
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .map_err(|source| LeaseError::Clock { source })
}

/// Seconds since the Unix epoch, negative for instants before it.
fn signed_epoch_seconds(instant: SystemTime) -> f64 {
    match instant.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        Err(error) => -error.duration().as_secs_f64(),
    }
}

/// Stages the lease beside its final location, then renames it into place.
///
/// Readers see either the previous lease or the new one, never a torn write.
fn write_lease(lease_path: &Path, lease: &Lease) -> Result<(), LeaseError> {
    let write_error = |source: io::Error| LeaseError::Write {
        path: lease_path.to_path_buf(),
        source,
    };
    let directory = lease_path.parent().ok_or_else(|| LeaseError::NoParent {
        path: lease_path.to_path_buf(),
    })?;

    let mut staged = NamedTempFile::new_in(directory).map_err(write_error)?;
    serde_json::to_writer(&mut staged, lease)?;
    staged.write_all(b"\n").map_err(write_error)?;
    staged.as_file().sync_all().map_err(write_error)?;
    staged
        .persist(lease_path)
        .map_err(|error| write_error(error.error))?;
    File::open(directory)
        .and_then(|dir| dir.sync_all())
        .map_err(write_error)?;
    Ok(())
}

/// Extends the keep-alive window to `seconds` from now.
///
/// Non-positive durations are a no-op and return `Ok(None)`.
///
/// # Errors
///
/// Returns [`LeaseError`] when the lease cannot be written.
pub fn renew(lease_path: &Path, seconds: i64) -> Result<Option<Lease>, LeaseError> {
    renew_at(lease_path, seconds, SystemTime::now())
}

/// Extends the keep-alive window to `seconds` after `now`.
///
/// # Errors
///
/// Returns [`LeaseError`] when the lease cannot be written.
pub fn renew_at(
    lease_path: &Path,
    seconds: i64,
    now: SystemTime,
) -> Result<Option<Lease>, LeaseError> {
    let Ok(seconds) = u64::try_from(seconds) else {
        return Ok(None);
    };
    if seconds == 0 {
        return Ok(None);
    }
    let lease = Lease::expiring_after(now, Duration::from_secs(seconds))?;
    write_lease(lease_path, &lease)?;
    debug!(
        target: LEASE_TARGET,
        file = %lease_path.display(),
        expires_at = lease.expires_at,
        "lease renewed"
    );
    Ok(Some(lease))
}

/// Reads the lease at `lease_path` without ever failing.
#[must_use]
pub fn read(lease_path: &Path) -> LeaseStatus {
    match fs::read(lease_path) {
        Ok(bytes) => serde_json::from_slice::<Lease>(&bytes)
            .map_or(LeaseStatus::Malformed, LeaseStatus::Active),
        Err(error) if error.kind() == io::ErrorKind::NotFound => LeaseStatus::Missing,
        Err(_) => LeaseStatus::Malformed,
    }
}

/// Lease duration for the current process, in seconds.
///
/// Defaults to [`DEFAULT_LEASE_SECONDS`], or `0` under automated tests. The
/// `LITTERA_PG_LEASE_SECONDS` variable wins whenever it parses as an integer.
#[must_use]
pub fn effective_duration() -> i64 {
    let under_test = cfg!(test) || env::var_os(TEST_MODE_ENV_VAR).is_some();
    resolve_duration(|key| env::var(key).ok(), under_test)
}

/// Resolves the lease duration from an environment lookup.
#[must_use]
pub fn resolve_duration(lookup: impl Fn(&str) -> Option<String>, under_test: bool) -> i64 {
    let default = if under_test { 0 } else { DEFAULT_LEASE_SECONDS };
    lookup(LEASE_SECONDS_ENV_VAR)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(default)
}
