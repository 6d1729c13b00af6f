//! PID marker parsing and liveness probing.

use std::fs;
use std::io;
use std::path::Path;

use littera_config::ClusterConfig;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::PROCESS_TARGET;

/// Live view of the engine derived from the PID marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterState {
    /// Whether a live process holds the marker.
    pub running: bool,
    /// PID recorded in the marker when the engine is running.
    pub pid: Option<u32>,
}

/// Contents of the PID marker as far as liveness is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Marker {
    Absent,
    Unreadable,
    Pid(u32),
}

/// Reads the first line of the engine's PID marker.
pub(super) fn read_marker(path: &Path) -> Marker {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .next()
            .and_then(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| *pid != 0)
            .map_or(Marker::Unreadable, Marker::Pid),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Marker::Absent,
        Err(_) => Marker::Unreadable,
    }
}

/// Probes `pid` with the null signal.
///
/// Permission errors mean the process exists under another user. Values that
/// do not fit a platform PID cannot name a live process.
pub(super) fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => false,
        Err(errno) => {
            warn!(
                target: PROCESS_TARGET,
                pid,
                error = %errno,
                "unexpected liveness probe failure; assuming alive"
            );
            true
        }
    }
}

/// Removes a marker, treating an already missing file as success.
pub(super) fn remove_marker(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

/// Derives the engine state, deleting the marker when it is stale.
///
/// Failing to delete a stale marker is logged; the engine is still reported as
/// not running.
#[must_use]
pub fn state(config: &ClusterConfig) -> ClusterState {
    let paths = config.paths();
    match read_marker(paths.pid_path()) {
        Marker::Absent => ClusterState::default(),
        Marker::Pid(pid) if is_alive(pid) => ClusterState {
            running: true,
            pid: Some(pid),
        },
        stale => {
            debug!(
                target: PROCESS_TARGET,
                marker = ?stale,
                file = %paths.pid_path().display(),
                "removing stale pid marker"
            );
            if let Err(error) = remove_marker(paths.pid_path()) {
                warn!(
                    target: PROCESS_TARGET,
                    file = %paths.pid_path().display(),
                    error = %error,
                    "failed to remove stale pid marker"
                );
            }
            ClusterState::default()
        }
    }
}
