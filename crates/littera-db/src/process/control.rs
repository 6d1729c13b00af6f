//! Drives the engine control executable.

use std::process::{Command, Output, Stdio};

use littera_config::ClusterConfig;
use tracing::{info, warn};

use super::errors::StartError;
use super::lock::StartLock;
use super::marker::{Marker, is_alive, read_marker, remove_marker};
use super::{LOG_TAIL_LINES, PROCESS_TARGET, StopMode};
use crate::recovery::{RecoveryError, diagnose, read_log_tail};

/// Starts the engine unless a live process already holds the PID marker.
///
/// Returns `Ok(true)` when this call launched the engine and `Ok(false)` when
/// it was already running. The whole check-then-start sequence runs under the
/// advisory start lock. A stale or unreadable marker is deleted before
/// launching.
///
/// # Errors
///
/// Returns [`StartError::Recovery`] when the engine log shows an unclean
/// shutdown signature, and [`StartError::Control`] for any other failed launch
/// unless a concurrent starter won the race.
pub fn start(config: &ClusterConfig) -> Result<bool, StartError> {
    let paths = config.paths();
    let _lock = StartLock::acquire(paths.start_lock_path())?;

    match read_marker(paths.pid_path()) {
        Marker::Pid(pid) if is_alive(pid) => {
            info!(target: PROCESS_TARGET, pid, "database already running");
            return Ok(false);
        }
        Marker::Absent => {}
        stale => {
            warn!(
                target: PROCESS_TARGET,
                marker = ?stale,
                file = %paths.pid_path().display(),
                "removing stale pid marker"
            );
            remove_marker(paths.pid_path()).map_err(|source| StartError::Cleanup {
                path: paths.pid_path().to_path_buf(),
                source,
            })?;
        }
    }

    info!(
        target: PROCESS_TARGET,
        data_dir = %paths.data_dir().display(),
        port = config.port(),
        "starting database"
    );
    let output = Command::new(config.control_exe_path())
        .arg("-D")
        .arg(paths.data_dir())
        .arg("-l")
        .arg(paths.log_path())
        .arg("-o")
        .arg(format!("-F -p {}", config.port()))
        .args(["-w", "start"])
        .stdin(Stdio::null())
        .output()
        .map_err(|source| StartError::Launch {
            program: config.control_exe_path().to_path_buf(),
            source,
        })?;

    if output.status.success() {
        info!(target: PROCESS_TARGET, port = config.port(), "database started");
        return Ok(true);
    }
    classify_failure(config, &output)
}

fn classify_failure(config: &ClusterConfig, output: &Output) -> Result<bool, StartError> {
    let paths = config.paths();
    let log_tail = read_log_tail(paths.log_path(), LOG_TAIL_LINES);

    if let Some(signature) = diagnose(&log_tail) {
        warn!(
            target: PROCESS_TARGET,
            signature,
            "database refused to start after an unclean shutdown"
        );
        return Err(RecoveryError::new(signature, log_tail).into());
    }

    if let Marker::Pid(pid) = read_marker(paths.pid_path())
        && is_alive(pid)
    {
        warn!(
            target: PROCESS_TARGET,
            pid,
            "start failed but a concurrent starter brought the database up"
        );
        return Ok(false);
    }

    Err(StartError::Control {
        status: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        log_tail,
    })
}

/// Asks the engine to stop when a PID marker exists.
///
/// Returns `false` when there is no marker and `true` once a stop was
/// requested. Failures of the control executable are logged and swallowed;
/// stopping is best effort and safe to repeat.
pub fn stop(config: &ClusterConfig, mode: StopMode) -> bool {
    let paths = config.paths();
    if !paths.pid_path().exists() {
        return false;
    }

    info!(target: PROCESS_TARGET, %mode, "stopping database");
    let result = Command::new(config.control_exe_path())
        .arg("-D")
        .arg(paths.data_dir())
        .arg("-m")
        .arg(mode.to_string())
        .args(["-w", "stop"])
        .stdin(Stdio::null())
        .output();

    match result {
        Ok(output) if output.status.success() => {
            info!(target: PROCESS_TARGET, "database stopped");
        }
        Ok(output) => warn!(
            target: PROCESS_TARGET,
            status = ?output.status.code(),
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "stop request failed"
        ),
        Err(error) => warn!(
            target: PROCESS_TARGET,
            program = %config.control_exe_path().display(),
            error = %error,
            "failed to launch stop request"
        ),
    }
    true
}
