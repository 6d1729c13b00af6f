//! Starts, stops, and probes the engine process.
//!
//! Liveness is derived from the engine's PID marker plus a zero signal probe.
//! A marker naming a dead process is a stale lock left by a crash and is
//! removed on sight.

mod control;
mod errors;
mod lock;
mod marker;

pub use control::{start, stop};
pub use errors::StartError;
pub use marker::{ClusterState, state};

use clap::ValueEnum;
use strum::{Display, EnumString};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::process");

/// Number of engine log lines kept for diagnostics after a failed start.
pub const LOG_TAIL_LINES: usize = 20;

/// Shutdown mode forwarded to the control executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StopMode {
    /// Waits for clients to disconnect.
    Smart,
    /// Rolls back open transactions and disconnects clients.
    #[default]
    Fast,
    /// Aborts without a clean shutdown; the next start replays the log.
    Immediate,
}
