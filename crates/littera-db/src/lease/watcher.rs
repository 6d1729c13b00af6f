//! Polling loop that stops the engine once the lease lapses.

use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::info;

use super::{LEASE_TARGET, LeaseStatus, read};

/// Longest single sleep, so renewals are noticed promptly.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest single sleep.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time source and sleeper driving the watcher loop.
pub trait WatchClock {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;

    /// Blocks for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// Real clock backed by [`SystemTime`] and [`thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WatchClock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Why the watcher loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The lease file disappeared; the engine was stopped.
    LeaseMissing,
    /// The lease could not be interpreted; the engine was left alone.
    LeaseMalformed,
    /// The lease lapsed; the engine was stopped.
    Expired,
}

/// Watches `lease_path` until the keep-alive window ends.
///
/// A missing or expired lease invokes `stop` once and ends the loop. A
/// malformed lease ends the loop without stopping anything. Otherwise the
/// loop sleeps until expiry, capped at [`MAX_POLL_INTERVAL`], and re-reads
/// the lease so renewals by other processes are honoured.
pub fn run_watcher<C, S>(lease_path: &Path, clock: &mut C, mut stop: S) -> WatchOutcome
where
    C: WatchClock,
    S: FnMut(),
{
    loop {
        let lease = match read(lease_path) {
            LeaseStatus::Missing => {
                info!(target: LEASE_TARGET, "lease missing; stopping database");
                stop();
                return WatchOutcome::LeaseMissing;
            }
            LeaseStatus::Malformed => {
                info!(target: LEASE_TARGET, "lease unreadable; leaving database running");
                return WatchOutcome::LeaseMalformed;
            }
            LeaseStatus::Active(lease) => lease,
        };

        let remaining = lease.remaining(clock.now());
        if remaining.is_zero() {
            info!(target: LEASE_TARGET, "lease expired; stopping database");
            stop();
            return WatchOutcome::Expired;
        }
        clock.sleep(remaining.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL));
    }
}
