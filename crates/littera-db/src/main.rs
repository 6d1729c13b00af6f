//! Detached lease watcher.
//!
//! Launched by whichever front end started the engine. It first leaves the
//! caller's session, then rediscovers the cluster from the work's `.littera`
//! directory and stops the engine once the keep-alive lease lapses. The exit
//! code is always success: a watcher that cannot do its job simply leaves the
//! engine running.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use littera_config::{LOG_FILTER_ENV_VAR, LogFormat, LogSettings};
use littera_db::lease::{SystemClock, run_watcher};
use littera_db::process::{self, StopMode};
use littera_db::session::{ClusterConfigLoader, WorkConfigLoader};
use littera_db::telemetry;
use nix::errno::Errno;
use nix::unistd::{Pid, setsid};
use tracing::{error, info, warn};

const WATCHER_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Stops the work's database once its lease expires.
#[derive(Debug, Parser)]
#[command(name = "littera-lease-watcher", version)]
struct WatcherArgs {
    /// The work's `.littera` directory.
    #[arg(long = "littera-dir", value_name = "PATH")]
    littera_dir: PathBuf,
}

fn main() -> ExitCode {
    let args = WatcherArgs::parse();
    let detached = setsid();
    let filter = env::var(LOG_FILTER_ENV_VAR).unwrap_or_else(|_| String::from("info"));
    if let Err(error) = telemetry::initialise(&LogSettings::new(filter, LogFormat::Json)) {
        eprintln!("littera-lease-watcher: {error}");
    }
    report_detach(detached);

    let Some(work_dir) = args.littera_dir.parent() else {
        error!(
            target: WATCHER_TARGET,
            littera_dir = %args.littera_dir.display(),
            "runtime directory has no parent work"
        );
        return ExitCode::SUCCESS;
    };
    let config = match WorkConfigLoader.load(work_dir) {
        Ok(config) => config,
        Err(error) => {
            error!(target: WATCHER_TARGET, error = %error, "cannot load work configuration");
            return ExitCode::SUCCESS;
        }
    };

    let paths = config.paths();
    info!(
        target: WATCHER_TARGET,
        lease = %paths.lease_path().display(),
        pid = std::process::id(),
        "lease watcher started"
    );
    let outcome = run_watcher(paths.lease_path(), &mut SystemClock, || {
        process::stop(&config, StopMode::Fast);
    });
    info!(target: WATCHER_TARGET, ?outcome, "lease watcher finished");
    ExitCode::SUCCESS
}

/// Logs the outcome of leaving the caller's session.
///
/// `setsid` fails only when the watcher already leads a process group, as
/// when run by hand from a shell; it then keeps running where it is.
fn report_detach(detached: Result<Pid, Errno>) {
    match detached {
        Ok(session) => info!(
            target: WATCHER_TARGET,
            session = session.as_raw(),
            "detached into a new session"
        ),
        Err(errno) => warn!(
            target: WATCHER_TARGET,
            %errno,
            "could not start a new session; staying in the caller's"
        ),
    }
}
