//! CLI entrypoint for the Littera database maintenance commands.
//!
//! The binary delegates to [`littera_cli::run`], which parses arguments,
//! installs telemetry, resolves the work's cluster, and runs the requested
//! `db` command.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    littera_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
