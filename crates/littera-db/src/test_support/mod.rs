//! Scripted stand-in for a PostgreSQL installation.
//!
//! [`FakeEngine`] lays out a throwaway work directory whose
//! `.littera/pg/bin` holds shell scripts named after the engine executables.
//! The scripts honour the same arguments and on-disk artefacts as the real
//! tools: `initdb` writes `PG_VERSION`, `pg_ctl start` launches a long
//! sleeping process and records its PID in `postmaster.pid`, and `pg_ctl
//! stop` kills it. Failures and unclean shutdowns are armed through marker
//! files so lifecycle code can be exercised without a database.

mod scripts;

use std::fs;
use std::io;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use littera_config::{
    BundledBinaries, ClusterConfig, ConfigError, RUNTIME_DIR_NAME, executable_name,
};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use once_cell::sync::OnceCell;
use tempfile::TempDir;

use crate::session::{ClusterConfigLoader, WorkConfigLoader};

/// Port written into the fake work's configuration.
pub const FAKE_PORT: u16 = 5544;

const FAKE_CONFIG: &str = "work:
  id: fake-work
postgres:
  data_dir: .littera/pgdata
  port: 5544
  db_name: littera
";

const CORRUPT_MARKER: &str = ".fake-corrupt";

/// Scripts are written once per test binary and linked into each engine, so
/// no executable is ever open for writing while another test spawns it.
static SCRIPTS: OnceCell<TempDir> = OnceCell::new();

fn shared_scripts() -> io::Result<&'static Path> {
    let dir = SCRIPTS.get_or_try_init(|| -> io::Result<TempDir> {
        let dir = TempDir::new()?;
        for (stem, body) in [
            ("initdb", scripts::INITDB),
            ("pg_ctl", scripts::PG_CTL),
            ("pg_resetwal", scripts::PG_RESETWAL),
        ] {
            let path = dir.path().join(executable_name(stem));
            fs::write(&path, body)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }
        Ok(dir)
    })?;
    Ok(dir.path())
}

/// A work directory wired to scripted engine executables.
#[derive(Debug)]
pub struct FakeEngine {
    _root: TempDir,
    work_dir: PathBuf,
}

impl FakeEngine {
    /// Creates a fresh work with a configuration and scripted binaries.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while laying out the directory.
    pub fn new() -> io::Result<Self> {
        let root = TempDir::new()?;
        let work_dir = root.path().canonicalize()?.join("work");
        let engine = Self {
            _root: root,
            work_dir,
        };

        fs::create_dir_all(engine.bin_dir())?;
        fs::write(engine.runtime_dir().join("config.yml"), FAKE_CONFIG)?;
        let scripts = shared_scripts()?;
        for stem in ["initdb", "pg_ctl", "pg_resetwal"] {
            let name = executable_name(stem);
            symlink(scripts.join(&name), engine.bin_dir().join(&name))?;
        }
        Ok(engine)
    }

    /// Root of the fake work.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The work's `.littera` directory.
    pub fn runtime_dir(&self) -> PathBuf {
        self.work_dir.join(RUNTIME_DIR_NAME)
    }

    /// Directory holding the scripted executables.
    pub fn bin_dir(&self) -> PathBuf {
        BundledBinaries::for_runtime_dir(&self.runtime_dir())
            .bin_dir()
            .to_path_buf()
    }

    /// Data directory named by the fake configuration.
    pub fn data_dir(&self) -> PathBuf {
        self.runtime_dir().join("pgdata")
    }

    /// Loads the cluster configuration exactly as a front end would.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the work layout was tampered with.
    pub fn config(&self) -> Result<ClusterConfig, ConfigError> {
        WorkConfigLoader.load(&self.work_dir)
    }

    /// Makes every later `initdb` run fail.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while arming the failure.
    pub fn fail_init(&self) -> io::Result<()> {
        fs::write(self.bin_dir().join("initdb.fail"), b"")
    }

    /// Makes every later `pg_ctl start` fail with an unrecognised error.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while arming the failure.
    pub fn fail_start(&self) -> io::Result<()> {
        fs::write(self.bin_dir().join("pg_ctl.fail"), b"")
    }

    /// Simulates an unclean shutdown: later starts append `log_text` to the
    /// engine log and fail until the write-ahead log is reset or the cluster
    /// is discarded.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while arming the corruption.
    pub fn corrupt(&self, log_text: &str) -> io::Result<()> {
        let data_dir = self.data_dir();
        fs::create_dir_all(&data_dir)?;
        let mut text = log_text.to_owned();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        fs::write(data_dir.join(CORRUPT_MARKER), text)
    }

    /// Removes the reset tool from the bundled binaries.
    ///
    /// # Errors
    ///
    /// Returns any IO error raised while removing the link.
    pub fn remove_reset_tool(&self) -> io::Result<()> {
        fs::remove_file(self.bin_dir().join(executable_name("pg_resetwal")))
    }

    /// Number of times `initdb` ran.
    pub fn init_count(&self) -> usize {
        self.init_calls().len()
    }

    /// Argument lists passed to `initdb`, one entry per run.
    pub fn init_calls(&self) -> Vec<String> {
        self.calls("initdb")
    }

    /// Argument lists passed to `pg_ctl`, one entry per run.
    pub fn control_calls(&self) -> Vec<String> {
        self.calls("pg_ctl")
    }

    /// Argument lists passed to `pg_resetwal`, one entry per run.
    pub fn reset_calls(&self) -> Vec<String> {
        self.calls("pg_resetwal")
    }

    /// Number of `pg_ctl start` invocations.
    pub fn start_count(&self) -> usize {
        self.control_calls()
            .iter()
            .filter(|call| call.ends_with(" start"))
            .count()
    }

    /// Number of `pg_ctl stop` invocations.
    pub fn stop_count(&self) -> usize {
        self.control_calls()
            .iter()
            .filter(|call| call.ends_with(" stop"))
            .count()
    }

    /// PID of the running fake engine, if any.
    pub fn running_pid(&self) -> Option<i32> {
        let text = fs::read_to_string(self.data_dir().join("postmaster.pid")).ok()?;
        text.lines().next()?.trim().parse().ok()
    }

    fn calls(&self, stem: &str) -> Vec<String> {
        fs::read_to_string(self.bin_dir().join(format!("{stem}.calls")))
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        if let Some(pid) = self.running_pid() {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
    }
}
