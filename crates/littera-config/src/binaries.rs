//! Engine executable locations reported by the binary-acquisition layer.
//!
//! Fetching and caching the PostgreSQL distribution happens elsewhere; this
//! module only describes where the resolved executables live so the lifecycle
//! code never has to guess.

use std::env::consts::EXE_SUFFIX;
use std::path::{Path, PathBuf};

/// Collaborator exposing the resolved engine executables.
pub trait EngineBinaries {
    /// Executable that materialises a new cluster (`initdb`).
    fn init_executable_path(&self) -> PathBuf;

    /// Executable that starts and stops the engine (`pg_ctl`).
    fn control_executable_path(&self) -> PathBuf;

    /// Best-effort location of the write-ahead log reset tool (`pg_resetwal`).
    fn reset_executable_path(&self) -> Option<PathBuf>;
}

impl<T> EngineBinaries for &T
where
    T: EngineBinaries + ?Sized,
{
    fn init_executable_path(&self) -> PathBuf {
        (**self).init_executable_path()
    }

    fn control_executable_path(&self) -> PathBuf {
        (**self).control_executable_path()
    }

    fn reset_executable_path(&self) -> Option<PathBuf> {
        (**self).reset_executable_path()
    }
}

/// Binaries unpacked (or symlinked) into a work's private directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledBinaries {
    bin_dir: PathBuf,
}

impl BundledBinaries {
    /// Uses the executables found directly inside `bin_dir`.
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
        }
    }

    /// Uses the `pg/bin` layout beneath a work's `.littera` directory.
    pub fn for_runtime_dir(runtime_dir: &Path) -> Self {
        Self::new(runtime_dir.join("pg").join("bin"))
    }

    /// Directory holding the executables.
    pub fn bin_dir(&self) -> &Path {
        self.bin_dir.as_path()
    }
}

impl EngineBinaries for BundledBinaries {
    fn init_executable_path(&self) -> PathBuf {
        self.bin_dir.join(executable_name("initdb"))
    }

    fn control_executable_path(&self) -> PathBuf {
        self.bin_dir.join(executable_name("pg_ctl"))
    }

    fn reset_executable_path(&self) -> Option<PathBuf> {
        let candidate = self.bin_dir.join(executable_name("pg_resetwal"));
        candidate.is_file().then_some(candidate)
    }
}

/// Appends the platform executable suffix to `stem`.
pub fn executable_name(stem: &str) -> String {
    format!("{stem}{EXE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn bundled_layout_lives_under_pg_bin() {
        let binaries = BundledBinaries::for_runtime_dir(Path::new("/work/.littera"));
        assert_eq!(binaries.bin_dir(), Path::new("/work/.littera/pg/bin"));
        assert!(binaries.control_executable_path().starts_with("/work/.littera/pg/bin"));
        assert!(binaries.init_executable_path().ends_with(executable_name("initdb")));
    }

    #[test]
    fn reset_tool_is_reported_only_when_present() {
        let dir = TempDir::new().expect("temp dir");
        let binaries = BundledBinaries::new(dir.path());
        assert_eq!(binaries.reset_executable_path(), None);

        let tool = dir.path().join(executable_name("pg_resetwal"));
        fs::write(&tool, b"").expect("write reset tool");
        assert_eq!(binaries.reset_executable_path(), Some(tool));
    }
}
