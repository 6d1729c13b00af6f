//! Immutable description of one embedded database instance.

use std::path::{Path, PathBuf};

use crate::binaries::EngineBinaries;
use crate::paths::ClusterPaths;
use crate::work::{WorkConfig, WorkLayout};

/// Everything the lifecycle manager needs to operate one cluster.
///
/// Built once per work directory and never mutated afterwards. The engine
/// executables come from an [`EngineBinaries`] collaborator; the rest is read
/// from the work's `config.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    data_dir: PathBuf,
    runtime_dir: PathBuf,
    port: u16,
    db_name: String,
    admin_db: String,
    superuser: String,
    init_exe_path: PathBuf,
    control_exe_path: PathBuf,
    reset_exe_path: Option<PathBuf>,
    migrations_dir: Option<PathBuf>,
}

impl ClusterConfig {
    /// Combines a parsed work configuration with resolved engine executables.
    ///
    /// Relative paths in the work configuration are anchored at the work
    /// root so every process resolves the same absolute locations.
    #[must_use]
    pub fn from_work(layout: &WorkLayout, work: &WorkConfig, binaries: &dyn EngineBinaries) -> Self {
        let postgres = &work.postgres;
        let anchor = |path: &camino::Utf8Path| -> PathBuf {
            let path = path.as_std_path();
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                layout.work_dir().join(path)
            }
        };
        Self {
            data_dir: anchor(postgres.data_dir.as_path()),
            runtime_dir: layout.runtime_dir().to_path_buf(),
            port: postgres.port,
            db_name: postgres.db_name.clone(),
            admin_db: postgres.admin_db.clone(),
            superuser: postgres.superuser.clone(),
            init_exe_path: binaries.init_executable_path(),
            control_exe_path: binaries.control_executable_path(),
            reset_exe_path: binaries.reset_executable_path(),
            migrations_dir: postgres.migrations_dir.as_deref().map(anchor),
        }
    }

    /// Directory holding the cluster files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    /// The work's private `.littera` directory.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// TCP port the engine listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Application database name.
    #[must_use]
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Database used for administrative statements such as `CREATE DATABASE`.
    #[must_use]
    pub fn admin_db(&self) -> &str {
        &self.admin_db
    }

    /// Role created by the init executable and used for connections.
    #[must_use]
    pub fn superuser(&self) -> &str {
        &self.superuser
    }

    /// Path to the cluster init executable.
    #[must_use]
    pub fn init_exe_path(&self) -> &Path {
        self.init_exe_path.as_path()
    }

    /// Path to the engine control executable.
    #[must_use]
    pub fn control_exe_path(&self) -> &Path {
        self.control_exe_path.as_path()
    }

    /// Reset tool reported by the binaries collaborator, if any.
    #[must_use]
    pub fn reset_exe_path(&self) -> Option<&Path> {
        self.reset_exe_path.as_deref()
    }

    /// Directory of numbered SQL migrations, if the work configures one.
    #[must_use]
    pub fn migrations_dir(&self) -> Option<&Path> {
        self.migrations_dir.as_deref()
    }

    /// Artefact layout derived from the data and runtime directories.
    #[must_use]
    pub fn paths(&self) -> ClusterPaths {
        ClusterPaths::new(&self.data_dir, &self.runtime_dir)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::binaries::BundledBinaries;

    fn write_work(dir: &Path, body: &str) -> WorkLayout {
        let runtime = dir.join(".littera");
        fs::create_dir_all(&runtime).expect("runtime dir");
        fs::write(runtime.join("config.yml"), body).expect("write config");
        WorkLayout::locate(dir).expect("locate work")
    }

    #[test]
    fn relative_paths_are_anchored_at_the_work_root() {
        let dir = TempDir::new().expect("temp dir");
        let layout = write_work(
            dir.path(),
            "work:\n  id: w1\npostgres:\n  data_dir: .littera/pgdata\n  port: 5544\n  db_name: littera\n  migrations_dir: db/migrations\n",
        );
        let work = layout.load().expect("config parses");
        let binaries = BundledBinaries::for_runtime_dir(layout.runtime_dir());
        let config = ClusterConfig::from_work(&layout, &work, &binaries);

        assert_eq!(config.data_dir(), layout.work_dir().join(".littera/pgdata"));
        assert_eq!(
            config.migrations_dir(),
            Some(layout.work_dir().join("db/migrations").as_path())
        );
        assert_eq!(config.port(), 5544);
        assert_eq!(config.admin_db(), "postgres");
        assert_eq!(config.superuser(), "postgres");
        assert_eq!(config.reset_exe_path(), None);
        assert_eq!(config.paths().lease_path(), layout.runtime_dir().join("pg_lease.json"));
    }
}
