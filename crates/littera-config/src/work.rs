//! Locates a Littera work on disk and parses its `config.yml`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::{default_admin_db, default_superuser};

/// Name of the private directory marking a work root.
pub const RUNTIME_DIR_NAME: &str = ".littera";

/// Configuration file inside [`RUNTIME_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Parsed contents of `.littera/config.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkConfig {
    /// Identity of the work.
    pub work: WorkSection,
    /// Embedded database settings.
    pub postgres: PostgresSection,
}

/// The `work` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WorkSection {
    /// Stable identifier assigned when the work was created.
    pub id: String,
}

/// The `postgres` table of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PostgresSection {
    /// Cluster data directory; relative paths are anchored at the work root.
    pub data_dir: Utf8PathBuf,
    /// Port the engine binds.
    pub port: u16,
    /// Application database.
    pub db_name: String,
    /// Administrative database.
    #[serde(default = "default_admin_db")]
    pub admin_db: String,
    /// Superuser role passed to the init executable.
    #[serde(default = "default_superuser")]
    pub superuser: String,
    /// Numbered SQL migrations applied after re-initialisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations_dir: Option<Utf8PathBuf>,
}

impl WorkConfig {
    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns the YAML error when the text is not a valid work configuration.
    pub fn from_yaml(text: &str) -> Result<Self, serde_saphyr::Error> {
        serde_saphyr::from_str(text)
    }
}

/// Filesystem layout of a work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    work_dir: PathBuf,
    runtime_dir: PathBuf,
    config_path: PathBuf,
}

impl WorkLayout {
    /// Resolves the layout rooted at `work_dir`, failing when it is not a work.
    pub fn locate(work_dir: &Path) -> Result<Self, ConfigError> {
        let work_dir = work_dir
            .canonicalize()
            .map_err(|_| ConfigError::NotAWork {
                path: work_dir.to_path_buf(),
            })?;
        let runtime_dir = work_dir.join(RUNTIME_DIR_NAME);
        if !runtime_dir.is_dir() {
            return Err(ConfigError::NotAWork { path: work_dir });
        }
        let config_path = runtime_dir.join(CONFIG_FILE_NAME);
        if !config_path.is_file() {
            return Err(ConfigError::MissingConfig { path: config_path });
        }
        Ok(Self {
            work_dir,
            runtime_dir,
            config_path,
        })
    }

    /// Reads and parses the configuration file.
    pub fn load(&self) -> Result<WorkConfig, ConfigError> {
        let text =
            fs::read_to_string(&self.config_path).map_err(|source| ConfigError::ReadConfig {
                path: self.config_path.clone(),
                source,
            })?;
        WorkConfig::from_yaml(&text).map_err(|source| ConfigError::ParseConfig {
            path: self.config_path.clone(),
            source,
        })
    }

    /// Canonical work root.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_path()
    }

    /// The work's `.littera` directory.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Location of `config.yml`.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config_path.as_path()
    }
}

/// Errors raised while locating or parsing a work configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The directory has no `.littera` subdirectory.
    #[error("not a Littera work (missing .littera/ in '{path}')")]
    NotAWork { path: PathBuf },
    /// The runtime directory exists but the configuration file does not.
    #[error("invalid Littera work (missing '{path}')")]
    MissingConfig { path: PathBuf },
    /// Reading the configuration file failed.
    #[error("failed to read configuration '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid.
    #[error("failed to parse configuration '{path}': {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_saphyr::Error,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    fn directories_without_runtime_dir_are_not_works() {
        let dir = TempDir::new().expect("temp dir");
        let error = WorkLayout::locate(dir.path()).expect_err("plain directory is not a work");
        assert!(matches!(error, ConfigError::NotAWork { .. }));
    }

    #[rstest]
    fn missing_config_file_is_reported_with_its_path() {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir(dir.path().join(RUNTIME_DIR_NAME)).expect("runtime dir");
        let error = WorkLayout::locate(dir.path()).expect_err("config is required");
        match error {
            ConfigError::MissingConfig { path } => assert!(path.ends_with(".littera/config.yml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case::missing_port("work:\n  id: a\npostgres:\n  data_dir: d\n  db_name: x\n")]
    #[case::bad_port("work:\n  id: a\npostgres:\n  data_dir: d\n  port: many\n  db_name: x\n")]
    fn malformed_configs_fail_to_parse(#[case] body: &str) {
        assert!(WorkConfig::from_yaml(body).is_err());
    }

    #[rstest]
    fn parse_failures_keep_the_yaml_error_as_source() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = dir.path().join(RUNTIME_DIR_NAME);
        fs::create_dir(&runtime).expect("runtime dir");
        fs::write(runtime.join(CONFIG_FILE_NAME), "work:\n  id: a\npostgres: []\n")
            .expect("write config");
        let layout = WorkLayout::locate(dir.path()).expect("locate work");

        let error = layout.load().expect_err("config must not parse");

        assert!(matches!(error, ConfigError::ParseConfig { .. }));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[rstest]
    fn optional_fields_fall_back_to_defaults() {
        let config = WorkConfig::from_yaml(
            "work:\n  id: a\npostgres:\n  data_dir: /tmp/pgdata\n  port: 6000\n  db_name: littera\n",
        )
        .expect("config parses");
        assert_eq!(config.postgres.admin_db, "postgres");
        assert_eq!(config.postgres.superuser, "postgres");
        assert_eq!(config.postgres.migrations_dir, None);
    }
}
