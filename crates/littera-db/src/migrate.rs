//! Forward-only schema migrations.
//!
//! Migrations are SQL files named `NNNN_description.sql`. Applied versions are
//! recorded in a `schema_version` table; files at or below the highest
//! recorded version are skipped, so re-running is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use postgres::Client;
use thiserror::Error;
use tracing::info;

const MIGRATE_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::migrate");

const CREATE_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TIMESTAMP NOT NULL DEFAULT now()
)";

/// Errors raised while discovering or applying migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The migrations directory could not be listed.
    #[error("failed to list migrations in '{path}': {source}")]
    List {
        /// Migrations directory.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A migration file could not be read.
    #[error("failed to read migration '{path}': {source}")]
    Read {
        /// Migration file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A statement failed; the migration's transaction was rolled back.
    #[error("migration {version} failed: {source}")]
    Apply {
        /// Version being applied, `0` for the bookkeeping table.
        version: i32,
        /// Underlying client error.
        #[source]
        source: postgres::Error,
    },
}

/// A numbered migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Numeric prefix of the file name.
    pub version: i32,
    /// Location of the SQL file.
    pub path: PathBuf,
}

/// Lists numbered `.sql` files in `dir`, ordered by version.
///
/// A missing directory has no migrations. Files without a numeric prefix are
/// ignored.
///
/// # Errors
///
/// Returns [`MigrationError::List`] when the directory exists but cannot be
/// read.
pub fn discover(dir: &Path) -> Result<Vec<Migration>, MigrationError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(MigrationError::List {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut migrations: Vec<Migration> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "sql"))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let prefix = stem.split_once('_').map_or(stem, |(number, _)| number);
            let version = prefix.parse::<i32>().ok()?;
            Some(Migration { version, path })
        })
        .collect();
    migrations.sort_by(|left, right| {
        left.version
            .cmp(&right.version)
            .then_with(|| left.path.cmp(&right.path))
    });
    Ok(migrations)
}

/// Applies every pending migration in `dir`, each in its own transaction.
///
/// Returns the number of migrations applied.
///
/// # Errors
///
/// Returns [`MigrationError`] when a file cannot be read or a statement fails.
pub fn apply(client: &mut Client, dir: &Path) -> Result<usize, MigrationError> {
    let bookkeeping = |source: postgres::Error| MigrationError::Apply { version: 0, source };
    client.batch_execute(CREATE_VERSION_TABLE).map_err(bookkeeping)?;
    let current: i32 = client
        .query_one("SELECT COALESCE(MAX(version), 0) FROM schema_version", &[])
        .and_then(|row| row.try_get(0))
        .map_err(bookkeeping)?;

    let mut applied = 0;
    for migration in discover(dir)?
        .into_iter()
        .filter(|migration| migration.version > current)
    {
        let sql = fs::read_to_string(&migration.path).map_err(|source| MigrationError::Read {
            path: migration.path.clone(),
            source,
        })?;
        let failed = |source: postgres::Error| MigrationError::Apply {
            version: migration.version,
            source,
        };
        let mut transaction = client.transaction().map_err(failed)?;
        transaction.batch_execute(&sql).map_err(failed)?;
        transaction
            .execute(
                "INSERT INTO schema_version (version) VALUES ($1)",
                &[&migration.version],
            )
            .map_err(failed)?;
        transaction.commit().map_err(failed)?;
        info!(
            target: MIGRATE_TARGET,
            version = migration.version,
            file = %migration.path.display(),
            "migration applied"
        );
        applied += 1;
    }
    Ok(applied)
}
