//! Opens client connections and provisions the application database.

use littera_config::ClusterConfig;
use postgres::{Client, NoTls};
use thiserror::Error;
use tracing::info;

use crate::migrate::{self, MigrationError};

const CONNECT_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::connect");

/// Errors raised while opening a connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The engine rejected or never answered the connection.
    #[error("failed to connect to database '{database}' on port {port}: {source}")]
    Connect {
        /// Database that was requested.
        database: String,
        /// Port that was dialled.
        port: u16,
        /// Underlying client error.
        #[source]
        source: postgres::Error,
    },
}

/// Opens a client connection to a running cluster.
pub trait Connector {
    /// Handle returned to the session owner.
    type Connection;

    /// Connects to the application database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the connection cannot be established.
    fn connect(&self, config: &ClusterConfig) -> Result<Self::Connection, ConnectError>;
}

/// Connector backed by the blocking `postgres` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresConnector;

impl PostgresConnector {
    /// Connects to an arbitrary database of the cluster as the superuser.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] when the connection cannot be established.
    pub fn connect_to(
        &self,
        config: &ClusterConfig,
        database: &str,
    ) -> Result<Client, ConnectError> {
        postgres::Config::new()
            .host("localhost")
            .port(config.port())
            .user(config.superuser())
            .dbname(database)
            .connect(NoTls)
            .map_err(|source| ConnectError::Connect {
                database: database.to_owned(),
                port: config.port(),
                source,
            })
    }
}

impl Connector for PostgresConnector {
    type Connection = Client;

    fn connect(&self, config: &ClusterConfig) -> Result<Client, ConnectError> {
        self.connect_to(config, config.db_name())
    }
}

/// Errors raised while creating the application database or its schema.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Connecting failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),
    /// A provisioning statement failed.
    #[error("failed to create database '{database}': {source}")]
    CreateDatabase {
        /// Database being created.
        database: String,
        /// Underlying client error.
        #[source]
        source: postgres::Error,
    },
    /// Applying migrations failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Recreates the application database and its schema on a fresh cluster.
pub trait DatabaseProvisioner {
    /// Creates the application database when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the database cannot be created.
    fn ensure_database(&self, config: &ClusterConfig) -> Result<(), ProvisionError>;

    /// Applies pending migrations and returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when a migration fails.
    fn migrate(&self, config: &ClusterConfig) -> Result<usize, ProvisionError>;
}

/// Provisioner that talks to the cluster through [`PostgresConnector`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresProvisioner {
    connector: PostgresConnector,
}

impl DatabaseProvisioner for PostgresProvisioner {
    fn ensure_database(&self, config: &ClusterConfig) -> Result<(), ProvisionError> {
        let mut admin = self.connector.connect_to(config, config.admin_db())?;
        let create_error = |source: postgres::Error| ProvisionError::CreateDatabase {
            database: config.db_name().to_owned(),
            source,
        };
        let existing = admin
            .query_opt(
                "SELECT 1 FROM pg_database WHERE datname = $1",
                &[&config.db_name()],
            )
            .map_err(create_error)?;
        if existing.is_some() {
            return Ok(());
        }
        admin
            .batch_execute(&format!(
                "CREATE DATABASE {}",
                quote_identifier(config.db_name())
            ))
            .map_err(create_error)?;
        info!(target: CONNECT_TARGET, database = config.db_name(), "database created");
        Ok(())
    }

    fn migrate(&self, config: &ClusterConfig) -> Result<usize, ProvisionError> {
        let Some(dir) = config.migrations_dir() else {
            return Ok(0);
        };
        let mut client = self.connector.connect(config)?;
        Ok(migrate::apply(&mut client, dir)?)
    }
}

/// Quotes `name` as an SQL identifier.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
