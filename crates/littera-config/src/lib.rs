//! Shared configuration for the Littera embedded database lifecycle.
//!
//! Every front end (the CLI, the interactive session, and the desktop sidecar)
//! resolves the same [`ClusterConfig`] for a work directory so they agree on
//! where the cluster lives, which port it binds, and where the coordination
//! artefacts (PID marker, lease, start lock) are kept. The crate deliberately
//! does no process management of its own; it only parses `.littera/config.yml`
//! and combines it with the engine executables reported by an
//! [`EngineBinaries`] collaborator.

mod binaries;
mod cluster;
mod defaults;
mod logging;
mod paths;
mod work;

pub use binaries::{BundledBinaries, EngineBinaries, executable_name};
pub use cluster::ClusterConfig;
pub use defaults::{
    DEFAULT_ADMIN_DB, DEFAULT_LEASE_SECONDS, DEFAULT_LOG_FILTER, DEFAULT_SUPERUSER,
    LEASE_SECONDS_ENV_VAR, LOG_FILTER_ENV_VAR, LOG_FORMAT_ENV_VAR, TEST_MODE_ENV_VAR,
    WATCHER_BIN_ENV_VAR, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError, LogSettings};
pub use paths::ClusterPaths;
pub use work::{
    CONFIG_FILE_NAME, ConfigError, PostgresSection, RUNTIME_DIR_NAME, WorkConfig, WorkLayout,
    WorkSection,
};
