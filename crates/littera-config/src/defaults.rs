/// Administrative database used to create the application database.
pub const DEFAULT_ADMIN_DB: &str = "postgres";

/// Superuser created by the init executable and used for every connection.
pub const DEFAULT_SUPERUSER: &str = "postgres";

/// Seconds the engine stays up after a short-lived caller finishes.
pub const DEFAULT_LEASE_SECONDS: i64 = 30;

/// Overrides [`DEFAULT_LEASE_SECONDS`] when it parses as an integer.
pub const LEASE_SECONDS_ENV_VAR: &str = "LITTERA_PG_LEASE_SECONDS";

/// Marks automated test runs; leasing defaults to disabled while it is set.
pub const TEST_MODE_ENV_VAR: &str = "LITTERA_TEST_MODE";

/// Overrides the lease watcher executable.
pub const WATCHER_BIN_ENV_VAR: &str = "LITTERA_WATCHER_BIN";

/// Log filter expression consulted by the binaries.
pub const LOG_FILTER_ENV_VAR: &str = "LITTERA_LOG";

/// Log format selection consulted by the binaries.
pub const LOG_FORMAT_ENV_VAR: &str = "LITTERA_LOG_FORMAT";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

pub(crate) fn default_admin_db() -> String {
    DEFAULT_ADMIN_DB.to_owned()
}

pub(crate) fn default_superuser() -> String {
    DEFAULT_SUPERUSER.to_owned()
}
