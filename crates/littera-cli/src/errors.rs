//! Error types for the CLI runtime.

use std::io;

use littera_config::ConfigError;
use littera_db::{
    BootstrapError, LeaseError, RecoveryActionError, StartError, TelemetryError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("failed to renew lease: {0}")]
    Lease(#[from] LeaseError),
    #[error("recovery failed: {0}")]
    Recovery(#[from] RecoveryActionError),
    #[error(
        "re-initialising deletes every row in the database; pass --confirm-data-loss to proceed"
    )]
    ConfirmationRequired,
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}
