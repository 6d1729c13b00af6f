//! Lifecycle management for the embedded PostgreSQL cluster behind a Littera
//! work.
//!
//! The CLI, the interactive session, and the desktop sidecar run as separate
//! processes and never talk to each other. They coordinate purely through
//! files inside the work directory: the engine's own PID marker, a keep-alive
//! lease written by whichever front end last touched the database, and an
//! advisory start lock that serialises check-then-start sequences.
//!
//! The crate is layered leaf first:
//!
//! - [`bootstrap`] materialises the cluster on disk exactly once.
//! - [`process`] starts and stops the engine and derives its liveness from the
//!   PID marker, self-healing stale markers left by a crash.
//! - [`recovery`] recognises unclean-shutdown signatures in the engine log and
//!   offers the write-ahead log reset or a confirmed re-initialisation.
//! - [`lease`] renews the keep-alive window and hosts the watcher loop that
//!   stops the engine once the window lapses.
//! - [`session`] ties the above into a single acquire/release pair that
//!   records whether this caller owns the engine it is using.
//!
//! Only the caller that actually started the engine may stop it, and only when
//! no lease keeps it alive. Everything else is left to the detached watcher.

pub mod bootstrap;
pub mod connect;
pub mod lease;
pub mod migrate;
pub mod process;
pub mod recovery;
pub mod session;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bootstrap::BootstrapError;
pub use connect::{
    ConnectError, Connector, DatabaseProvisioner, PostgresConnector, PostgresProvisioner,
    ProvisionError,
};
pub use lease::{Lease, LeaseError, LeaseStatus};
pub use migrate::MigrationError;
pub use process::{ClusterState, StartError, StopMode};
pub use recovery::{DataLossConfirmation, RecoveryActionError, RecoveryError, RecoveryOutcome};
pub use session::{
    ClusterConfigLoader, SessionError, WorkConfigLoader, WorkSession, WorkSessionManager,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
