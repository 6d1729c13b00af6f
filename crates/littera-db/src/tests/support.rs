//! Collaborator doubles shared by the behavioural suites.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, SystemTime};

use littera_config::{ClusterConfig, ClusterPaths};
use mockall::mock;

use crate::connect::{ConnectError, Connector, DatabaseProvisioner, ProvisionError};
use crate::lease::{WatchClock, WatcherLauncher, WatcherSpawnError};

mock! {
    pub Launcher {}
    impl WatcherLauncher for Launcher {
        fn launch(&self, paths: &ClusterPaths) -> Result<(), WatcherSpawnError>;
    }
}

/// Launcher that counts launches instead of spawning anything.
#[derive(Debug, Default, Clone)]
pub struct RecordingLauncher {
    launches: Rc<Cell<usize>>,
}

impl RecordingLauncher {
    pub fn launches(&self) -> usize {
        self.launches.get()
    }
}

impl WatcherLauncher for RecordingLauncher {
    fn launch(&self, _paths: &ClusterPaths) -> Result<(), WatcherSpawnError> {
        self.launches.set(self.launches.get() + 1);
        Ok(())
    }
}

/// Connection handle that reports when it is closed.
#[derive(Debug)]
pub struct FakeConnection {
    port: u16,
    closed: Rc<Cell<usize>>,
}

impl FakeConnection {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}

/// Connector handing out [`FakeConnection`]s without a server.
#[derive(Debug, Default, Clone)]
pub struct FakeConnector {
    opened: Rc<Cell<usize>>,
    closed: Rc<Cell<usize>>,
}

impl FakeConnector {
    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    pub fn closed(&self) -> usize {
        self.closed.get()
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    fn connect(&self, config: &ClusterConfig) -> Result<FakeConnection, ConnectError> {
        self.opened.set(self.opened.get() + 1);
        Ok(FakeConnection {
            port: config.port(),
            closed: Rc::clone(&self.closed),
        })
    }
}

/// Provisioner that records calls and reports a fixed migration count.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    pub databases_ensured: Cell<usize>,
    pub migrations_run: Cell<usize>,
    pub migrations_per_run: usize,
}

impl DatabaseProvisioner for RecordingProvisioner {
    fn ensure_database(&self, _config: &ClusterConfig) -> Result<(), ProvisionError> {
        self.databases_ensured.set(self.databases_ensured.get() + 1);
        Ok(())
    }

    fn migrate(&self, _config: &ClusterConfig) -> Result<usize, ProvisionError> {
        self.migrations_run.set(self.migrations_run.get() + 1);
        Ok(self.migrations_per_run)
    }
}

/// Clock running a fixed offset from real time; sleeping only advances it.
#[derive(Debug, Clone)]
pub struct OffsetClock {
    offset: Duration,
    pub sleeps: Vec<Duration>,
}

impl OffsetClock {
    pub fn ahead_by(offset: Duration) -> Self {
        Self {
            offset,
            sleeps: Vec::new(),
        }
    }
}

impl WatchClock for OffsetClock {
    fn now(&self) -> SystemTime {
        SystemTime::now() + self.offset
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.offset += duration;
    }
}
