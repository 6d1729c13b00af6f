//! Focused tests for session ownership rules.

use std::ffi::OsString;
use std::io;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::lease::WatcherSpawnError;
use crate::process;
use crate::session::{SessionError, WorkConfigLoader, WorkSessionManager};
use crate::test_support::FakeEngine;
use crate::tests::support::{FakeConnector, MockLauncher};

#[fixture]
fn engine() -> FakeEngine {
    FakeEngine::new().expect("fake engine")
}

fn manager(
    launcher: MockLauncher,
    lease_seconds: i64,
) -> WorkSessionManager<WorkConfigLoader, FakeConnector, MockLauncher> {
    WorkSessionManager::new(WorkConfigLoader, FakeConnector::default(), launcher)
        .with_lease_seconds(lease_seconds)
}

#[rstest]
fn owner_with_lease_launches_one_watcher(engine: FakeEngine) {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().times(1).returning(|_| Ok(()));

    let session = manager(launcher, 30)
        .acquire(engine.work_dir())
        .expect("acquire");

    assert!(session.started_here());
    assert_eq!(session.lease_seconds(), 30);
}

#[rstest]
fn non_owner_never_launches_a_watcher(engine: FakeEngine) {
    let config = engine.config().expect("config");
    crate::bootstrap::ensure(&config).expect("bootstrap");
    assert!(process::start(&config).expect("start"));
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();

    let session = manager(launcher, 30)
        .acquire(engine.work_dir())
        .expect("acquire");

    assert!(!session.started_here());
}

#[rstest]
#[case::leasing_disabled(0)]
#[case::negative_lease(-5)]
fn unleased_owner_never_launches_a_watcher(engine: FakeEngine, #[case] lease_seconds: i64) {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();

    let session = manager(launcher, lease_seconds)
        .acquire(engine.work_dir())
        .expect("acquire");

    assert!(session.started_here());
    let config = engine.config().expect("config");
    assert!(!config.paths().lease_path().exists());
}

#[rstest]
fn watcher_launch_failure_is_not_fatal(engine: FakeEngine) {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().times(1).returning(|_| {
        Err(WatcherSpawnError::Spawn {
            binary: OsString::from("littera-lease-watcher"),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    });

    let session = manager(launcher, 30)
        .acquire(engine.work_dir())
        .expect("acquire");

    assert!(session.started_here());
}

#[rstest]
fn dropping_an_unleased_owner_session_stops_the_engine(engine: FakeEngine) {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();
    let session = manager(launcher, 0)
        .acquire(engine.work_dir())
        .expect("acquire");
    let config = session.config().clone();
    assert!(process::state(&config).running);

    drop(session);

    assert!(!process::state(&config).running);
    assert_eq!(engine.stop_count(), 1);
}

#[rstest]
fn releasing_a_leased_owner_session_leaves_the_engine_up(engine: FakeEngine) {
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().times(1).returning(|_| Ok(()));
    let session = manager(launcher, 30)
        .acquire(engine.work_dir())
        .expect("acquire");
    let config = session.config().clone();

    assert!(!session.release());

    assert!(process::state(&config).running);
    assert_eq!(engine.stop_count(), 0);
}

#[rstest]
fn unclean_shutdown_is_surfaced_with_the_config(engine: FakeEngine) {
    let config = engine.config().expect("config");
    crate::bootstrap::ensure(&config).expect("bootstrap");
    engine
        .corrupt("PANIC:  invalid checkpoint record")
        .expect("arm corruption");
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();

    let error = manager(launcher, 30)
        .acquire(engine.work_dir())
        .expect_err("acquire must fail");

    match error {
        SessionError::Recovery { config: reported, error } => {
            assert_eq!(reported.data_dir(), config.data_dir());
            assert_eq!(error.signature(), "invalid checkpoint record");
            assert_eq!(error.log_tail_text(), "PANIC:  invalid checkpoint record");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn directories_without_a_work_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let mut launcher = MockLauncher::new();
    launcher.expect_launch().never();

    let error = manager(launcher, 30)
        .acquire(dir.path())
        .expect_err("plain directory must be rejected");

    assert!(matches!(error, SessionError::Config(_)), "{error}");
}
