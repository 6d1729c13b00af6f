//! Behavioural tests for starting, stopping, diagnosing, and recovering the
//! engine against the scripted fake installation.

use std::cell::RefCell;
use std::fs;

use littera_config::ClusterConfig;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap;
use crate::process::{self, ClusterState, StartError};
use crate::recovery::{
    self, DataLossConfirmation, RecoveryActionError, RecoveryOutcome, ResetToolSearch,
};
use crate::test_support::FakeEngine;
use crate::tests::support::RecordingProvisioner;

type StepResult = Result<(), String>;

const MIGRATIONS_PER_RUN: usize = 3;

struct LifecycleWorld {
    engine: FakeEngine,
    config: ClusterConfig,
    starts: Vec<Result<bool, StartError>>,
    stops: Vec<bool>,
    inspected: Option<ClusterState>,
    crash_log: Vec<String>,
    recovery: Option<Result<RecoveryOutcome, RecoveryActionError>>,
    provisioner: RecordingProvisioner,
}

impl LifecycleWorld {
    fn new() -> Self {
        let engine = FakeEngine::new().expect("fake engine");
        let config = engine.config().expect("fake engine config");
        Self {
            engine,
            config,
            starts: Vec::new(),
            stops: Vec::new(),
            inspected: None,
            crash_log: Vec::new(),
            recovery: None,
            provisioner: RecordingProvisioner {
                migrations_per_run: MIGRATIONS_PER_RUN,
                ..RecordingProvisioner::default()
            },
        }
    }

    fn start_result(&self, index: usize) -> Result<&Result<bool, StartError>, String> {
        self.starts
            .get(index)
            .ok_or_else(|| format!("expected at least {} start attempts", index + 1))
    }

    fn last_start(&self) -> Result<&Result<bool, StartError>, String> {
        self.starts
            .last()
            .ok_or_else(|| String::from("no start was attempted"))
    }

    fn outcome(&self) -> Result<&RecoveryOutcome, String> {
        match &self.recovery {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(error)) => Err(format!("recovery failed: {error}")),
            None => Err(String::from("no recovery was attempted")),
        }
    }
}

#[fixture]
fn lifecycle() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

#[given("an initialised cluster")]
fn given_initialised(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    let world = lifecycle.borrow();
    bootstrap::ensure(&world.config).map_err(|error| error.to_string())
}

#[given("a running cluster")]
fn given_running(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    let world = lifecycle.borrow();
    bootstrap::ensure(&world.config).map_err(|error| error.to_string())?;
    match process::start(&world.config) {
        Ok(true) => Ok(()),
        Ok(false) => Err(String::from("fresh cluster reported as already running")),
        Err(error) => Err(error.to_string()),
    }
}

#[given("a pid marker naming process {pid}")]
fn given_pid_marker(lifecycle: &RefCell<LifecycleWorld>, pid: u32) -> StepResult {
    let world = lifecycle.borrow();
    let body = format!("{pid}\n{}\n", world.config.data_dir().display());
    fs::write(world.config.paths().pid_path(), body).map_err(|error| error.to_string())
}

#[given("the engine refuses to bind its port")]
fn given_bind_failure(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    lifecycle
        .borrow()
        .engine
        .fail_start()
        .map_err(|error| error.to_string())
}

#[given("the engine crashed leaving {count} log lines about a missing checkpoint")]
fn given_crash(lifecycle: &RefCell<LifecycleWorld>, count: usize) -> StepResult {
    let mut world = lifecycle.borrow_mut();
    let mut lines: Vec<String> = (1..count)
        .map(|n| format!("LOG:  redo record {n} replayed"))
        .collect();
    lines.push(String::from(
        "PANIC:  could not locate a valid checkpoint record",
    ));
    world
        .engine
        .corrupt(&lines.join("\n"))
        .map_err(|error| error.to_string())?;
    world.crash_log = lines;
    Ok(())
}

#[when("the engine is started")]
fn when_started(lifecycle: &RefCell<LifecycleWorld>) {
    let mut world = lifecycle.borrow_mut();
    let result = process::start(&world.config);
    world.starts.push(result);
}

#[when("the engine is started again")]
fn when_started_again(lifecycle: &RefCell<LifecycleWorld>) {
    when_started(lifecycle);
}

#[when("the engine is stopped")]
fn when_stopped(lifecycle: &RefCell<LifecycleWorld>) {
    let mut world = lifecycle.borrow_mut();
    let requested = process::stop(&world.config, process::StopMode::Fast);
    world.stops.push(requested);
}

#[when("the engine is stopped again")]
fn when_stopped_again(lifecycle: &RefCell<LifecycleWorld>) {
    when_stopped(lifecycle);
}

#[when("the engine state is inspected")]
fn when_inspected(lifecycle: &RefCell<LifecycleWorld>) {
    let mut world = lifecycle.borrow_mut();
    world.inspected = Some(process::state(&world.config));
}

#[when("the write-ahead log is reset")]
fn when_reset(lifecycle: &RefCell<LifecycleWorld>) {
    let mut world = lifecycle.borrow_mut();
    let result = recovery::reset_with(&world.config, &ResetToolSearch::only(Vec::new()));
    world.recovery = Some(result);
}

#[when("the cluster is re-initialised with data loss confirmed")]
fn when_reinitialised(lifecycle: &RefCell<LifecycleWorld>) {
    let mut world = lifecycle.borrow_mut();
    let result = recovery::reinitialize(
        &world.config,
        DataLossConfirmation::acknowledge_all_data_will_be_lost(),
        &world.provisioner,
    );
    world.recovery = Some(result);
}

#[then("the first start reports that it launched the engine")]
fn then_first_start_owned(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    match lifecycle.borrow().start_result(0)? {
        Ok(true) => Ok(()),
        other => Err(format!("expected Ok(true), got {other:?}")),
    }
}

#[then("the second start reports that the engine was already running")]
fn then_second_start_reused(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    match lifecycle.borrow().start_result(1)? {
        Ok(false) => Ok(()),
        other => Err(format!("expected Ok(false), got {other:?}")),
    }
}

#[then("the control executable was asked to start once")]
fn then_one_control_start(lifecycle: &RefCell<LifecycleWorld>) {
    assert_eq!(lifecycle.borrow().engine.start_count(), 1);
}

#[then("the first stop reports that a stop was requested")]
fn then_first_stop(lifecycle: &RefCell<LifecycleWorld>) {
    assert_eq!(lifecycle.borrow().stops.first(), Some(&true));
}

#[then("the second stop reports that nothing was running")]
fn then_second_stop(lifecycle: &RefCell<LifecycleWorld>) {
    assert_eq!(lifecycle.borrow().stops.get(1), Some(&false));
}

#[then("the engine is not running")]
fn then_not_running(lifecycle: &RefCell<LifecycleWorld>) {
    let world = lifecycle.borrow();
    if let Some(state) = world.inspected {
        assert!(!state.running, "inspection reported {state:?}");
    }
    assert!(!process::state(&world.config).running);
}

#[then("the engine is running")]
fn then_running(lifecycle: &RefCell<LifecycleWorld>) {
    let state = process::state(&lifecycle.borrow().config);
    assert!(state.running, "engine state: {state:?}");
    assert!(state.pid.is_some());
}

#[then("the pid marker is gone")]
fn then_marker_gone(lifecycle: &RefCell<LifecycleWorld>) {
    assert!(!lifecycle.borrow().config.paths().pid_path().exists());
}

#[then("the pid marker names a live process other than {stale}")]
fn then_marker_replaced(lifecycle: &RefCell<LifecycleWorld>, stale: i32) -> StepResult {
    let pid = lifecycle
        .borrow()
        .engine
        .running_pid()
        .ok_or_else(|| String::from("no pid marker after start"))?;
    if pid == stale {
        return Err(format!("pid marker still names stale process {stale}"));
    }
    kill(Pid::from_raw(pid), None)
        .map_err(|errno| format!("pid marker names dead process {pid}: {errno}"))
}

#[then("the start fails with the captured log tail")]
fn then_start_failed(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    match lifecycle.borrow().last_start()? {
        Err(StartError::Control { log_tail, .. }) => {
            assert!(
                log_tail.iter().any(|line| line.contains("could not bind")),
                "log tail: {log_tail:?}"
            );
            Ok(())
        }
        other => Err(format!("expected a control failure, got {other:?}")),
    }
}

#[then("recovery is required because of \"{signature}\"")]
fn then_recovery_required(lifecycle: &RefCell<LifecycleWorld>, signature: String) -> StepResult {
    match lifecycle.borrow().last_start()? {
        Err(StartError::Recovery(error)) => {
            assert_eq!(error.signature(), signature);
            Ok(())
        }
        other => Err(format!("expected a recovery error, got {other:?}")),
    }
}

#[then("the reported log tail is the last 20 lines of the crash log")]
fn then_tail_is_verbatim(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    let world = lifecycle.borrow();
    let Err(StartError::Recovery(error)) = world.last_start()? else {
        return Err(String::from("expected a recovery error"));
    };
    let expected = &world.crash_log[world.crash_log.len() - 20..];
    assert_eq!(error.log_tail(), expected);
    Ok(())
}

#[then("the recovery started the engine")]
fn then_recovery_started(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    let world = lifecycle.borrow();
    assert!(world.outcome()?.started_here);
    Ok(())
}

#[then("the reset tool ran once")]
fn then_reset_ran(lifecycle: &RefCell<LifecycleWorld>) {
    let calls = lifecycle.borrow().engine.reset_calls();
    assert_eq!(calls.len(), 1, "reset calls: {calls:?}");
    assert!(calls[0].starts_with("-f -D "), "reset call: {}", calls[0]);
}

#[then("the cluster was initialised twice")]
fn then_initialised_twice(lifecycle: &RefCell<LifecycleWorld>) {
    assert_eq!(lifecycle.borrow().engine.init_count(), 2);
}

#[then("the database and migrations were restored")]
fn then_restored(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    let world = lifecycle.borrow();
    assert_eq!(world.provisioner.databases_ensured.get(), 1);
    assert_eq!(world.provisioner.migrations_run.get(), 1);
    assert_eq!(world.outcome()?.migrations_applied, MIGRATIONS_PER_RUN);
    Ok(())
}

#[then("recovery is refused because the engine is running")]
fn then_recovery_refused(lifecycle: &RefCell<LifecycleWorld>) -> StepResult {
    match &lifecycle.borrow().recovery {
        Some(Err(RecoveryActionError::EngineRunning { .. })) => Ok(()),
        other => Err(format!("expected EngineRunning, got {other:?}")),
    }
}

#[scenario(path = "tests/features/process_lifecycle.feature", index = 0)]
fn idempotent_start(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/process_lifecycle.feature", index = 1)]
fn idempotent_stop(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/process_lifecycle.feature", index = 2)]
fn stale_marker_self_heals(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/process_lifecycle.feature", index = 3)]
fn unrecognised_failure_propagates(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/crash_recovery.feature", index = 0)]
fn corruption_is_surfaced(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/crash_recovery.feature", index = 1)]
fn reset_restores_runnability(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/crash_recovery.feature", index = 2)]
fn reinitialise_restores_runnability(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}

#[scenario(path = "tests/features/crash_recovery.feature", index = 3)]
fn reset_refuses_running_engine(#[from(lifecycle)] _: RefCell<LifecycleWorld>) {}
