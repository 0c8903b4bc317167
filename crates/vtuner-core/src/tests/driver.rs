//! Restart loop and exit-status contract.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::driver::Driver;
use crate::error::{ConfigError, Result, TunerError};
use crate::supervisor::{Cycle, Supervisor};
use crate::tests::mocks::{Event, HTTP, SpyFactory, WorkerPlan, fast_settings};
use crate::types::{ExitStatus, Verdict};

/// Replays canned cycle results; panics if asked for more.
struct Scripted {
    results: VecDeque<Result<Verdict>>,
    calls: u32,
}

impl Scripted {
    fn new(results: impl IntoIterator<Item = Result<Verdict>>) -> Self {
        Self {
            results: results.into_iter().collect(),
            calls: 0,
        }
    }
}

#[async_trait]
impl Cycle for Scripted {
    async fn run_cycle(&mut self) -> Result<Verdict> {
        self.calls += 1;
        self.results.pop_front().expect("driver ran too many cycles")
    }
}

#[tokio::test]
async fn restarts_repeat_until_terminal_verdict() {
    let cycle = Scripted::new([
        Ok(Verdict::Restart),
        Ok(Verdict::Restart),
        Ok(Verdict::Restart),
        Ok(Verdict::FatalError),
    ]);
    let mut driver = Driver::new(cycle, CancellationToken::new());

    assert_eq!(driver.run().await, ExitStatus::Fatal);
    assert_eq!(driver.restarts(), 3);
    assert_eq!(driver.cycle().calls, 4);
}

#[tokio::test]
async fn user_interrupt_exits_without_restart() {
    let mut driver = Driver::new(
        Scripted::new([Ok(Verdict::UserInterrupt)]),
        CancellationToken::new(),
    );
    assert_eq!(driver.run().await, ExitStatus::NoRestart);
    assert_eq!(driver.cycle().calls, 1);
}

#[tokio::test]
async fn config_error_exits_no_restart() {
    let mut driver = Driver::new(
        Scripted::new([Err(TunerError::Config(ConfigError::invalid(
            "vtuner.toml",
            "bad",
        )))]),
        CancellationToken::new(),
    );
    assert_eq!(driver.run().await, ExitStatus::NoRestart);
}

#[tokio::test]
async fn interrupt_outside_wait_exits_fatal() {
    let mut driver = Driver::new(
        Scripted::new([Ok(Verdict::Restart), Err(TunerError::Interrupted)]),
        CancellationToken::new(),
    );
    assert_eq!(driver.run().await, ExitStatus::Fatal);
    assert_eq!(driver.restarts(), 1);
}

#[tokio::test]
async fn interrupt_before_first_cycle_runs_nothing() {
    let interrupt = CancellationToken::new();
    interrupt.cancel();
    let mut driver = Driver::new(Scripted::new([]), interrupt);

    assert_eq!(driver.run().await, ExitStatus::Fatal);
    assert_eq!(driver.cycle().calls, 0);
}

#[tokio::test]
async fn missing_config_exits_2_without_building() {
    let dir = tempfile::tempdir().unwrap();
    let interrupt = CancellationToken::new();
    let sup = Supervisor::new(
        SpyFactory::from_disk(),
        dir.path().join("missing.toml"),
        interrupt.clone(),
    );
    let mut driver = Driver::new(sup, interrupt);

    assert_eq!(driver.run().await, ExitStatus::NoRestart);
    assert_eq!(driver.restarts(), 0);
    let log = driver.cycle().factory().log();
    assert_eq!(log.count(|e| matches!(e, Event::ContextBuilt(_))), 0);
    assert_eq!(log.count(|e| matches!(e, Event::Started(_, _))), 0);
}

#[tokio::test]
async fn supervisor_restarts_until_primary_refuses() {
    let factory = SpyFactory::new(fast_settings())
        .then_primary(WorkerPlan::dies_immediately())
        .then_primary(WorkerPlan::dies_immediately())
        .then_primary(WorkerPlan::dies_immediately())
        .primary(WorkerPlan::refuses_start());
    let interrupt = CancellationToken::new();
    let mut driver = Driver::new(
        Supervisor::new(factory, "vtuner.toml", interrupt.clone()),
        interrupt,
    );

    assert_eq!(driver.run().await, ExitStatus::Fatal);
    assert_eq!(driver.restarts(), 3);

    let sup = driver.cycle();
    assert_eq!(sup.cycles(), 4);
    let log = sup.factory().log();
    assert_eq!(log.count(|e| matches!(e, Event::ContextBuilt(_))), 4);
    assert_eq!(log.count(|e| matches!(e, Event::StartupTasks(_))), 3);
}

#[tokio::test]
async fn old_workers_stop_before_next_cycle_starts() {
    let factory = SpyFactory::new(fast_settings())
        .then_primary(WorkerPlan::dies_immediately())
        .primary(WorkerPlan::refuses_start());
    let interrupt = CancellationToken::new();
    let mut driver = Driver::new(
        Supervisor::new(factory, "vtuner.toml", interrupt.clone()),
        interrupt,
    );
    driver.run().await;

    let log = driver.cycle().factory().log();
    let stopped = log.position(|e| *e == Event::Stopped(HTTP)).unwrap();
    let second_build = log.positions(|e| matches!(e, Event::ContextBuilt(_)))[1];
    assert!(stopped < second_build);
}

#[tokio::test]
async fn interrupt_while_watching_exits_2() {
    let interrupt = CancellationToken::new();
    let sup = Supervisor::new(
        SpyFactory::new(fast_settings()),
        "vtuner.toml",
        interrupt.clone(),
    );
    let mut driver = Driver::new(sup, interrupt.clone());

    let trigger = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let status = tokio::time::timeout(Duration::from_secs(5), driver.run())
        .await
        .unwrap();
    assert_eq!(status, ExitStatus::NoRestart);
    assert_eq!(status.code(), 2);
    assert_eq!(driver.cycle().cycles(), 1);
}
