//! Supervision cycle.
//!
//! # Toyota Way: Jidoka (自働化)
//! One cycle brings the tuner up, watches the primary worker, and tears
//! everything down again. The verdict tells the driver whether to go again.
//!
//! ```text
//! load settings → build context → start http → start discovery? → start epg?
//!   → wait for readiness → startup tasks → watch (Waiting → Ended) → teardown
//! ```
//!
//! The HTTP server is the only liveness oracle. Secondary workers are polled
//! too, but their death is only reported, never acted on.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::Settings;
use crate::context::CoreContext;
use crate::error::{ConfigError, Result, TunerError};
use crate::readiness::{Readiness, ReadinessPolicy, wait_until_ready};
use crate::types::Verdict;
use crate::worker::Worker;

/// Builds the collaborators of one cycle.
///
/// Production wiring lives in `vtuner-services`; tests substitute spies.
#[async_trait]
pub trait CycleFactory: Send + Sync {
    /// Loads settings for the cycle.
    ///
    /// # Errors
    /// Returns a configuration error; the driver never retries it.
    fn load_settings(&self, path: &Path) -> std::result::Result<Settings, ConfigError> {
        Settings::load(path)
    }

    /// Builds the cycle's context (logger, store, plugins) from settings.
    ///
    /// # Errors
    /// Returns an error if any collaborator cannot be constructed.
    fn build_context(&self, settings: Settings) -> Result<CoreContext>;

    /// Constructs the HTTP server worker (the primary).
    ///
    /// # Errors
    /// Returns an error if the worker cannot be constructed.
    fn http_server(&self, ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>>;

    /// Constructs the discovery announcer worker.
    ///
    /// # Errors
    /// Returns an error if the worker cannot be constructed.
    fn discovery(&self, ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>>;

    /// Constructs the EPG refresher worker.
    ///
    /// # Errors
    /// Returns an error if the worker cannot be constructed.
    fn epg(&self, ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>>;

    /// Runs the deferred startup work against the live server.
    ///
    /// # Errors
    /// Returns an error if the work failed; the supervisor logs it and carries on.
    /// The operator interrupt abandons the work midway.
    async fn run_startup_tasks(
        &self,
        ctx: &CoreContext,
        endpoint: Option<SocketAddr>,
    ) -> Result<()>;
}

/// One supervised cycle, as seen by the driver.
#[async_trait]
pub trait Cycle: Send {
    /// Runs one complete cycle.
    ///
    /// # Errors
    /// Configuration errors, top-level interrupts, and fatal startup errors.
    async fn run_cycle(&mut self) -> Result<Verdict>;
}

/// Watch loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Polling the primary worker.
    Waiting,
    /// Terminal.
    Ended(Verdict),
}

/// Workers started during one cycle.
///
/// Dropped (after [`WorkerSet::stop_all`]) when the cycle ends; nothing in it
/// survives into the next cycle.
pub struct WorkerSet {
    primary: Option<Box<dyn Worker>>,
    secondaries: Vec<Box<dyn Worker>>,
}

impl WorkerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            primary: None,
            secondaries: Vec::new(),
        }
    }

    /// Returns the primary worker, once started.
    #[must_use]
    pub fn primary(&self) -> Option<&dyn Worker> {
        self.primary.as_deref()
    }

    /// Returns the started secondary workers.
    pub fn secondaries(&self) -> impl Iterator<Item = &dyn Worker> {
        self.secondaries.iter().map(|w| w.as_ref())
    }

    /// Returns the number of workers held.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.primary.is_some()) + self.secondaries.len()
    }

    /// Returns true if no worker was started.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops every worker: secondaries first, then the primary.
    ///
    /// Failures are logged; teardown always visits every worker.
    pub async fn stop_all(&mut self, timeout: Duration) {
        for worker in self.secondaries.iter_mut().rev() {
            if let Err(e) = worker.stop(timeout).await {
                tracing::warn!(worker = %worker.name(), error = %e, "worker stopped with error");
            }
        }
        if let Some(primary) = self.primary.as_mut() {
            if let Err(e) = primary.stop(timeout).await {
                tracing::warn!(worker = %primary.name(), error = %e, "primary stopped with error");
            }
        }
        tracing::debug!(count = self.len(), "stopped all workers");
    }
}

impl Default for WorkerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives one supervision cycle per [`Cycle::run_cycle`] call.
pub struct Supervisor<F> {
    factory: F,
    config_path: PathBuf,
    interrupt: CancellationToken,
    cycles: u64,
}

impl<F: CycleFactory> Supervisor<F> {
    /// Creates a supervisor reading `config_path` at the start of every cycle.
    ///
    /// `interrupt` is the process-wide operator interrupt.
    #[must_use]
    pub fn new(factory: F, config_path: impl Into<PathBuf>, interrupt: CancellationToken) -> Self {
        Self {
            factory,
            config_path: config_path.into(),
            interrupt,
            cycles: 0,
        }
    }

    /// Returns the factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Returns the number of cycles begun so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    async fn cycle(&mut self) -> Result<Verdict> {
        self.cycles += 1;

        if self.interrupt.is_cancelled() {
            return Err(TunerError::Interrupted);
        }
        let settings = self.factory.load_settings(&self.config_path)?;
        if self.interrupt.is_cancelled() {
            return Err(TunerError::Interrupted);
        }

        let ctx = Arc::new(self.factory.build_context(settings)?);
        let span = ctx.logger().span();
        let shutdown_timeout = ctx.settings().supervisor.shutdown_timeout;
        tracing::info!(parent: &span, number = self.cycles, "cycle starting");

        let mut workers = WorkerSet::new();
        let outcome = self
            .bring_up_and_watch(&ctx, &mut workers)
            .instrument(span.clone())
            .await;

        workers
            .stop_all(shutdown_timeout)
            .instrument(span.clone())
            .await;
        if let Err(e) = ctx.store().flush() {
            tracing::warn!(parent: &span, error = %e, "failed to flush store");
        }

        match &outcome {
            Ok(verdict) => tracing::info!(parent: &span, verdict = %verdict, "cycle ended"),
            Err(e) => tracing::error!(parent: &span, error = %e, "cycle failed"),
        }
        outcome
    }

    async fn bring_up_and_watch(
        &self,
        ctx: &Arc<CoreContext>,
        workers: &mut WorkerSet,
    ) -> Result<Verdict> {
        let settings = ctx.settings();

        let mut primary = self.factory.http_server(ctx)?;
        primary.start(Arc::clone(ctx))?;
        let primary = workers.primary.insert(primary);

        if settings.discovery_enabled() {
            let mut worker = self.factory.discovery(ctx)?;
            worker.start(Arc::clone(ctx))?;
            workers.secondaries.push(worker);
        }

        if settings.epg_enabled() {
            let mut worker = self.factory.epg(ctx)?;
            worker.start(Arc::clone(ctx))?;
            workers.secondaries.push(worker);
        }

        let policy = ReadinessPolicy::from_settings(&settings.supervisor);
        match wait_until_ready(&**primary, &policy, &self.interrupt).await? {
            Readiness::Ready { attempts } => {
                tracing::info!(worker = %primary.name(), attempts, "primary worker ready");
            }
            Readiness::Interrupted => return Ok(Verdict::UserInterrupt),
        }

        tokio::select! {
            biased;
            () = self.interrupt.cancelled() => return Ok(Verdict::UserInterrupt),
            result = self.factory.run_startup_tasks(ctx, primary.endpoint()) => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "startup tasks failed");
                }
            }
        }

        Ok(watch(workers, settings.supervisor.poll_interval, &self.interrupt).await)
    }
}

#[async_trait]
impl<F: CycleFactory> Cycle for Supervisor<F> {
    async fn run_cycle(&mut self) -> Result<Verdict> {
        self.cycle().await
    }
}

/// Blocks until the primary worker dies or the operator interrupts.
///
/// The interrupt is checked before liveness, so a cycle that sees both ends
/// with [`Verdict::UserInterrupt`]. A missing primary counts as dead.
pub async fn watch(
    workers: &WorkerSet,
    poll_interval: Duration,
    interrupt: &CancellationToken,
) -> Verdict {
    let mut reported = vec![false; workers.secondaries.len()];
    let mut state = WatchState::Waiting;

    while state == WatchState::Waiting {
        if interrupt.is_cancelled() {
            state = WatchState::Ended(Verdict::UserInterrupt);
            continue;
        }
        if !workers.primary().is_some_and(|p| p.is_alive()) {
            state = WatchState::Ended(Verdict::Restart);
            continue;
        }

        for (worker, seen) in workers.secondaries().zip(reported.iter_mut()) {
            if !*seen && !worker.is_alive() {
                *seen = true;
                tracing::warn!(
                    worker = %worker.name(),
                    "secondary worker stopped; primary keeps running"
                );
            }
        }

        tokio::select! {
            biased;
            () = interrupt.cancelled() => state = WatchState::Ended(Verdict::UserInterrupt),
            () = tokio::time::sleep(poll_interval) => {}
        }
    }

    match state {
        WatchState::Ended(verdict) => verdict,
        WatchState::Waiting => Verdict::FatalError,
    }
}
