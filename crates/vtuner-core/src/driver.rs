//! Outer driver: keeps running cycles while they end in [`Verdict::Restart`].
//!
//! This is the only place that decides between "run again" and "exit". It
//! never exits the process itself; it returns an [`ExitStatus`] for `main`.

use tokio_util::sync::CancellationToken;

use crate::error::{Result, TunerError};
use crate::supervisor::Cycle;
use crate::types::{ExitStatus, Verdict};

/// What the driver does after a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run another cycle.
    Continue,
    /// Stop and exit with this status.
    Exit(ExitStatus),
}

/// Maps a cycle result to the driver's next step.
///
/// | Cycle result | Decision |
/// |---|---|
/// | `Ok(Restart)` | continue |
/// | `Ok(FatalError)` | exit 1 |
/// | `Ok(UserInterrupt)` | exit 2 |
/// | `Err(Config)` | exit 2 |
/// | `Err(Interrupted)` | exit 1 |
/// | any other `Err` | exit 1 |
#[must_use]
pub fn decide(result: &Result<Verdict>) -> Decision {
    match result {
        Ok(Verdict::Restart) => Decision::Continue,
        Ok(Verdict::FatalError) => Decision::Exit(ExitStatus::Fatal),
        Ok(Verdict::UserInterrupt) => Decision::Exit(ExitStatus::NoRestart),
        Err(TunerError::Config(_)) => Decision::Exit(ExitStatus::NoRestart),
        Err(_) => Decision::Exit(ExitStatus::Fatal),
    }
}

/// Runs cycles until one of them ends in something other than a restart.
pub struct Driver<C> {
    cycle: C,
    interrupt: CancellationToken,
    restarts: u64,
}

impl<C: Cycle> Driver<C> {
    /// Creates a driver over `cycle`, watching the process-wide `interrupt`.
    #[must_use]
    pub fn new(cycle: C, interrupt: CancellationToken) -> Self {
        Self {
            cycle,
            interrupt,
            restarts: 0,
        }
    }

    /// Returns how many restarts have happened.
    #[must_use]
    pub const fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Returns the wrapped cycle.
    #[must_use]
    pub const fn cycle(&self) -> &C {
        &self.cycle
    }

    /// Runs until a cycle ends without a restart verdict.
    pub async fn run(&mut self) -> ExitStatus {
        loop {
            if self.interrupt.is_cancelled() {
                eprintln!("\n\nInterrupted");
                tracing::info!(restarts = self.restarts, "interrupted between cycles");
                return ExitStatus::Fatal;
            }

            let result = self.cycle.run_cycle().await;
            match decide(&result) {
                Decision::Continue => {
                    self.restarts += 1;
                    tracing::info!(restarts = self.restarts, "restarting");
                }
                Decision::Exit(status) => {
                    report(&result, status);
                    return status;
                }
            }
        }
    }
}

fn report(result: &Result<Verdict>, status: ExitStatus) {
    match result {
        Err(TunerError::Config(e)) => {
            eprintln!("{e}");
            tracing::error!(error = %e, code = status.code(), "configuration error");
        }
        Err(TunerError::Interrupted) => {
            eprintln!("\n\nInterrupted");
            tracing::info!(code = status.code(), "interrupted outside the supervision wait");
        }
        Err(e) => tracing::error!(error = %e, code = status.code(), "exiting after fatal error"),
        Ok(verdict) => tracing::info!(verdict = %verdict, code = status.code(), "exiting"),
    }
}
