//! Bounded readiness wait for the primary worker.
//!
//! # Toyota Way: Jidoka (自働化)
//! Stop the line when the server never comes up, instead of running the
//! startup task against a socket that is not there.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;
use crate::error::{Result, TunerError};
use crate::worker::Worker;

/// Backoff schedule for readiness probes.
#[derive(Debug, Clone)]
pub struct ReadinessPolicy {
    /// Maximum number of probes.
    pub max_attempts: u32,
    /// Delay after the first failed probe.
    pub initial_delay: Duration,
    /// Maximum delay between probes.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::from_settings(&SupervisorConfig::default())
    }
}

impl ReadinessPolicy {
    /// Builds the policy from supervisor settings.
    #[must_use]
    pub fn from_settings(config: &SupervisorConfig) -> Self {
        Self {
            max_attempts: config.readiness_attempts.max(1),
            initial_delay: config.readiness_initial_delay,
            max_delay: config.readiness_max_delay,
            multiplier: 2.0,
        }
    }

    /// Sets the max attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the max delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Calculates the delay after `failures` failed probes (exponential backoff).
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let base_secs = self.initial_delay.as_secs_f64();
        #[allow(clippy::cast_possible_wrap)] // failures is bounded by max_attempts
        let exp_secs = base_secs * self.multiplier.powi(failures.min(64) as i32);
        let clamped_secs = exp_secs.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(clamped_secs).unwrap_or(self.max_delay)
    }
}

/// Result of a readiness wait that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The worker reported ready after this many probes.
    Ready {
        /// Probes performed, including the successful one.
        attempts: u32,
    },
    /// The operator interrupted the wait.
    Interrupted,
}

/// Probes `worker` until it is ready, the attempts run out, or `interrupt` fires.
///
/// # Errors
/// Returns [`TunerError::NotReady`] when every probe failed, or a worker
/// error if the worker died before becoming ready.
pub async fn wait_until_ready(
    worker: &dyn Worker,
    policy: &ReadinessPolicy,
    interrupt: &CancellationToken,
) -> Result<Readiness> {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if interrupt.is_cancelled() {
            return Ok(Readiness::Interrupted);
        }
        if worker.ready().await {
            tracing::debug!(worker = %worker.name(), attempts = attempt, "worker ready");
            return Ok(Readiness::Ready { attempts: attempt });
        }
        if !worker.is_alive() {
            return Err(TunerError::worker(
                worker.name(),
                "exited before becoming ready",
            ));
        }
        if attempt == max_attempts {
            break;
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::debug!(worker = %worker.name(), attempt, delay = ?delay, "worker not ready yet");
        tokio::select! {
            biased;
            () = interrupt.cancelled() => return Ok(Readiness::Interrupted),
            () = tokio::time::sleep(delay) => {}
        }
    }

    Err(TunerError::NotReady {
        attempts: max_attempts,
    })
}
