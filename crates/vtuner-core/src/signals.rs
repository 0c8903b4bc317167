//! Operator interrupt handling.
//!
//! Signals are turned into a single process-wide [`CancellationToken`]. The
//! supervisor and the driver only ever look at the token, so tests can
//! "interrupt" by cancelling it directly.
//!
//! The first interrupt cancels the token and lets teardown run. A second one
//! while teardown is still going exits the process at once with code 1.
//!
//! ## Unix
//! SIGINT, SIGTERM and SIGQUIT all count as an interrupt.
//!
//! ## Other platforms
//! Only Ctrl-C is observed.

use std::io;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::ExitStatus;

/// Stream of operator interrupts.
#[async_trait]
pub trait InterruptSource: Send {
    /// Completes on the next interrupt.
    ///
    /// # Errors
    /// Returns an error if the source can no longer deliver interrupts.
    async fn recv(&mut self) -> io::Result<()>;
}

/// Interrupts delivered by the operating system.
///
/// Handlers stay installed for as long as this value lives, so no signal is
/// lost between two calls to [`InterruptSource::recv`].
#[cfg(unix)]
#[derive(Debug)]
pub struct OsSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Installs the handlers.
    ///
    /// # Errors
    /// Returns an error if a signal handler cannot be installed.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl InterruptSource for OsSignals {
    async fn recv(&mut self) -> io::Result<()> {
        tokio::select! {
            _ = self.sigint.recv() => tracing::debug!("received SIGINT"),
            _ = self.sigterm.recv() => tracing::debug!("received SIGTERM"),
            _ = self.sigquit.recv() => tracing::debug!("received SIGQUIT"),
        }
        Ok(())
    }
}

/// Interrupts delivered as Ctrl-C.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct OsSignals;

#[cfg(not(unix))]
impl OsSignals {
    /// Nothing to install up front on this platform.
    ///
    /// # Errors
    /// Never fails on this platform.
    #[allow(clippy::unnecessary_wraps)]
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
#[async_trait]
impl InterruptSource for OsSignals {
    async fn recv(&mut self) -> io::Result<()> {
        tokio::signal::ctrl_c().await
    }
}

/// How a listener stopped listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// The token was cancelled by someone else before any interrupt arrived.
    CancelledElsewhere,
    /// A second interrupt arrived after the token was cancelled.
    Forced,
}

/// Cancels `token` on the first interrupt from `source` and returns on the second.
///
/// # Errors
/// Returns the source's error; the token is left as it was.
pub async fn listen<S: InterruptSource + ?Sized>(
    token: &CancellationToken,
    source: &mut S,
) -> io::Result<Escalation> {
    tokio::select! {
        result = source.recv() => {
            result?;
            tracing::info!("interrupt received; press Ctrl-C again to exit immediately");
            token.cancel();
        }
        () = token.cancelled() => return Ok(Escalation::CancelledElsewhere),
    }

    source.recv().await?;
    tracing::warn!("second interrupt received; skipping teardown");
    Ok(Escalation::Forced)
}

/// Spawns a task that cancels `token` on the first interrupt and exits the
/// process on the second.
///
/// Abort the returned handle once the driver has finished.
/// Must be called from within a tokio runtime.
pub fn spawn_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = match OsSignals::install() {
            Ok(mut signals) => listen(&token, &mut signals).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(Escalation::Forced) => std::process::exit(i32::from(ExitStatus::Fatal.code())),
            Ok(Escalation::CancelledElsewhere) => {}
            Err(e) => tracing::error!(error = %e, "failed to listen for signals"),
        }
    })
}
