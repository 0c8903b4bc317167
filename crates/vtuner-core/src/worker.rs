//! Worker lifecycle abstraction.
//!
//! Two traits split the concern the same way a daemon and its platform
//! adapter do:
//!
//! - [`Service`] is the workload: what runs, how it notices shutdown, and
//!   how it reports readiness.
//! - [`Worker`] is the lifecycle capability set the supervisor drives:
//!   `start`, `is_alive`, `ready`, `stop`. It is uniform across the HTTP
//!   server, the discovery announcer, and the EPG refresher.
//!
//! [`TaskWorker`] adapts any `Service` into a `Worker` by running it on its
//! own tokio task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::context::CoreContext;
use crate::error::{Result, TunerError};
use crate::types::WorkerState;

/// A long-running unit of work.
///
/// # Implementation Guidelines
///
/// 1. **serve**: Run until `shutdown` is cancelled, then return `Ok(())`.
///    Returning early (with or without an error) means the worker died.
///
/// 2. **ready**: Cheap, non-blocking check that the service accepts work.
///    Defaults to `true` for services with no external surface.
///
/// 3. **endpoint**: The socket address the service listens on, once bound.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Returns the human-readable name of this service.
    fn name(&self) -> &str;

    /// Runs the service until `shutdown` fires or it fails.
    async fn serve(&self, ctx: Arc<CoreContext>, shutdown: CancellationToken) -> Result<()>;

    /// Returns true once the service accepts work.
    async fn ready(&self) -> bool {
        true
    }

    /// Returns the bound listen address, if the service has one.
    fn endpoint(&self) -> Option<SocketAddr> {
        None
    }
}

/// Lifecycle contract the supervisor drives.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Returns the worker name.
    fn name(&self) -> &str;

    /// Returns the current lifecycle state.
    fn state(&self) -> WorkerState;

    /// Launches independent execution and returns immediately.
    ///
    /// Returning does not imply the worker finished initializing; see
    /// [`Worker::ready`].
    ///
    /// # Errors
    /// Returns an error if the worker was already started or cannot be launched.
    fn start(&mut self, ctx: Arc<CoreContext>) -> Result<()>;

    /// Non-blocking liveness probe.
    fn is_alive(&self) -> bool;

    /// Returns true once the worker accepts work.
    async fn ready(&self) -> bool;

    /// Returns the bound listen address, if any.
    fn endpoint(&self) -> Option<SocketAddr> {
        None
    }

    /// Requests shutdown and waits up to `timeout` for the worker to finish.
    ///
    /// # Errors
    /// Returns the worker's own failure, or an error if it had to be aborted.
    async fn stop(&mut self, timeout: Duration) -> Result<()>;
}

/// Runs a [`Service`] on a dedicated tokio task.
pub struct TaskWorker<S: Service> {
    service: Arc<S>,
    state: WorkerState,
    task: Option<JoinHandle<Result<()>>>,
    shutdown: CancellationToken,
}

impl<S: Service> TaskWorker<S> {
    /// Wraps a service. Nothing runs until [`Worker::start`].
    #[must_use]
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            state: WorkerState::NotStarted,
            task: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns the wrapped service.
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Returns a token that stops this worker when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl<S: Service> std::fmt::Debug for TaskWorker<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskWorker")
            .field("name", &self.service.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Service> Worker for TaskWorker<S> {
    fn name(&self) -> &str {
        self.service.name()
    }

    fn state(&self) -> WorkerState {
        match &self.task {
            Some(task) if task.is_finished() => WorkerState::Stopped,
            Some(_) => WorkerState::Running,
            None => self.state,
        }
    }

    fn start(&mut self, ctx: Arc<CoreContext>) -> Result<()> {
        let name = self.service.name().to_string();
        if self.state != WorkerState::NotStarted {
            return Err(TunerError::state(format!(
                "worker {name} cannot start from state {:?}",
                self.state()
            )));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TunerError::worker(&name, format!("no async runtime: {e}")))?;
        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown.clone();
        let cycle = ctx.id();

        self.task = Some(runtime.spawn(async move {
            let result = service.serve(ctx, shutdown).await;
            match &result {
                Ok(()) => tracing::info!(worker = %name, cycle = %cycle, "worker exited"),
                Err(e) => {
                    tracing::error!(worker = %name, cycle = %cycle, error = %e, "worker failed");
                }
            }
            result
        }));
        self.state = WorkerState::Running;

        tracing::debug!(worker = %self.service.name(), cycle = %cycle, "started worker");
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    async fn ready(&self) -> bool {
        self.is_alive() && self.service.ready().await
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        self.service.endpoint()
    }

    async fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.shutdown.cancel();
        self.state = WorkerState::Stopped;
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        let name = self.service.name();
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(TunerError::worker(
                name,
                format!("task panicked: {join_err}"),
            )),
            Err(_) => {
                task.abort();
                tracing::warn!(
                    worker = %name,
                    timeout = ?timeout,
                    "worker aborted after stop timeout"
                );
                Err(TunerError::worker(
                    name,
                    format!("did not stop within {timeout:?}"),
                ))
            }
        }
    }
}

impl<S: Service> Drop for TaskWorker<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
