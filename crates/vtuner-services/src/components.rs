//! Production wiring of the supervision cycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use vtuner_core::{
    CoreContext, CycleFactory, LogControl, Result, Settings, TaskWorker, Worker,
};

use crate::discovery::SsdpService;
use crate::epg::EpgService;
use crate::http::HttpService;
use crate::startup;

/// Builds real contexts and workers for each cycle.
#[derive(Debug, Clone)]
pub struct TunerComponents {
    log_control: Option<LogControl>,
    startup_timeout: Duration,
}

impl Default for TunerComponents {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TunerComponents {
    /// Creates the factory. `log_control` lets each cycle re-apply its
    /// configured log level.
    #[must_use]
    pub fn new(log_control: Option<LogControl>) -> Self {
        Self {
            log_control,
            startup_timeout: startup::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the bound on the startup request.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

#[async_trait]
impl CycleFactory for TunerComponents {
    fn build_context(&self, settings: Settings) -> Result<CoreContext> {
        CoreContext::build(settings, self.log_control.as_ref())
    }

    fn http_server(&self, _ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>> {
        Ok(Box::new(TaskWorker::new(HttpService::new())))
    }

    fn discovery(&self, _ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>> {
        Ok(Box::new(TaskWorker::new(SsdpService::new())))
    }

    fn epg(&self, _ctx: &Arc<CoreContext>) -> Result<Box<dyn Worker>> {
        Ok(Box::new(TaskWorker::new(EpgService::new())))
    }

    async fn run_startup_tasks(
        &self,
        ctx: &CoreContext,
        endpoint: Option<SocketAddr>,
    ) -> Result<()> {
        let report = startup::trigger(endpoint, self.startup_timeout).await?;
        tracing::info!(
            cycle = %ctx.id(),
            runs = report.runs,
            origins = report.origins,
            "startup tasks done"
        );
        Ok(())
    }
}
