//! EPG refresher.
//!
//! Refreshes the configured guide source once at start and then every
//! `epg.update_frequency`, recording each refresh in the store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use vtuner_core::{CoreContext, PluginKind, Result, Service, TunerError};

use crate::http::unix_now;

/// Name the EPG worker reports.
pub const NAME: &str = "epg";

/// Store key holding the last refresh of `method` as unix seconds.
#[must_use]
pub fn last_update_key(method: &str) -> String {
    format!("epg.{method}.last_update")
}

/// Store key counting refreshes of `method`.
#[must_use]
pub fn refresh_count_key(method: &str) -> String {
    format!("epg.{method}.refresh_count")
}

/// Refreshes guide data for `method` once.
///
/// Returns `Ok(false)` if no EPG plugin of that name is registered; the
/// caller keeps going and tries again next time.
///
/// # Errors
/// Returns an error if the refresh cannot be recorded.
pub fn refresh(ctx: &CoreContext, method: &str) -> Result<bool> {
    let known = ctx
        .plugins()
        .get(method)
        .is_some_and(|p| p.kind == PluginKind::Epg);
    if !known {
        tracing::warn!(cycle = %ctx.id(), method, "unknown EPG method, skipping refresh");
        return Ok(false);
    }

    let store = ctx.store();
    store.set(last_update_key(method), &unix_now())?;
    let count = store.increment(&refresh_count_key(method));
    tracing::info!(cycle = %ctx.id(), method, count, "EPG refreshed");
    Ok(true)
}

/// Periodic guide refresher.
#[derive(Debug, Default, Clone, Copy)]
pub struct EpgService;

impl EpgService {
    /// Creates the refresher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Service for EpgService {
    fn name(&self) -> &str {
        NAME
    }

    async fn serve(&self, ctx: Arc<CoreContext>, shutdown: CancellationToken) -> Result<()> {
        let epg = &ctx.settings().epg;
        let method = epg
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| TunerError::worker(NAME, "no EPG method configured"))?;
        let every = epg.update_frequency;

        loop {
            refresh(&ctx, method)?;
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(every) => {}
            }
        }
        Ok(())
    }
}
