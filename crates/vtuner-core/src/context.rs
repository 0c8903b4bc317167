//! The per-cycle world every worker operates on.
//!
//! # Toyota Way: Standardized Work (標準作業)
//! Every worker receives the same bundle: settings, logger, store, plugins.
//! The bundle is built fresh for each cycle, shared read-mostly behind an
//! `Arc`, and dropped with the cycle. There are no process globals.

use crate::config::Settings;
use crate::error::Result;
use crate::logging::{LogControl, Logger};
use crate::plugins::PluginRegistry;
use crate::store::Store;
use crate::types::CycleId;

/// Aggregate handed to every worker of one cycle.
#[derive(Debug)]
pub struct CoreContext {
    id: CycleId,
    settings: Settings,
    logger: Logger,
    store: Store,
    plugins: PluginRegistry,
}

impl CoreContext {
    /// Assembles a context from already-built parts.
    #[must_use]
    pub fn new(settings: Settings, logger: Logger, store: Store, plugins: PluginRegistry) -> Self {
        Self {
            id: logger.cycle(),
            settings,
            logger,
            store,
            plugins,
        }
    }

    /// Builds a fresh logger, store, and plugin registry from `settings`.
    ///
    /// # Errors
    /// Returns an error if any collaborator fails to construct; the cycle
    /// cannot proceed without all of them.
    pub fn build(settings: Settings, log_control: Option<&LogControl>) -> Result<Self> {
        let id = CycleId::new();
        let logger = Logger::new(&settings.logging, id, log_control)?;
        let store = Store::open(settings.database.path.as_deref())?;
        let plugins = PluginRegistry::load(settings.plugins.dir.as_deref())?;

        tracing::info!(
            cycle = %id,
            store = ?store.path(),
            plugins = plugins.len(),
            "built core context"
        );

        Ok(Self::new(settings, logger, store, plugins))
    }

    /// Returns the cycle id.
    #[must_use]
    pub const fn id(&self) -> CycleId {
        self.id
    }

    /// Returns the settings loaded for this cycle.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns this cycle's logger.
    #[must_use]
    pub const fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Returns this cycle's store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Returns this cycle's plugin registry.
    #[must_use]
    pub const fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }
}
