//! Process-wide tracing subscriber and per-cycle logger handles.
//!
//! The subscriber is installed once per process by [`init`]. Every cycle then
//! builds a fresh [`Logger`] from its own settings, which re-applies the
//! configured filter through the reload handle. A restart therefore picks up
//! a changed `logging.level` without reinstalling anything.

use std::fmt;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt as tfmt, reload};

use crate::config::LoggingConfig;
use crate::error::{Result, TunerError};
use crate::types::CycleId;

/// Handle onto the installed subscriber's filter.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` was set at startup and wins over settings.
    pinned: bool,
}

impl fmt::Debug for LogControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogControl")
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl LogControl {
    /// Wraps an existing reload handle.
    #[must_use]
    pub fn from_handle(handle: reload::Handle<EnvFilter, Registry>, pinned: bool) -> Self {
        Self { handle, pinned }
    }

    /// Replaces the active filter with `directive`.
    ///
    /// Does nothing when `RUST_LOG` pinned the filter at startup.
    ///
    /// # Errors
    /// Returns an error if the directive does not parse or the subscriber is gone.
    pub fn apply(&self, directive: &str) -> Result<()> {
        if self.pinned {
            return Ok(());
        }
        let filter = EnvFilter::try_new(directive)
            .map_err(|e| TunerError::Logging(format!("invalid filter {directive:?}: {e}")))?;
        self.handle
            .reload(filter)
            .map_err(|e| TunerError::Logging(e.to_string()))
    }

    /// Returns the active filter rendered as a directive string.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.handle.with_current(|f| f.to_string()).ok()
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` and over every later
/// per-cycle setting.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init(default_level: &str) -> Result<LogControl> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (filter, pinned) = initial_filter(from_env.as_deref(), default_level)?;

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tfmt::layer().with_target(true))
        .try_init()
        .map_err(|e| TunerError::Logging(e.to_string()))?;

    Ok(LogControl::from_handle(handle, pinned))
}

/// Picks the startup filter: `RUST_LOG` directives if present, else `default_level`.
///
/// The flag is true when the filter came from the environment.
fn initial_filter(from_env: Option<&str>, default_level: &str) -> Result<(EnvFilter, bool)> {
    let (directives, pinned) = match from_env {
        Some(directives) => (directives, true),
        None => (default_level, false),
    };
    let filter = EnvFilter::try_new(directives)
        .map_err(|e| TunerError::Logging(format!("invalid filter {directives:?}: {e}")))?;
    Ok((filter, pinned))
}

/// Per-cycle logger handle.
#[derive(Debug, Clone)]
pub struct Logger {
    level: String,
    cycle: CycleId,
}

impl Logger {
    /// Builds the logger for one cycle.
    ///
    /// # Errors
    /// Returns an error if the configured level cannot be applied.
    pub fn new(
        config: &LoggingConfig,
        cycle: CycleId,
        control: Option<&LogControl>,
    ) -> Result<Self> {
        if let Some(control) = control {
            control.apply(&config.level)?;
        }
        Ok(Self {
            level: config.level.clone(),
            cycle,
        })
    }

    /// Returns the configured filter directive.
    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Returns the cycle this logger belongs to.
    #[must_use]
    pub const fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// Returns a span tagging events with this cycle's id.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("cycle", id = %self.cycle)
    }
}
