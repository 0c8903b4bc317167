// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vtuner-core
//!
//! Process supervision primitives for the vtuner virtual tuner.
//!
//! - [`Settings`] loaded from TOML, validated once per cycle
//! - [`CoreContext`] bundling settings, logger, store, and plugins
//! - [`Worker`] and [`Service`] for the independently running units
//! - [`Supervisor`] running one bring-up/watch/teardown cycle
//! - [`Driver`] repeating cycles while they end in a restart
//!
//! ## Iron Lotus Framework
//!
//! - **Jidoka**: Explicit error handling, no panics
//! - **Poka-Yoke**: Configuration validated before anything starts
//! - **Muda**: Nothing survives a cycle it does not belong to
//!
//! ## Example
//!
//! ```rust,ignore
//! use vtuner_core::{Driver, Supervisor};
//! use tokio_util::sync::CancellationToken;
//!
//! let interrupt = CancellationToken::new();
//! let supervisor = Supervisor::new(factory, "vtuner.toml", interrupt.clone());
//! let status = Driver::new(supervisor, interrupt).run().await;
//! std::process::exit(i32::from(status.code()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod readiness;
pub mod signals;
pub mod store;
pub mod supervisor;
#[cfg(test)]
pub mod tests;
pub mod types;
pub mod worker;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::{
    DatabaseConfig, DeviceConfig, DiscoveryConfig, EpgConfig, HttpConfig, LoggingConfig,
    PluginsConfig, Settings, SupervisorConfig,
};
pub use context::CoreContext;
pub use driver::{Decision, Driver, decide};
pub use error::{ConfigError, Result, TunerError};
pub use logging::{LogControl, Logger};
pub use plugins::{BUILTIN_EPG, PluginKind, PluginManifest, PluginRegistry};
pub use readiness::{Readiness, ReadinessPolicy, wait_until_ready};
pub use store::Store;
pub use supervisor::{Cycle, CycleFactory, Supervisor, WatchState, WorkerSet, watch};
pub use types::{CycleId, ExitStatus, Verdict, WorkerState};
pub use worker::{Service, TaskWorker, Worker};
