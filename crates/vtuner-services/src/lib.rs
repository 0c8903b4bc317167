// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # vtuner-services
//!
//! The workers a vtuner cycle runs, and the factory that wires them in:
//!
//! - [`HttpService`]: HTTP API, the primary worker
//! - [`SsdpService`]: SSDP `NOTIFY` announcer
//! - [`EpgService`]: periodic guide refresher
//! - [`TunerComponents`]: [`vtuner_core::CycleFactory`] for production

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod components;
pub mod discovery;
pub mod epg;
pub mod http;
pub mod startup;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use components::TunerComponents;
pub use discovery::{Announcement, Notify, SsdpService};
pub use epg::EpgService;
pub use http::{Discover, Health, HttpService, StartupReport};
