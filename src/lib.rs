// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! vtuner: virtual network tuner emulator.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vtuner::prelude::*;
//!
//! # async fn example() -> ExitStatus {
//! let interrupt = CancellationToken::new();
//! let supervisor = Supervisor::new(TunerComponents::default(), "vtuner.toml", interrupt.clone());
//! Driver::new(supervisor, interrupt).run().await
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;

pub use vtuner_core as core;
pub use vtuner_services as services;

/// Prelude module for common imports.
pub mod prelude {
    pub use tokio_util::sync::CancellationToken;
    pub use vtuner_core::{
        CoreContext, Cycle, CycleFactory, Driver, ExitStatus, Service, Settings, Supervisor,
        TaskWorker, TunerError, Verdict, Worker,
    };
    pub use vtuner_services::{EpgService, HttpService, SsdpService, TunerComponents};
}
