//! Supervision scenario tests.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `cycle` | Bring-up order, readiness, watch verdicts, teardown |
//! | `driver` | Restart loop, exit codes, interrupts |

pub mod driver;

pub use mocks::{EventLog, SpyFactory, SpyWorker, WorkerPlan};
