//! Core types for the supervision lifecycle.
//!
//! Per Iron Lotus Framework: UUIDs for stable IDs (Section 12.3),
//! explicit state machines, no implicit transitions.

use serde::{Deserialize, Serialize};

/// Unique identifier for one supervision cycle.
///
/// Every restart gets a new id so log lines from consecutive cycles can be
/// told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(uuid::Uuid);

impl CycleId {
    /// Creates a new random cycle ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Worker lifecycle state.
///
/// ```text
/// NotStarted → Running → Stopped
/// ```
///
/// A worker never leaves `Stopped`; the next cycle constructs a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Constructed, `start` not yet called.
    NotStarted,
    /// Launched and executing.
    Running,
    /// Finished, cancelled, or failed.
    Stopped,
}

impl WorkerState {
    /// Returns true if the worker can never run again.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Outcome of one supervision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The primary worker stopped; reload everything and go again.
    Restart,
    /// The cycle could not be brought up or hit an unrecoverable error.
    FatalError,
    /// The operator interrupted the cycle's blocking wait.
    UserInterrupt,
}

impl Verdict {
    /// Returns true if the driver should run another cycle.
    #[must_use]
    pub const fn should_restart(&self) -> bool {
        matches!(self, Self::Restart)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Restart => "restart",
            Self::FatalError => "fatal-error",
            Self::UserInterrupt => "user-interrupt",
        };
        f.write_str(s)
    }
}

/// Process exit status chosen by the outer driver.
///
/// | Code | Meaning |
/// |---|---|
/// | 1 | Fatal error, or an interrupt outside any cycle's blocking wait. |
/// | 2 | Configuration missing or invalid, or an interrupt during the blocking wait. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Exit code 1.
    Fatal,
    /// Exit code 2.
    NoRestart,
}

impl ExitStatus {
    /// Returns the numeric exit code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Fatal => 1,
            Self::NoRestart => 2,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_id_unique() {
        assert_ne!(CycleId::new(), CycleId::new());
        assert_ne!(CycleId::default(), CycleId::default());
    }

    #[test]
    fn test_cycle_id_display() {
        let id = CycleId::new();
        let display = id.to_string();
        assert_eq!(display.len(), 36);
        assert_eq!(display, id.as_uuid().to_string());
    }

    #[test]
    fn test_worker_state_terminal() {
        assert!(!WorkerState::NotStarted.is_terminal());
        assert!(!WorkerState::Running.is_terminal());
        assert!(WorkerState::Stopped.is_terminal());
    }

    #[test]
    fn test_verdict_restart() {
        assert!(Verdict::Restart.should_restart());
        assert!(!Verdict::FatalError.should_restart());
        assert!(!Verdict::UserInterrupt.should_restart());
        assert_eq!(Verdict::UserInterrupt.to_string(), "user-interrupt");
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        assert_eq!(ExitStatus::Fatal.code(), 1);
        assert_eq!(ExitStatus::NoRestart.code(), 2);
    }

    #[test]
    fn test_verdict_serialize_roundtrip() {
        for verdict in [Verdict::Restart, Verdict::FatalError, Verdict::UserInterrupt] {
            let json = serde_json::to_string(&verdict).unwrap();
            let parsed: Verdict = serde_json::from_str(&json).unwrap();
            assert_eq!(verdict, parsed);
        }
    }
}
