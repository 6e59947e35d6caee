use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::core::PostureError;

/// Lifecycle of a `RefreshScheduler`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Created, not started
    Idle,
    /// Waiting for the next tick
    Scheduled,
    /// A cycle is executing
    Running,
    /// Terminal
    Stopped,
}

impl SchedulerState {
    pub fn can_transition_to(self, next: SchedulerState) -> bool {
        use SchedulerState::*;
        matches!(
            (self, next),
            (Idle, Scheduled)
                | (Idle, Stopped)
                | (Scheduled, Running)
                | (Scheduled, Stopped)
                | (Running, Scheduled)
                | (Running, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SchedulerState::Stopped
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Scheduled => write!(f, "scheduled"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Scheduler error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Refresh interval must be greater than zero")]
    ZeroInterval,
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Scheduler is stopped")]
    Stopped,
    #[error("Invalid scheduler transition: {from} -> {to}")]
    InvalidTransition {
        from: SchedulerState,
        to: SchedulerState,
    },
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl From<SchedulerError> for PostureError {
    fn from(err: SchedulerError) -> Self {
        PostureError::scheduler(err.to_string())
    }
}

/// Cycle counters, for diagnostics and tests
#[derive(Debug, Default)]
pub struct SchedulerStats {
    completed: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl SchedulerStats {
    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_is_terminal() {
        for next in [
            SchedulerState::Idle,
            SchedulerState::Scheduled,
            SchedulerState::Running,
            SchedulerState::Stopped,
        ] {
            assert!(!SchedulerState::Stopped.can_transition_to(next));
        }
    }

    #[test]
    fn test_legal_transitions() {
        assert!(SchedulerState::Idle.can_transition_to(SchedulerState::Scheduled));
        assert!(SchedulerState::Running.can_transition_to(SchedulerState::Scheduled));
        assert!(!SchedulerState::Idle.can_transition_to(SchedulerState::Running));
        assert!(!SchedulerState::Running.can_transition_to(SchedulerState::Idle));
    }

    #[test]
    fn test_error_converts_to_posture_error() {
        let err: PostureError = SchedulerError::AlreadyStarted.into();
        assert!(err.to_string().contains("already started"));
        assert!(!err.is_fatal());
    }
}
