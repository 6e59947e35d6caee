//! PostureGuard - periodic security and privacy posture scanner for Linux desktops
//!
//! This library runs a fixed battery of host checks (network, system, privacy),
//! reduces their results into a composite score and publishes one immutable
//! snapshot per refresh cycle.

pub mod cli;
pub mod core;
pub mod engine;
pub mod probes;
pub mod report;
pub mod scheduler;
pub mod testing;

pub use crate::core::{
    CheckResult, Config, FailureKind, PostureBand, PostureError, PostureResult, PostureSnapshot,
    Probe, ProbeError, ProbeOutcome, ProbeResult, Section, Status,
};
pub use engine::{
    CheckExecutor, CheckRegistry, CurrentSnapshot, PostureEngine, ScoreWeights,
    SnapshotPublisher,
};
pub use scheduler::{RefreshScheduler, SchedulerError, SchedulerState};
