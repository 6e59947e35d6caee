//! Core probe abstraction
//!
//! Every check implements `Probe`: static metadata plus one async invocation
//! that reads current host state and returns either a typed outcome or a
//! `ProbeError`. Probes never mutate shared state.

use async_trait::async_trait;
use std::time::Duration;

use super::errors::ProbeError;
use super::types::{Section, Status};

/// Timeout applied to a probe that does not declare its own
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interpreted result of a successful probe invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: Status,
    pub detail: String,
}

impl ProbeOutcome {
    pub fn new<S: Into<String>>(status: Status, detail: S) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn ok<S: Into<String>>(detail: S) -> Self {
        Self::new(Status::Ok, detail)
    }

    pub fn warn<S: Into<String>>(detail: S) -> Self {
        Self::new(Status::Warn, detail)
    }

    pub fn critical<S: Into<String>>(detail: S) -> Self {
        Self::new(Status::Critical, detail)
    }

    pub fn unknown<S: Into<String>>(detail: S) -> Self {
        Self::new(Status::Unknown, detail)
    }
}

/// Result of one probe invocation
pub type ProbeResult = Result<ProbeOutcome, ProbeError>;

/// A single independently executable posture check
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable identifier, unique within a registry
    fn id(&self) -> &'static str;

    /// Human-readable label
    fn label(&self) -> &'static str;

    fn section(&self) -> Section;

    /// Upper bound on one invocation, enforced by the executor
    fn timeout(&self) -> Duration {
        DEFAULT_PROBE_TIMEOUT
    }

    /// External tools this probe needs. The requirement is met when any one
    /// of them is installed; an empty slice means no requirement.
    fn required_tools(&self) -> &[&'static str] {
        &[]
    }

    /// Read host state and interpret it
    async fn invoke(&self) -> ProbeResult;
}
