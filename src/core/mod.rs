pub mod config;
pub mod errors;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use errors::{ErrorContext, FailureKind, PostureError, PostureResult, ProbeError};
pub use traits::{Probe, ProbeOutcome, ProbeResult, DEFAULT_PROBE_TIMEOUT};
pub use types::{CheckResult, PostureBand, PostureSnapshot, Section, SectionSummary, Status};
