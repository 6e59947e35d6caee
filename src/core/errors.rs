//! Centralized error handling for PostureGuard
//!
//! Two families of errors live here. `PostureError` covers the engine itself
//! (configuration, registry, scheduling, output). `ProbeError` is the failure
//! channel of a single check; it never escapes a cycle and is folded into a
//! degraded `CheckResult` by the aggregator.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum number of characters of raw tool output kept in a parse diagnostic
pub const EXCERPT_LIMIT: usize = 80;

/// Main error type for PostureGuard operations
#[derive(Debug, Clone, Error)]
pub enum PostureError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("Registry error: {message}")]
    Registry {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("Scheduler error: {message}")]
    Scheduler {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        source: Option<Box<PostureError>>,
    },

    #[error("Fatal error: {message}")]
    Fatal {
        message: String,
        source: Option<Box<PostureError>>,
    },
}

/// Result type for PostureGuard operations
pub type PostureResult<T> = Result<T, PostureError>;

impl PostureError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new registry error
    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new scheduler error
    pub fn scheduler<S: Into<String>>(message: S) -> Self {
        Self::Scheduler {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fatal error. A fatal error halts the refresh scheduler.
    pub fn fatal<S: Into<String>>(message: S) -> Self {
        Self::Fatal {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error must halt all future cycles
    pub fn is_fatal(&self) -> bool {
        matches!(self, PostureError::Fatal { .. })
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            PostureError::Config { .. } => ErrorCategory::Configuration,
            PostureError::Registry { .. } => ErrorCategory::Registry,
            PostureError::Scheduler { .. } => ErrorCategory::Scheduler,
            PostureError::Io { .. } => ErrorCategory::IO,
            PostureError::Serialization { .. } => ErrorCategory::Serialization,
            PostureError::Validation { .. } => ErrorCategory::Validation,
            PostureError::Fatal { .. } => ErrorCategory::Fatal,
        }
    }

    fn with_source(self, context: String) -> Self {
        let source = Some(Box::new(self.clone()));
        match self {
            PostureError::Config { .. } => PostureError::Config { message: context, source },
            PostureError::Registry { .. } => PostureError::Registry { message: context, source },
            PostureError::Scheduler { .. } => PostureError::Scheduler { message: context, source },
            PostureError::Io { .. } => PostureError::Io { message: context, source },
            PostureError::Serialization { .. } => {
                PostureError::Serialization { message: context, source }
            }
            PostureError::Validation { .. } => PostureError::Validation { message: context, source },
            PostureError::Fatal { .. } => PostureError::Fatal { message: context, source },
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Registry,
    Scheduler,
    IO,
    Serialization,
    Validation,
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Registry => write!(f, "Registry"),
            ErrorCategory::Scheduler => write!(f, "Scheduler"),
            ErrorCategory::IO => write!(f, "I/O"),
            ErrorCategory::Serialization => write!(f, "Serialization"),
            ErrorCategory::Validation => write!(f, "Validation"),
            ErrorCategory::Fatal => write!(f, "Fatal"),
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for PostureError {
    fn from(err: std::io::Error) -> Self {
        PostureError::io(format!("I/O operation failed: {}", err))
    }
}

impl From<serde_yaml::Error> for PostureError {
    fn from(err: serde_yaml::Error) -> Self {
        PostureError::serialization(format!("YAML processing failed: {}", err))
    }
}

impl From<serde_json::Error> for PostureError {
    fn from(err: serde_json::Error) -> Self {
        PostureError::serialization(format!("JSON processing failed: {}", err))
    }
}

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> PostureResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: Into<PostureError>,
{
    fn with_context<F>(self, f: F) -> PostureResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_source(f()))
    }
}

/// Kind of failure that degraded a probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolMissing,
    PermissionDenied,
    Timeout,
    ParseError,
    UnexpectedFault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ToolMissing => write!(f, "tool_missing"),
            FailureKind::PermissionDenied => write!(f, "permission_denied"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::ParseError => write!(f, "parse_error"),
            FailureKind::UnexpectedFault => write!(f, "unexpected_fault"),
        }
    }
}

/// Failure of a single probe invocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("tool unavailable: {tool}")]
    ToolMissing { tool: String },

    #[error("permission denied: {message} (requires elevated privileges)")]
    PermissionDenied { message: String },

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("unexpected output: {message} [{excerpt}]")]
    Parse { message: String, excerpt: String },

    #[error("probe fault: {message}")]
    Unexpected { message: String },
}

impl ProbeError {
    pub fn tool_missing<S: Into<String>>(tool: S) -> Self {
        Self::ToolMissing { tool: tool.into() }
    }

    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a parse error keeping a bounded excerpt of the offending output
    pub fn parse<S: Into<String>>(message: S, raw: &str) -> Self {
        Self::Parse {
            message: message.into(),
            excerpt: excerpt(raw),
        }
    }

    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Map an I/O failure on `subject` into the probe taxonomy
    pub fn from_io(subject: &str, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Self::permission_denied(format!("cannot read {}", subject))
            }
            _ => Self::unexpected(format!("cannot read {}: {}", subject, err)),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::ToolMissing { .. } => FailureKind::ToolMissing,
            ProbeError::PermissionDenied { .. } => FailureKind::PermissionDenied,
            ProbeError::Timeout { .. } => FailureKind::Timeout,
            ProbeError::Parse { .. } => FailureKind::ParseError,
            ProbeError::Unexpected { .. } => FailureKind::UnexpectedFault,
        }
    }
}

fn excerpt(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() <= EXCERPT_LIMIT {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(EXCERPT_LIMIT).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PostureError::registry("duplicate probe id 'vpn'");
        assert!(matches!(err, PostureError::Registry { .. }));
        assert_eq!(err.category(), ErrorCategory::Registry);
        assert!(!err.is_fatal());
        assert!(PostureError::fatal("clock failure").is_fatal());
    }

    #[test]
    fn test_error_context_keeps_source() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result
            .with_context(|| "Could not read config".to_string())
            .unwrap_err();

        match err {
            PostureError::Io { message, source } => {
                assert_eq!(message, "Could not read config");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_probe_error_kinds() {
        assert_eq!(ProbeError::tool_missing("ss").kind(), FailureKind::ToolMissing);
        assert_eq!(
            ProbeError::Timeout { timeout_ms: 10 }.kind(),
            FailureKind::Timeout
        );
        assert!(ProbeError::tool_missing("ss")
            .to_string()
            .contains("tool unavailable: ss"));
    }

    #[test]
    fn test_parse_excerpt_is_bounded() {
        let raw = "x".repeat(500);
        match ProbeError::parse("garbled", &raw) {
            ProbeError::Parse { excerpt, .. } => {
                assert_eq!(excerpt.len(), EXCERPT_LIMIT + 3);
                assert!(excerpt.ends_with("..."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_io_permission_maps_to_permission_denied() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let mapped = ProbeError::from_io("/etc/shadow", &err);
        assert_eq!(mapped.kind(), FailureKind::PermissionDenied);
        assert!(mapped.to_string().contains("elevated"));
    }
}
