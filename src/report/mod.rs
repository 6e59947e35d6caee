use crate::core::{PostureError, PostureSnapshot};
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub mod json_reporter;
pub mod log_sink;
pub mod text_reporter;

pub use json_reporter::JsonReporter;
pub use log_sink::LogSink;
pub use text_reporter::TextReporter;

/// Report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Text,
}

impl std::str::FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "text" | "txt" => Ok(ReportFormat::Text),
            _ => Err(ReportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ReportFormat {
    pub fn reporter(self) -> Box<dyn Reporter> {
        match self {
            ReportFormat::Json => Box::new(JsonReporter::new(true)),
            ReportFormat::Text => Box::new(TextReporter),
        }
    }
}

/// Report errors
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<ReportError> for PostureError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::IoError(message) => PostureError::io(message),
            ReportError::SerializationError(message) => PostureError::serialization(message),
            ReportError::UnsupportedFormat(format) => {
                PostureError::config(format!("Unsupported output format: {}", format))
            }
        }
    }
}

/// Turns a snapshot into a document
pub trait Reporter: Send + Sync {
    fn render(&self, snapshot: &PostureSnapshot) -> Result<String, ReportError>;

    fn format_name(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;
}

/// Render `snapshot` to `path`, creating parent directories, or to stdout
/// when no path is given
pub fn write_report(
    reporter: &dyn Reporter,
    snapshot: &PostureSnapshot,
    path: Option<&Path>,
) -> Result<(), ReportError> {
    let document = reporter.render(snapshot)?;

    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    ReportError::IoError(format!("Failed to create output directory: {}", e))
                })?;
            }
            fs::write(path, document).map_err(|e| {
                ReportError::IoError(format!(
                    "Failed to write {} report to {}: {}",
                    reporter.format_name(),
                    path.display(),
                    e
                ))
            })?;
            tracing::info!(path = %path.display(), format = reporter.format_name(), "Report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", document)
                .map_err(|e| ReportError::IoError(format!("Failed to write to stdout: {}", e)))?;
        }
    }
    Ok(())
}
