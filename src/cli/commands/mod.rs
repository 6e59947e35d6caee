//! Command handlers for the CLI interface

pub mod config;
pub mod list;
pub mod scan;
pub mod watch;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cli::display::Display;
use crate::core::{Config, PostureResult, PostureSnapshot};
use crate::report::{self, ReportFormat, Reporter};

/// File name used when `--file` points at a directory
const REPORT_STEM: &str = "postureguard-report";
use clap::ArgMatches;

/// Where and how a snapshot is emitted, from `--output`/`--file` or the
/// `output` section of the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub format: ReportFormat,
    pub path: Option<PathBuf>,
}

impl OutputTarget {
    pub fn from_matches(matches: &ArgMatches, config: &Config) -> PostureResult<Self> {
        let format = matches
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or(config.output.format.as_str());

        Ok(Self {
            format: ReportFormat::from_str(format)?,
            path: matches
                .get_one::<String>("file")
                .map(PathBuf::from)
                .or_else(|| config.output.path.clone()),
        })
    }

    /// Whether the snapshot goes to the terminal as colored text
    pub fn is_console(&self) -> bool {
        self.format == ReportFormat::Text && self.path.is_none()
    }

    pub fn emit(&self, snapshot: &PostureSnapshot, display: &Display) -> PostureResult<()> {
        if self.is_console() {
            display.snapshot(snapshot);
            return Ok(());
        }
        let reporter = self.format.reporter();
        let path = self
            .path
            .as_deref()
            .map(|path| report_file(path, reporter.as_ref()));
        report::write_report(reporter.as_ref(), snapshot, path.as_deref())?;
        Ok(())
    }
}

/// A directory target gets a file named after the report format
fn report_file(path: &Path, reporter: &dyn Reporter) -> PathBuf {
    if path.is_dir() {
        path.join(format!("{}.{}", REPORT_STEM, reporter.file_extension()))
    } else {
        path.to_path_buf()
    }
}
