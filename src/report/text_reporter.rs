use std::fmt::Write;

use crate::core::{PostureSnapshot, Section};
use crate::report::{ReportError, Reporter};

/// Plain-text rendering, one line per result grouped by section
pub struct TextReporter;

impl Reporter for TextReporter {
    fn render(&self, snapshot: &PostureSnapshot) -> Result<String, ReportError> {
        render_text(snapshot).map_err(|e| ReportError::SerializationError(e.to_string()))
    }

    fn format_name(&self) -> &'static str {
        "text"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

fn render_text(snapshot: &PostureSnapshot) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "Posture score: {}/100 ({})  cycle #{}  {}",
        snapshot.score,
        snapshot.band,
        snapshot.sequence,
        snapshot.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    let label_width = snapshot
        .results
        .iter()
        .map(|r| r.label.len())
        .max()
        .unwrap_or(0);

    for section in Section::ALL {
        let mut results = snapshot.results.iter().filter(|r| r.section == section).peekable();
        if results.peek().is_none() {
            continue;
        }

        writeln!(out)?;
        writeln!(out, "[{}]", section)?;
        for result in results {
            let stale = if result.staleness { " (stale)" } else { "" };
            writeln!(
                out,
                "  {:<8} {:<width$}  {}{}",
                result.status.to_string(),
                result.label,
                result.detail,
                stale,
                width = label_width
            )?;
        }
    }

    Ok(out)
}
