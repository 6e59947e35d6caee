//! Console output for the CLI: colors, tables and snapshot rendering

use std::io::IsTerminal;

use crate::core::{PostureBand, PostureSnapshot, Section, Status};

/// Display utility for CLI output
pub struct Display {
    pub use_colors: bool,
}

impl Display {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    pub fn success(&self, message: &str) {
        if self.use_colors {
            println!("{} {}", self.color_text("✓", Color::Green), message);
        } else {
            println!("[SUCCESS] {}", message);
        }
    }

    pub fn error(&self, message: &str) {
        if self.use_colors {
            eprintln!("{} {}", self.color_text("✗", Color::Red), message);
        } else {
            eprintln!("[ERROR] {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.use_colors {
            println!("{} {}", self.color_text("⚠", Color::Yellow), message);
        } else {
            println!("[WARNING] {}", message);
        }
    }

    pub fn info(&self, message: &str) {
        if self.use_colors {
            println!("{} {}", self.color_text("ℹ", Color::Blue), message);
        } else {
            println!("[INFO] {}", message);
        }
    }

    pub fn section_header(&self, title: &str) {
        println!();
        if self.use_colors {
            println!("{}", self.color_text(&format!("▶ {}", title), Color::Cyan));
        } else {
            println!(">> {}", title);
        }
        println!("{}", "─".repeat(title.chars().count() + 3));
    }

    /// Display a table with headers and rows
    pub fn table(&self, headers: &[&str], rows: &[Vec<String>]) {
        if rows.is_empty() {
            self.warning("No data to display");
            return;
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.chars().count());
                }
            }
        }

        print!("│");
        for (i, header) in headers.iter().enumerate() {
            print!(" {:<width$} │", header, width = widths[i]);
        }
        println!();

        print!("├");
        for width in &widths {
            print!("{}┼", "─".repeat(width + 2));
        }
        println!("┤");

        for row in rows {
            print!("│");
            for (i, cell) in row.iter().enumerate() {
                let width = widths.get(i).copied().unwrap_or(0);
                print!(" {:<width$} │", cell, width = width);
            }
            println!();
        }
    }

    pub fn key_value_list(&self, items: &[(&str, &str)]) {
        let max_key_width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

        for (key, value) in items {
            if self.use_colors {
                println!(
                    "  {} : {}",
                    self.color_text(&format!("{:<width$}", key, width = max_key_width), Color::Cyan),
                    value
                );
            } else {
                println!("  {:<width$} : {}", key, value, width = max_key_width);
            }
        }
    }

    /// Render a snapshot grouped by section, with colored statuses
    pub fn snapshot(&self, snapshot: &PostureSnapshot) {
        let band_color = match snapshot.band {
            PostureBand::Good => Color::Green,
            PostureBand::Fair => Color::Yellow,
            PostureBand::Poor => Color::Red,
        };
        println!(
            "{} {}",
            self.color_text("Posture score:", Color::Bold),
            self.color_text(
                &format!("{}/100 ({})", snapshot.score, snapshot.band),
                band_color
            )
        );

        let label_width = snapshot
            .results
            .iter()
            .map(|r| r.label.len())
            .max()
            .unwrap_or(0);

        for (section, summary) in snapshot.section_summary() {
            self.section_header(&format!(
                "{} ({} ok, {} warn, {} critical)",
                section, summary.ok, summary.warn, summary.critical
            ));
            for result in snapshot.results.iter().filter(|r| r.section == section) {
                let stale = if result.staleness {
                    self.color_text(" (stale)", Color::Gray)
                } else {
                    String::new()
                };
                println!(
                    "  {} {:<width$}  {}{}",
                    self.status_badge(result.status),
                    result.label,
                    result.detail,
                    stale,
                    width = label_width
                );
            }
        }

        println!();
        println!(
            "{}",
            self.color_text(
                &format!(
                    "cycle #{} in {} ms at {}",
                    snapshot.sequence,
                    snapshot.duration_ms,
                    snapshot.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                Color::Gray
            )
        );
    }

    /// Fixed-width status label
    pub fn status_badge(&self, status: Status) -> String {
        let label = format!("{:<8}", status.to_string());
        let color = match status {
            Status::Ok => Color::Green,
            Status::Warn => Color::Yellow,
            Status::Critical => Color::Red,
            Status::Unknown => Color::Gray,
        };
        self.color_text(&label, color)
    }

    pub fn section_title(&self, section: Section) -> String {
        self.color_text(&section.to_string(), Color::Cyan)
    }

    /// Color text if colors are supported
    pub fn color_text(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            match color {
                Color::Red => format!("\x1b[31m{}\x1b[0m", text),
                Color::Green => format!("\x1b[32m{}\x1b[0m", text),
                Color::Yellow => format!("\x1b[33m{}\x1b[0m", text),
                Color::Blue => format!("\x1b[34m{}\x1b[0m", text),
                Color::Cyan => format!("\x1b[36m{}\x1b[0m", text),
                Color::Gray => format!("\x1b[90m{}\x1b[0m", text),
                Color::Bold => format!("\x1b[1m{}\x1b[0m", text),
            }
        } else {
            text.to_string()
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}

/// Color enum for terminal output
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
    Gray,
    Bold,
}

/// Check if the terminal supports colors
fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    match std::env::var("TERM") {
        Ok(term) => !term.is_empty() && term != "dumb" && std::io::stdout().is_terminal(),
        Err(_) => false,
    }
}
