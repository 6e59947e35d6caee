use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::command;
use crate::core::{Probe, ProbeError, ProbeOutcome, ProbeResult, Section};

/// Browser profile directories, relative to the home directory
const BROWSER_PROFILES: [(&str, &str); 4] = [
    ("Firefox", ".mozilla/firefox"),
    ("Chrome", ".config/google-chrome"),
    ("Chromium", ".config/chromium"),
    ("Brave", ".config/BraveSoftware"),
];

const HISTORY_FILES: [&str; 2] = [".bash_history", ".zsh_history"];

/// History length from which shell history counts as a privacy problem
const HISTORY_CRITICAL_LINES: usize = 50;

fn require_home(home: &Option<PathBuf>) -> Result<&Path, ProbeError> {
    home.as_deref()
        .ok_or_else(|| ProbeError::unexpected("home directory unknown"))
}

pub struct BrowserDataProbe {
    home: Option<PathBuf>,
}

impl BrowserDataProbe {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Probe for BrowserDataProbe {
    fn id(&self) -> &'static str {
        "browser_data"
    }

    fn label(&self) -> &'static str {
        "Browser Data"
    }

    fn section(&self) -> Section {
        Section::Privacy
    }

    async fn invoke(&self) -> ProbeResult {
        let home = require_home(&self.home)?;

        let mut found = Vec::new();
        for (browser, profile) in BROWSER_PROFILES {
            let is_dir = tokio::fs::metadata(home.join(profile))
                .await
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            if is_dir {
                found.push(browser);
            }
        }
        Ok(classify_browser_data(&found))
    }
}

pub fn classify_browser_data(found: &[&str]) -> ProbeOutcome {
    if found.is_empty() {
        ProbeOutcome::ok("No data found")
    } else {
        ProbeOutcome::critical(found.join(", "))
    }
}

pub struct ShellHistoryProbe {
    home: Option<PathBuf>,
}

impl ShellHistoryProbe {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }
}

#[async_trait]
impl Probe for ShellHistoryProbe {
    fn id(&self) -> &'static str {
        "shell_history"
    }

    fn label(&self) -> &'static str {
        "Shell History"
    }

    fn section(&self) -> Section {
        Section::Privacy
    }

    async fn invoke(&self) -> ProbeResult {
        let home = require_home(&self.home)?;

        let mut max_lines = 0;
        for file in HISTORY_FILES {
            // An unreadable history file is not evidence of history
            if let Ok(Some(content)) = command::read_text_optional(&home.join(file)).await {
                max_lines = max_lines.max(content.lines().count());
            }
        }
        Ok(classify_shell_history(max_lines))
    }
}

pub fn classify_shell_history(max_lines: usize) -> ProbeOutcome {
    match max_lines {
        0 => ProbeOutcome::ok("No history"),
        n if n < HISTORY_CRITICAL_LINES => ProbeOutcome::warn(format!("{} entries", n)),
        n => ProbeOutcome::critical(format!("{} entries", n)),
    }
}

pub struct ClipboardProbe;

#[async_trait]
impl Probe for ClipboardProbe {
    fn id(&self) -> &'static str {
        "clipboard"
    }

    fn label(&self) -> &'static str {
        "Clipboard"
    }

    fn section(&self) -> Section {
        Section::Privacy
    }

    fn required_tools(&self) -> &[&'static str] {
        &["xclip", "xsel"]
    }

    async fn invoke(&self) -> ProbeResult {
        let attempts: [(&str, &[&str]); 2] = [
            ("xclip", &["-selection", "clipboard", "-o"]),
            ("xsel", &["--clipboard", "--output"]),
        ];

        for (tool, args) in attempts {
            if let Some(output) = command::run_optional(tool, args).await? {
                if output.success {
                    return Ok(classify_clipboard(&output.stdout));
                }
            }
        }

        // No display or nothing owns the selection
        Ok(classify_clipboard(""))
    }
}

pub fn classify_clipboard(content: &str) -> ProbeOutcome {
    let length = content.trim().chars().count();
    if length == 0 {
        ProbeOutcome::ok("Empty")
    } else {
        ProbeOutcome::warn(format!("{} chars", length))
    }
}
