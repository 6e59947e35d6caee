//! External tool discovery

use std::collections::HashSet;
use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

/// Answers whether an external utility can be run on this host
pub trait ToolLocator: Send + Sync {
    fn locate(&self, tool: &str) -> Option<PathBuf>;

    fn is_available(&self, tool: &str) -> bool {
        self.locate(tool).is_some()
    }

    /// First tool of `tools` that is missing when none of them is available.
    /// Returns `None` when the requirement is met.
    fn missing_requirement(&self, tools: &[&'static str]) -> Option<String> {
        if tools.is_empty() || tools.iter().any(|tool| self.is_available(tool)) {
            None
        } else {
            Some(tools.join("|"))
        }
    }
}

/// Looks tools up in the directories of a `PATH`-style search list
#[derive(Debug, Clone)]
pub struct PathLocator {
    search_path: Option<OsString>,
}

impl PathLocator {
    /// Locator over the process `PATH`
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn with_search_path<S: Into<OsString>>(search_path: S) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl Default for PathLocator {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ToolLocator for PathLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .map(|dir| dir.join(tool))
            .find(|candidate| {
                candidate
                    .metadata()
                    .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
                    .unwrap_or(false)
            })
    }
}

/// Fixed set of available tools, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct StaticToolLocator {
    available: HashSet<String>,
    everything: bool,
}

impl StaticToolLocator {
    /// No tool is available
    pub fn none() -> Self {
        Self::default()
    }

    /// Every tool is available
    pub fn everything() -> Self {
        Self {
            available: HashSet::new(),
            everything: true,
        }
    }

    pub fn with_tools(tools: &[&str]) -> Self {
        Self {
            available: tools.iter().map(|t| t.to_string()).collect(),
            everything: false,
        }
    }
}

impl ToolLocator for StaticToolLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        if self.everything || self.available.contains(tool) {
            Some(PathBuf::from("/usr/bin").join(tool))
        } else {
            None
        }
    }
}
