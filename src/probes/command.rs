//! Host access helpers shared by probes

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::ProbeError;

/// Captured result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command failed because it lacked privileges
    pub fn denied(&self) -> bool {
        if self.success {
            return false;
        }
        let stderr = self.stderr.to_lowercase();
        ["permission denied", "must be root", "need to be root", "operation not permitted"]
            .iter()
            .any(|marker| stderr.contains(marker))
    }
}

/// Run `program` with `args`. The child is killed if the returned future is
/// dropped, so an abandoned probe leaves no process behind.
pub async fn run(program: &str, args: &[&str]) -> Result<CommandOutput, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProbeError::tool_missing(program),
            std::io::ErrorKind::PermissionDenied => {
                ProbeError::permission_denied(format!("cannot execute {}", program))
            }
            _ => ProbeError::unexpected(format!("{} failed to start: {}", program, e)),
        })?;

    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Like `run`, but a missing tool yields `Ok(None)` instead of an error
pub async fn run_optional(program: &str, args: &[&str]) -> Result<Option<CommandOutput>, ProbeError> {
    match run(program, args).await {
        Ok(output) => Ok(Some(output)),
        Err(ProbeError::ToolMissing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read a text file, mapping failures into the probe taxonomy
pub async fn read_text(path: &Path) -> Result<String, ProbeError> {
    tokio::fs::read(path)
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .map_err(|e| ProbeError::from_io(&path.display().to_string(), &e))
}

/// Read a text file that may legitimately be absent
pub async fn read_text_optional(path: &Path) -> Result<Option<String>, ProbeError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProbeError::from_io(&path.display().to_string(), &e)),
    }
}

/// Names of the entries of a directory, sorted
pub async fn list_dir(path: &Path) -> Result<Vec<String>, ProbeError> {
    let subject = path.display().to_string();
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ProbeError::from_io(&subject, &e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ProbeError::from_io(&subject, &e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Whether the current process runs with root privileges
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}
