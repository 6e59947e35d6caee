//! Scan command implementation

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::OutputTarget;
use crate::cli::display::Display;
use crate::core::{Config, PostureError, PostureResult};
use crate::engine::PostureEngine;
use crate::probes::command::is_elevated;
use clap::ArgMatches;

/// Handle the scan command
pub async fn handle(matches: &ArgMatches, config: &Config, display: &Display) -> PostureResult<()> {
    let target = OutputTarget::from_matches(matches, config)?;
    let engine = PostureEngine::from_config(config)?;

    if !is_elevated() {
        warn!("Not running as root; some checks may report degraded results");
    }

    let snapshot = engine
        .run_cycle(&CancellationToken::new())
        .await?
        .ok_or_else(|| PostureError::fatal("Posture cycle produced no snapshot"))?;

    target.emit(&snapshot, display)?;

    let degraded = snapshot.degraded().count();
    if degraded > 0 && target.is_console() {
        display.warning(&format!(
            "{} check(s) could not complete; their results are degraded",
            degraded
        ));
    }
    Ok(())
}
