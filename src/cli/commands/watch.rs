//! Watch command implementation

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::OutputTarget;
use crate::cli::display::Display;
use crate::core::{Config, PostureResult};
use crate::engine::PostureEngine;
use crate::report::LogSink;
use crate::scheduler::{RefreshScheduler, SchedulerState};
use clap::ArgMatches;

/// Handle the watch command: cycles until Ctrl-C or a fatal error
pub async fn handle(matches: &ArgMatches, config: &Config, display: &Display) -> PostureResult<()> {
    let target = OutputTarget::from_matches(matches, config)?;
    let interval = matches
        .get_one::<u64>("interval")
        .copied()
        .unwrap_or(config.scheduler.interval_seconds);

    let engine = Arc::new(PostureEngine::from_config(config)?);
    let publisher = engine.publisher();
    LogSink::attach(&publisher);

    let console = Display {
        use_colors: display.use_colors,
    };
    publisher.subscribe(move |snapshot| {
        if let Err(e) = target.emit(&snapshot, &console) {
            error!(error = %e, "Failed to emit snapshot");
        }
    });

    let scheduler = RefreshScheduler::new(Duration::from_secs(interval))?;
    let cycle_engine = Arc::clone(&engine);
    scheduler.start(move |token| {
        let engine = Arc::clone(&cycle_engine);
        async move { engine.run_cycle(&token).await.map(|_| ()) }
    })?;

    let mut state = scheduler.subscribe_state();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Could not listen for Ctrl-C");
            }
            info!("Interrupted, stopping");
        }
        _ = state.wait_for(|s| *s == SchedulerState::Stopped) => {
            error!("Scheduler stopped after a fatal error");
        }
    }

    scheduler.stop().await;
    engine.shutdown();
    Ok(())
}
