//! Runs one cycle of probes, each inside its own fault and timeout boundary

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::{CheckRegistry, RegisteredProbe};
use crate::core::{ProbeError, ProbeResult, Section};
use crate::probes::ToolLocator;

/// Outcome of one probe for one cycle, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutcome {
    pub probe_id: &'static str,
    pub label: &'static str,
    pub section: Section,
    pub outcome: ProbeResult,
    pub elapsed: Duration,
}

impl RawOutcome {
    fn new(probe: &RegisteredProbe, outcome: ProbeResult, elapsed: Duration) -> Self {
        Self {
            probe_id: probe.id(),
            label: probe.label(),
            section: probe.section(),
            outcome,
            elapsed,
        }
    }
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// One outcome per registered probe, in registry order
    Completed(Vec<RawOutcome>),
    /// The cycle was cancelled; nothing it produced may be published
    Cancelled,
}

/// A spawned probe, aborted when dropped so that a dropped cycle leaves no
/// probe running behind it
struct ProbeTask(JoinHandle<ProbeResult>);

impl Drop for ProbeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct CheckExecutor {
    tools: Arc<dyn ToolLocator>,
    permits: Option<Arc<Semaphore>>,
}

impl CheckExecutor {
    pub fn new(tools: Arc<dyn ToolLocator>) -> Self {
        Self {
            tools,
            permits: None,
        }
    }

    /// Cap the number of probes running at once; 0 leaves it unbounded
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    /// Run every probe of `registry` concurrently. Cycle latency is bounded
    /// by the largest probe timeout, since all deadlines are measured from
    /// the cycle start.
    pub async fn run_cycle(&self, registry: &CheckRegistry, cancel: &CancellationToken) -> CycleOutcome {
        let cycle_start = Instant::now();

        let pending: Vec<(&RegisteredProbe, Result<ProbeTask, String>)> = registry
            .list_probes()
            .iter()
            .map(|probe| {
                let task = match self.tools.missing_requirement(probe.required_tools()) {
                    Some(missing) => Err(missing),
                    None => Ok(self.spawn_probe(probe)),
                };
                (probe, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());

        // Tasks not yet awaited are aborted with the loop iterator, on an early
        // return as well as when this future is dropped mid-await
        for (probe, task) in pending {
            let mut task = match task {
                Ok(task) => task,
                Err(missing) => {
                    debug!(probe = probe.id(), tools = %missing, "Required tool unavailable, skipping");
                    outcomes.push(RawOutcome::new(
                        probe,
                        Err(ProbeError::tool_missing(missing)),
                        Duration::ZERO,
                    ));
                    continue;
                }
            };

            let deadline = cycle_start + probe.timeout();
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Cycle cancelled, outstanding probes aborted");
                    return CycleOutcome::Cancelled;
                }
                joined = tokio::time::timeout_at(deadline, &mut task.0) => joined,
            };

            let outcome = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) if join_error.is_panic() => {
                    warn!(probe = probe.id(), "Probe panicked");
                    Err(ProbeError::unexpected(format!(
                        "probe panicked: {}",
                        panic_message(join_error.into_panic())
                    )))
                }
                Ok(Err(join_error)) => {
                    Err(ProbeError::unexpected(format!("probe task failed: {}", join_error)))
                }
                Err(_) => {
                    warn!(
                        probe = probe.id(),
                        timeout_ms = probe.timeout().as_millis() as u64,
                        "Probe timed out"
                    );
                    Err(ProbeError::Timeout {
                        timeout_ms: probe.timeout().as_millis() as u64,
                    })
                }
            };

            let elapsed = cycle_start.elapsed();
            debug!(probe = probe.id(), elapsed_ms = elapsed.as_millis() as u64, "Probe finished");
            outcomes.push(RawOutcome::new(probe, outcome, elapsed));
        }

        CycleOutcome::Completed(outcomes)
    }

    fn spawn_probe(&self, registered: &RegisteredProbe) -> ProbeTask {
        let probe = Arc::clone(registered.probe());
        let permits = self.permits.clone();

        ProbeTask(tokio::spawn(async move {
            let _permit = match permits {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ProbeError::unexpected(format!("executor closed: {}", e)))?,
                ),
                None => None,
            };
            probe.invoke().await
        }))
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
