//! The posture-scanning engine: registry, executor, aggregation and
//! publication wired into a single cycle.

pub mod aggregator;
pub mod executor;
pub mod publisher;
pub mod registry;

pub use aggregator::{aggregate, compute_score, normalize, ScoreWeights};
pub use executor::{CheckExecutor, CycleOutcome, RawOutcome};
pub use publisher::{CurrentSnapshot, SnapshotPublisher, SubscriptionId};
pub use registry::{CheckRegistry, CheckRegistryBuilder, RegisteredProbe};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{Config, PostureError, PostureResult, PostureSnapshot, Status};
use crate::probes::{PathLocator, ToolLocator};

/// Runs cycles end to end: execute, aggregate, publish
pub struct PostureEngine {
    registry: CheckRegistry,
    executor: CheckExecutor,
    weights: ScoreWeights,
    publisher: Arc<SnapshotPublisher>,
    sequence: AtomicU64,
}

impl PostureEngine {
    pub fn new(
        registry: CheckRegistry,
        executor: CheckExecutor,
        weights: ScoreWeights,
        publisher: Arc<SnapshotPublisher>,
    ) -> Self {
        Self {
            registry,
            executor,
            weights,
            publisher,
            sequence: AtomicU64::new(0),
        }
    }

    /// Engine for the real host, with tools looked up on `PATH`
    pub fn from_config(config: &Config) -> PostureResult<Self> {
        Self::with_tools(config, Arc::new(PathLocator::from_env()))
    }

    pub fn with_tools(config: &Config, tools: Arc<dyn ToolLocator>) -> PostureResult<Self> {
        let registry = CheckRegistry::from_config(config, Arc::clone(&tools))?;
        let executor =
            CheckExecutor::new(tools).with_max_concurrency(config.executor.max_concurrent_probes);

        info!(probes = registry.len(), "Posture engine initialized");
        Ok(Self::new(
            registry,
            executor,
            ScoreWeights::from_config(config),
            Arc::new(SnapshotPublisher::new()),
        ))
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        Arc::clone(&self.publisher)
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Run one cycle and publish its snapshot. Returns `Ok(None)` when the
    /// cycle was cancelled or the publisher is closed; nothing is published
    /// in that case.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> PostureResult<Option<Arc<PostureSnapshot>>> {
        let started = Instant::now();
        debug!(probes = self.registry.len(), "Starting posture cycle");

        let raws = match self.executor.run_cycle(&self.registry, cancel).await {
            CycleOutcome::Completed(raws) => raws,
            CycleOutcome::Cancelled => {
                info!("Posture cycle cancelled");
                return Ok(None);
            }
        };

        if raws.len() != self.registry.len() {
            return Err(PostureError::fatal(format!(
                "cycle produced {} results for {} registered probes",
                raws.len(),
                self.registry.len()
            )));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = aggregate(raws, &self.weights)
            .with_sequence(sequence)
            .with_duration(started.elapsed());

        for result in snapshot.degraded() {
            warn!(probe = %result.id, detail = %result.detail, "Probe degraded");
        }

        if cancel.is_cancelled() {
            info!(sequence, "Posture cycle cancelled before publication");
            return Ok(None);
        }

        info!(
            sequence,
            score = snapshot.score,
            band = %snapshot.band,
            critical = snapshot.results.iter().filter(|r| r.status == Status::Critical).count(),
            elapsed_ms = snapshot.duration_ms,
            "Posture cycle complete"
        );
        Ok(self.publisher.publish(snapshot))
    }

    /// Close the publisher; later cycles publish nothing
    pub fn shutdown(&self) {
        self.publisher.close();
    }
}
