//! Periodic driver for posture cycles
//!
//! One coordinator task owns the ticker. Each tick spawns at most one cycle
//! task; a tick that finds the previous cycle still running is skipped, so
//! cycles never overlap and never queue up.

pub mod scheduler_types;

pub use scheduler_types::*;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::config::SchedulerConfig;
use crate::core::PostureResult;

/// State shared between the scheduler handle and its tasks
struct Shared {
    state: watch::Sender<SchedulerState>,
    cancel: CancellationToken,
    stats: SchedulerStats,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn transition(&self, next: SchedulerState) -> SchedulerResult<()> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                rejected = Some(*state);
                false
            }
        });

        match rejected {
            None => Ok(()),
            Some(SchedulerState::Stopped) => Err(SchedulerError::Stopped),
            Some(from) => Err(SchedulerError::InvalidTransition { from, to: next }),
        }
    }

    /// Enter `Running` unless stopped. A cycle task that panicked leaves
    /// the state at `Running`, which is accepted here.
    fn begin_cycle(&self) -> bool {
        let mut stopped = false;
        self.state.send_if_modified(|state| match state {
            SchedulerState::Stopped => {
                stopped = true;
                false
            }
            SchedulerState::Running => false,
            _ => {
                *state = SchedulerState::Running;
                true
            }
        });
        !stopped
    }

    fn stop(&self) {
        self.state.send_if_modified(|state| {
            let changed = *state != SchedulerState::Stopped;
            *state = SchedulerState::Stopped;
            changed
        });
        self.cancel.cancel();
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct RefreshScheduler {
    interval: Duration,
    shared: Arc<Shared>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }

        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            interval,
            shared: Arc::new(Shared {
                state,
                cancel: CancellationToken::new(),
                stats: SchedulerStats::default(),
                in_flight: Mutex::new(None),
            }),
            coordinator: Mutex::new(None),
        })
    }

    pub fn from_config(config: &SchedulerConfig) -> SchedulerResult<Self> {
        Self::new(Duration::from_secs(config.interval_seconds))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state change
    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.shared.stats
    }

    /// Start firing `on_cycle`, first immediately and then once per
    /// interval. Each cycle receives a token that fires when the scheduler
    /// stops. A fatal error from a cycle stops the scheduler.
    pub fn start<F, Fut>(&self, on_cycle: F) -> SchedulerResult<()>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PostureResult<()>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;

        let mut previous = SchedulerState::Idle;
        let started = self.shared.state.send_if_modified(|state| {
            previous = *state;
            if *state == SchedulerState::Idle {
                *state = SchedulerState::Scheduled;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(match previous {
                SchedulerState::Stopped => SchedulerError::Stopped,
                _ => SchedulerError::AlreadyStarted,
            });
        }

        let shared = Arc::clone(&self.shared);
        let on_cycle = Arc::new(on_cycle);
        let interval = self.interval;

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                Self::on_tick(&shared, &on_cycle);
            }
            debug!("Scheduler coordinator exited");
        });

        *self.lock_coordinator() = Some(handle);
        info!(interval_secs = interval.as_secs_f64(), "Refresh scheduler started");
        Ok(())
    }

    fn on_tick<F, Fut>(shared: &Arc<Shared>, on_cycle: &Arc<F>)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PostureResult<()>> + Send + 'static,
    {
        let mut in_flight = shared.in_flight();
        if in_flight.as_ref().map_or(false, |handle| !handle.is_finished()) {
            let skipped = shared.stats.record_skipped();
            warn!(skipped_total = skipped, "Previous cycle still running, skipping tick");
            return;
        }

        if !shared.begin_cycle() {
            return;
        }

        let cycle_shared = Arc::clone(shared);
        let cycle = on_cycle(shared.cancel.child_token());
        *in_flight = Some(tokio::spawn(async move {
            let result = cycle.await;
            let shared = cycle_shared;

            match result {
                Ok(()) => shared.stats.record_completed(),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Fatal error in posture cycle, stopping scheduler");
                    shared.stats.record_failed();
                    shared.stop();
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "Posture cycle failed");
                    shared.stats.record_failed();
                }
            }

            // Stopped while running: stay stopped
            let _ = shared.transition(SchedulerState::Scheduled);
        }));
    }

    /// Stop for good. No cycle starts after this returns and the in-flight
    /// cycle, if any, has been aborted and awaited.
    pub async fn stop(&self) {
        self.shared.stop();

        let coordinator = self.lock_coordinator().take();
        if let Some(handle) = coordinator {
            handle.abort();
            let _ = handle.await;
        }

        let in_flight = self.shared.in_flight().take();
        if let Some(handle) = in_flight {
            handle.abort();
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("Posture cycle panicked during shutdown");
                }
            }
        }

        info!(
            completed = self.shared.stats.completed(),
            skipped = self.shared.stats.skipped(),
            "Refresh scheduler stopped"
        );
    }

    fn lock_coordinator(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.coordinator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shared.stop();
        if let Some(handle) = self.lock_coordinator().take() {
            handle.abort();
        }
        if let Some(handle) = self.shared.in_flight().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PostureError, Section};
    use crate::engine::{CheckExecutor, CheckRegistry, PostureEngine, ScoreWeights, SnapshotPublisher};
    use crate::probes::StaticToolLocator;
    use crate::testing::MockProbe;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn idle_cycle(_: CancellationToken) -> impl Future<Output = PostureResult<()>> {
        async { Ok(()) }
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert_eq!(
            RefreshScheduler::new(Duration::ZERO).err(),
            Some(SchedulerError::ZeroInterval)
        );
    }

    #[test]
    fn test_start_outside_runtime() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(1)).unwrap();
        let result = scheduler.start(idle_cycle);
        assert!(matches!(result, Err(SchedulerError::NoRuntime(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_tick_is_skipped() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(10)).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let (r, m) = (Arc::clone(&running), Arc::clone(&max_running));
        scheduler
            .start(move |_| {
                let (running, max_running) = (Arc::clone(&r), Arc::clone(&m));
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_running.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(15)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), PostureError>(())
                }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(scheduler.stats().skipped(), 1);
        assert_eq!(scheduler.stats().completed(), 1);
        assert_eq!(max_running.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_cycle_publishes_nothing() {
        let mut builder = CheckRegistry::builder();
        builder
            .register(Arc::new(
                MockProbe::new("slow", Section::Network).with_delay(Duration::from_secs(4)),
            ))
            .unwrap();
        let engine = Arc::new(PostureEngine::new(
            builder.build().unwrap(),
            CheckExecutor::new(Arc::new(StaticToolLocator::everything())),
            ScoreWeights::equal(),
            Arc::new(SnapshotPublisher::new()),
        ));
        let publisher = engine.publisher();

        let scheduler = RefreshScheduler::new(Duration::from_secs(60)).unwrap();
        let cycle_engine = Arc::clone(&engine);
        scheduler
            .start(move |token| {
                let engine = Arc::clone(&cycle_engine);
                async move { engine.run_cycle(&token).await.map(|_| ()) }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(publisher.published_count(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    fn slow_engine(probe: MockProbe) -> Arc<PostureEngine> {
        let mut builder = CheckRegistry::builder();
        builder.register(Arc::new(probe)).unwrap();
        Arc::new(PostureEngine::new(
            builder.build().unwrap(),
            CheckExecutor::new(Arc::new(StaticToolLocator::everything())),
            ScoreWeights::equal(),
            Arc::new(SnapshotPublisher::new()),
        ))
    }

    fn start_engine(scheduler: &RefreshScheduler, engine: &Arc<PostureEngine>) {
        let engine = Arc::clone(engine);
        scheduler
            .start(move |token| {
                let engine = Arc::clone(&engine);
                async move { engine.run_cycle(&token).await.map(|_| ()) }
            })
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_leaves_no_probe_running() {
        let probe = MockProbe::new("slow", Section::Network).with_delay(Duration::from_secs(3));
        let (started, finished) = (probe.invocations(), probe.completions());
        let engine = slow_engine(probe);

        let scheduler = RefreshScheduler::new(Duration::from_secs(60)).unwrap();
        start_engine(&scheduler, &engine);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_leaves_no_probe_running() {
        let probe = MockProbe::new("slow", Section::Network).with_delay(Duration::from_secs(3));
        let (started, finished) = (probe.invocations(), probe.completions());
        let engine = slow_engine(probe);

        let scheduler = RefreshScheduler::new(Duration::from_secs(60)).unwrap();
        start_engine(&scheduler, &engine);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        drop(scheduler);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
        assert_eq!(engine.publisher().published_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_scheduler() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(10)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        scheduler
            .start(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PostureError::fatal("registry unavailable")) }
            })
            .unwrap();

        let mut state = scheduler.subscribe_state();
        state
            .wait_for(|s| *s == SchedulerState::Stopped)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.stats().failed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_fatal_error_keeps_running() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(10)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        scheduler
            .start(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PostureError::io("report file unwritable")) }
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_ne!(scheduler.state(), SchedulerState::Stopped);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(10)).unwrap();
        scheduler.start(idle_cycle).unwrap();
        assert_eq!(
            scheduler.start(idle_cycle),
            Err(SchedulerError::AlreadyStarted)
        );

        scheduler.stop().await;
        scheduler.stop().await;
        assert_eq!(
            scheduler.start(idle_cycle),
            Err(SchedulerError::Stopped)
        );
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }
}
