//! Test utilities for PostureGuard
//!
//! Mock probes with scripted behaviour and fixtures for results and
//! snapshots, shared by unit tests, integration tests and benches.

use crate::core::{
    CheckResult, Config, PostureBand, PostureSnapshot, Probe, ProbeError, ProbeOutcome,
    ProbeResult, Section, Status, DEFAULT_PROBE_TIMEOUT,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a `MockProbe` does when invoked
#[derive(Debug, Clone)]
enum Behaviour {
    Outcome(ProbeOutcome),
    Error(ProbeError),
    Panic(String),
}

/// Mock probe for testing
pub struct MockProbe {
    id: &'static str,
    section: Section,
    behaviour: Behaviour,
    delay: Option<Duration>,
    timeout: Duration,
    tools: Vec<&'static str>,
    invocations: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

impl MockProbe {
    /// A probe that answers `ok` immediately
    pub fn new(id: &'static str, section: Section) -> Self {
        Self {
            id,
            section,
            behaviour: Behaviour::Outcome(ProbeOutcome::ok("Mock")),
            delay: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
            tools: Vec::new(),
            invocations: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_status<S: Into<String>>(mut self, status: Status, detail: S) -> Self {
        self.behaviour = Behaviour::Outcome(ProbeOutcome::new(status, detail));
        self
    }

    pub fn with_error(mut self, error: ProbeError) -> Self {
        self.behaviour = Behaviour::Error(error);
        self
    }

    pub fn with_panic<S: Into<String>>(mut self, message: S) -> Self {
        self.behaviour = Behaviour::Panic(message.into());
        self
    }

    /// Sleep this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn requiring(mut self, tools: &[&'static str]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    /// Shared counter of `invoke` calls, readable after the probe has been
    /// moved into a registry
    pub fn invocations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.invocations)
    }

    /// Counter of invocations that got past their delay
    pub fn completions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completions)
    }
}

#[async_trait]
impl Probe for MockProbe {
    fn id(&self) -> &'static str {
        self.id
    }

    fn label(&self) -> &'static str {
        "Mock probe"
    }

    fn section(&self) -> Section {
        self.section
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn required_tools(&self) -> &[&'static str] {
        &self.tools
    }

    async fn invoke(&self) -> ProbeResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completions.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour {
            Behaviour::Outcome(outcome) => Ok(outcome.clone()),
            Behaviour::Error(error) => Err(error.clone()),
            Behaviour::Panic(message) => panic!("{}", message),
        }
    }
}

/// Test utilities
pub struct TestUtils;

impl TestUtils {
    /// Create a test configuration
    pub fn create_test_config() -> Config {
        let mut config = Config::default();
        config.app.debug_mode = true;
        config.app.log_level = "debug".to_string();
        config.scheduler.interval_seconds = 1;
        config
    }

    /// One network result per status, with ids `probe-0`, `probe-1`, ...
    pub fn results_with(statuses: &[Status]) -> Vec<CheckResult> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                CheckResult::new(
                    &format!("probe-{}", i),
                    "Test probe",
                    Section::Network,
                    *status,
                    status.to_string(),
                )
            })
            .collect()
    }

    /// A small all-ok snapshot carrying `sequence`
    pub fn snapshot(sequence: u64) -> PostureSnapshot {
        PostureSnapshot {
            sequence,
            results: Self::results_with(&[Status::Ok, Status::Ok]),
            score: 100,
            band: PostureBand::Good,
            computed_at: Utc::now(),
            duration_ms: 1,
        }
    }

    /// Assert that a snapshot is internally consistent
    pub fn assert_snapshot_valid(snapshot: &PostureSnapshot) {
        assert!(snapshot.score <= 100);
        assert_eq!(snapshot.band, PostureBand::from_score(snapshot.score));
        for result in &snapshot.results {
            assert!(!result.id.is_empty());
            assert!(!result.label.is_empty());
            if result.staleness {
                assert_eq!(result.status, Status::Warn);
            }
            if result.failure.is_some() {
                assert_eq!(result.status, Status::Warn);
            }
        }
    }
}

/// Assert the status (and optionally the failure kind) of a result
#[macro_export]
macro_rules! assert_check {
    ($result:expr, $status:expr) => {
        assert_eq!($result.status, $status, "unexpected status for {}", $result.id);
    };
    ($result:expr, $status:expr, $failure:expr) => {
        assert_eq!($result.status, $status, "unexpected status for {}", $result.id);
        assert_eq!($result.failure, Some($failure), "unexpected failure for {}", $result.id);
    };
}
