//! Ordered catalog of probes, fixed for the lifetime of the process

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{Config, PostureError, PostureResult, Probe, Section};
use crate::probes::{self, ProbeSettings, ToolLocator};

/// A probe together with the metadata the executor needs to run it
#[derive(Clone)]
pub struct RegisteredProbe {
    probe: Arc<dyn Probe>,
    timeout: Duration,
    declaration: usize,
}

impl RegisteredProbe {
    pub fn probe(&self) -> &Arc<dyn Probe> {
        &self.probe
    }

    pub fn id(&self) -> &'static str {
        self.probe.id()
    }

    pub fn label(&self) -> &'static str {
        self.probe.label()
    }

    pub fn section(&self) -> Section {
        self.probe.section()
    }

    /// Effective timeout after configuration overrides
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn required_tools(&self) -> &[&'static str] {
        self.probe.required_tools()
    }
}

impl std::fmt::Debug for RegisteredProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProbe")
            .field("id", &self.id())
            .field("section", &self.section())
            .field("timeout", &self.timeout)
            .field("declaration", &self.declaration)
            .finish()
    }
}

/// Collects probes at startup. Duplicate ids are rejected here so that a
/// misconfigured battery never reaches a cycle.
#[derive(Debug, Default)]
pub struct CheckRegistryBuilder {
    probes: Vec<RegisteredProbe>,
    ids: HashSet<&'static str>,
}

impl CheckRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a probe with its own declared timeout
    pub fn register(&mut self, probe: Arc<dyn Probe>) -> PostureResult<&mut Self> {
        let timeout = probe.timeout();
        self.register_with_timeout(probe, timeout)
    }

    pub fn register_with_timeout(
        &mut self,
        probe: Arc<dyn Probe>,
        timeout: Duration,
    ) -> PostureResult<&mut Self> {
        let id = probe.id();
        if id.is_empty() {
            return Err(PostureError::registry("probe id must not be empty"));
        }
        if timeout.is_zero() {
            return Err(PostureError::registry(format!(
                "probe '{}' has a zero timeout",
                id
            )));
        }
        if !self.ids.insert(id) {
            return Err(PostureError::registry(format!(
                "duplicate probe id '{}'",
                id
            )));
        }

        let declaration = self.probes.len();
        self.probes.push(RegisteredProbe {
            probe,
            timeout,
            declaration,
        });
        Ok(self)
    }

    /// Freeze the catalog, ordered by section then declaration
    pub fn build(self) -> PostureResult<CheckRegistry> {
        if self.probes.is_empty() {
            return Err(PostureError::registry("no probes registered"));
        }

        let mut probes = self.probes;
        probes.sort_by_key(|p| (p.section(), p.declaration));

        tracing::debug!(probes = probes.len(), "Check registry built");
        Ok(CheckRegistry {
            probes: Arc::from(probes),
        })
    }
}

/// Immutable, cheaply clonable probe catalog
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    probes: Arc<[RegisteredProbe]>,
}

impl CheckRegistry {
    pub fn builder() -> CheckRegistryBuilder {
        CheckRegistryBuilder::new()
    }

    /// The shipped probe battery, with configured timeouts and without
    /// disabled probes
    pub fn from_config(config: &Config, tools: Arc<dyn ToolLocator>) -> PostureResult<Self> {
        let settings = ProbeSettings::from_config(config, tools);
        let mut builder = Self::builder();
        for probe in probes::default_probes(&settings) {
            let timeout = settings.timeout_for(probe.as_ref());
            builder.register_with_timeout(probe, timeout)?;
        }
        builder.build()
    }

    /// All probes grouped by section, in declaration order within a section
    pub fn list_probes(&self) -> &[RegisteredProbe] {
        &self.probes
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredProbe> {
        self.probes.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Sections present in the registry, in order
    pub fn sections(&self) -> Vec<Section> {
        let mut sections: Vec<Section> = self.probes.iter().map(|p| p.section()).collect();
        sections.dedup();
        sections
    }

    /// Largest effective timeout, which bounds the latency of a cycle
    pub fn max_timeout(&self) -> Duration {
        self.probes
            .iter()
            .map(|p| p.timeout)
            .max()
            .unwrap_or_default()
    }
}
