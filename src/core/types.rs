//! Data model shared by the engine, the reporters and external consumers
//!
//! `CheckResult` and `PostureSnapshot` form the output contract: a renderer or
//! a test harness only ever sees these values, always behind an `Arc` once
//! published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::errors::FailureKind;

/// Grouping label for probes, in display and publication order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Network,
    System,
    Privacy,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Network, Section::System, Section::Privacy];
}

impl Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Network => write!(f, "Network"),
            Section::System => write!(f, "System"),
            Section::Privacy => write!(f, "Privacy"),
        }
    }
}

/// Normalized outcome of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warn,
    Critical,
    Unknown,
}

impl Status {
    /// Contribution of one result to the composite score, before weighting
    pub fn value(self) -> f64 {
        match self {
            Status::Ok => 1.0,
            Status::Warn => 0.5,
            Status::Critical => 0.0,
            Status::Unknown => 0.5,
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Warn => write!(f, "WARN"),
            Status::Critical => write!(f, "CRITICAL"),
            Status::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Result of one probe for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub label: String,
    pub section: Section,
    pub status: Status,
    pub detail: String,
    /// Set when the probe missed its deadline and this result was synthesized
    pub staleness: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl CheckResult {
    pub fn new(id: &str, label: &str, section: Section, status: Status, detail: String) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            section,
            status,
            detail,
            staleness: false,
            failure: None,
        }
    }

    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.staleness = kind == FailureKind::Timeout;
        self.failure = Some(kind);
        self
    }
}

/// Overall posture label derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostureBand {
    Good,
    Fair,
    Poor,
}

impl PostureBand {
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            PostureBand::Good
        } else if score >= 40 {
            PostureBand::Fair
        } else {
            PostureBand::Poor
        }
    }
}

impl Display for PostureBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostureBand::Good => write!(f, "GOOD"),
            PostureBand::Fair => write!(f, "FAIR"),
            PostureBand::Poor => write!(f, "POOR"),
        }
    }
}

/// Per-section status counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub ok: usize,
    pub warn: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl SectionSummary {
    fn record(&mut self, status: Status) {
        match status {
            Status::Ok => self.ok += 1,
            Status::Warn => self.warn += 1,
            Status::Critical => self.critical += 1,
            Status::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.warn + self.critical + self.unknown
    }
}

/// Immutable bundle of all results of one cycle plus the composite score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureSnapshot {
    /// Monotonic cycle number assigned by the engine, 0 for ad-hoc aggregation
    pub sequence: u64,
    pub results: Vec<CheckResult>,
    pub score: u8,
    pub band: PostureBand,
    pub computed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PostureSnapshot {
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn result(&self, id: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.id == id)
    }

    /// Status counts for every section, in section order
    pub fn section_summary(&self) -> Vec<(Section, SectionSummary)> {
        Section::ALL
            .iter()
            .map(|section| {
                let mut summary = SectionSummary::default();
                self.results
                    .iter()
                    .filter(|r| r.section == *section)
                    .for_each(|r| summary.record(r.status));
                (*section, summary)
            })
            .filter(|(_, summary)| summary.total() > 0)
            .collect()
    }

    pub fn degraded(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.failure.is_some())
    }
}
