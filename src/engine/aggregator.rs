//! Normalization of raw outcomes and composite scoring

use chrono::Utc;
use std::collections::HashMap;

use super::executor::RawOutcome;
use crate::core::{CheckResult, Config, PostureBand, PostureSnapshot, Section, Status};

const DEFAULT_WEIGHT: f64 = 1.0;

/// Weight table used by the score. A probe id entry takes precedence over
/// the entry for the probe's section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreWeights {
    sections: HashMap<Section, f64>,
    probes: HashMap<String, f64>,
}

impl ScoreWeights {
    /// Every probe weighs 1.0
    pub fn equal() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            sections: config.weights.sections.clone(),
            probes: config.weights.probes.clone(),
        }
    }

    pub fn with_section_weight(mut self, section: Section, weight: f64) -> Self {
        self.sections.insert(section, weight);
        self
    }

    pub fn with_probe_weight<S: Into<String>>(mut self, probe_id: S, weight: f64) -> Self {
        self.probes.insert(probe_id.into(), weight);
        self
    }

    pub fn weight_for(&self, probe_id: &str, section: Section) -> f64 {
        self.probes
            .get(probe_id)
            .or_else(|| self.sections.get(&section))
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
    }
}

/// Fold a raw outcome into the uniform result vocabulary. Every failure
/// becomes a warn whose detail carries the diagnostic.
pub fn normalize(raw: RawOutcome) -> CheckResult {
    match raw.outcome {
        Ok(outcome) => CheckResult::new(
            raw.probe_id,
            raw.label,
            raw.section,
            outcome.status,
            outcome.detail,
        ),
        Err(error) => CheckResult::new(
            raw.probe_id,
            raw.label,
            raw.section,
            Status::Warn,
            error.to_string(),
        )
        .with_failure(error.kind()),
    }
}

/// Weighted mean of status values scaled to 0..=100
pub fn compute_score(results: &[CheckResult], weights: &ScoreWeights) -> u8 {
    let (weighted, total) = results.iter().fold((0.0, 0.0), |(weighted, total), result| {
        let weight = weights.weight_for(&result.id, result.section);
        (weighted + result.status.value() * weight, total + weight)
    });

    if total <= 0.0 {
        return 0;
    }
    (100.0 * weighted / total).round().clamp(0.0, 100.0) as u8
}

/// Build a snapshot from one cycle's outcomes. `raws` must already be in
/// registry order.
pub fn aggregate(raws: Vec<RawOutcome>, weights: &ScoreWeights) -> PostureSnapshot {
    let results: Vec<CheckResult> = raws.into_iter().map(normalize).collect();
    let score = compute_score(&results, weights);

    PostureSnapshot {
        sequence: 0,
        results,
        score,
        band: PostureBand::from_score(score),
        computed_at: Utc::now(),
        duration_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, ProbeError, ProbeOutcome};
    use crate::testing::TestUtils;
    use std::time::Duration;

    fn raw(id: &'static str, outcome: Result<ProbeOutcome, ProbeError>) -> RawOutcome {
        RawOutcome {
            probe_id: id,
            label: "Label",
            section: Section::Network,
            outcome,
            elapsed: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_all_ok_scores_100_and_all_critical_scores_0() {
        let weights = ScoreWeights::equal();
        let ok = TestUtils::results_with(&[Status::Ok; 14]);
        let critical = TestUtils::results_with(&[Status::Critical; 14]);

        assert_eq!(compute_score(&ok, &weights), 100);
        assert_eq!(compute_score(&critical, &weights), 0);
    }

    #[test]
    fn test_one_critical_among_fourteen() {
        let mut statuses = [Status::Ok; 14];
        statuses[4] = Status::Critical;
        let results = TestUtils::results_with(&statuses);
        let weights = ScoreWeights::equal();

        let expected = (100.0_f64 * 13.0 / 14.0).round() as u8;
        assert_eq!(expected, 93);
        for _ in 0..10 {
            assert_eq!(compute_score(&results, &weights), expected);
        }
    }

    #[test]
    fn test_warn_and_unknown_count_half() {
        let results = TestUtils::results_with(&[Status::Warn, Status::Unknown]);
        assert_eq!(compute_score(&results, &ScoreWeights::equal()), 50);
    }

    #[test]
    fn test_empty_or_weightless_scores_zero() {
        assert_eq!(compute_score(&[], &ScoreWeights::equal()), 0);

        let results = TestUtils::results_with(&[Status::Ok, Status::Ok]);
        let weights = ScoreWeights::equal()
            .with_section_weight(Section::Network, 0.0)
            .with_section_weight(Section::System, 0.0)
            .with_section_weight(Section::Privacy, 0.0);
        assert_eq!(compute_score(&results, &weights), 0);
    }

    #[test]
    fn test_probe_weight_overrides_section_weight() {
        let weights = ScoreWeights::equal()
            .with_section_weight(Section::Network, 2.0)
            .with_probe_weight("dns", 0.5);

        assert_eq!(weights.weight_for("dns", Section::Network), 0.5);
        assert_eq!(weights.weight_for("vpn", Section::Network), 2.0);
        assert_eq!(weights.weight_for("aslr", Section::System), 1.0);
    }

    #[test]
    fn test_weighted_score() {
        let mut results = TestUtils::results_with(&[Status::Ok, Status::Critical]);
        results[1].id = "heavy".to_string();
        let weights = ScoreWeights::equal().with_probe_weight("heavy", 3.0);

        // 100 * (1*1 + 0*3) / 4
        assert_eq!(compute_score(&results, &weights), 25);
    }

    #[test]
    fn test_normalize_failures_to_warn() {
        let timed_out = normalize(raw("tor", Err(ProbeError::Timeout { timeout_ms: 5000 })));
        assert_eq!(timed_out.status, Status::Warn);
        assert!(timed_out.staleness);
        assert_eq!(timed_out.failure, Some(FailureKind::Timeout));

        let missing = normalize(raw("open_ports", Err(ProbeError::tool_missing("ss"))));
        assert_eq!(missing.status, Status::Warn);
        assert!(!missing.staleness);
        assert_eq!(missing.detail, "tool unavailable: ss");

        let fine = normalize(raw("vpn", Ok(ProbeOutcome::critical("None"))));
        assert_eq!(fine.status, Status::Critical);
        assert_eq!(fine.failure, None);
    }

    #[test]
    fn test_aggregate_keeps_order_and_bands() {
        let snapshot = aggregate(
            vec![
                raw("vpn", Ok(ProbeOutcome::critical("None"))),
                raw("dns", Ok(ProbeOutcome::critical("ISP DNS"))),
                raw("tor", Ok(ProbeOutcome::warn("Installed"))),
            ],
            &ScoreWeights::equal(),
        );

        let ids: Vec<&str> = snapshot.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["vpn", "dns", "tor"]);
        assert_eq!(snapshot.score, 17);
        assert_eq!(snapshot.band, PostureBand::Poor);
    }
}
