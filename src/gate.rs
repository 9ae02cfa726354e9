//! Split/gate evaluation over a finished [`ExecutionReport`].
//!
//! A split is a named subset of the active fixtures with its own
//! thresholds. A run passes only when every split passes; every violated
//! threshold is listed rather than stopping at the first.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::conformance::aggregate::mean;
use crate::conformance::{Expectation, ExecutionReport, FixtureExecutionResult};
use crate::error::{Error, Result};

/// Below this a dimension lands its fixture in a fail-fast bucket.
const BUCKET_THRESHOLD: f64 = 3.0;

// ─── Configuration ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationFilter {
    Pass,
    Fail,
    #[default]
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSelection {
    pub expectation: ExpectationFilter,
    pub fixture_ids: Option<Vec<String>>,
    /// `"*"` matches every category
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitThresholds {
    pub expected_pass_rate_min: Option<f64>,
    pub weighted_mean_min: Option<f64>,
    pub max_catastrophic_expected_pass: Option<usize>,
    pub max_critical_collisions_expected_pass: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default)]
    pub selection: SplitSelection,
    #[serde(default)]
    pub thresholds: SplitThresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub splits: BTreeMap<String, SplitConfig>,
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| Error::Json {
            path: origin.to_string(),
            source,
        })
    }
}

impl SplitSelection {
    pub fn includes(&self, fixture: &FixtureExecutionResult) -> bool {
        let expectation_ok = match self.expectation {
            ExpectationFilter::All => true,
            ExpectationFilter::Pass => fixture.expected == Expectation::Pass,
            ExpectationFilter::Fail => fixture.expected == Expectation::Fail,
        };
        let id_ok = self
            .fixture_ids
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| *id == fixture.id));
        let category_ok = self
            .categories
            .as_ref()
            .map_or(true, |cats| cats.iter().any(|c| c == "*" || *c == fixture.category));
        expectation_ok && id_ok && category_ok
    }
}

// ─── Outcome ────────────────────────────────────────────────────────

/// Fixture ids per failure class, for triage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailFastBuckets {
    pub layout_overflow: Vec<String>,
    pub symbol_collision: Vec<String>,
    pub text_legibility: Vec<String>,
    pub spanner_quality: Vec<String>,
    pub symbol_fidelity: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitOutcome {
    pub name: String,
    pub passed: bool,
    pub fixture_count: usize,
    pub expected_pass_count: usize,
    pub observed_pass_among_expected: usize,
    pub expected_pass_rate: f64,
    pub weighted_mean: Option<f64>,
    pub catastrophic_expected_pass: usize,
    pub critical_collisions_expected_pass: usize,
    pub violations: Vec<String>,
    pub buckets: FailFastBuckets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateOutcome {
    pub passed: bool,
    pub splits: Vec<SplitOutcome>,
}

impl GateOutcome {
    pub fn violations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.splits
            .iter()
            .flat_map(|s| s.violations.iter().map(move |v| (s.name.as_str(), v.as_str())))
    }
}

// ─── Evaluation ─────────────────────────────────────────────────────

pub fn evaluate_gates(report: &ExecutionReport, config: &GateConfig) -> GateOutcome {
    let splits: Vec<SplitOutcome> = config
        .splits
        .iter()
        .map(|(name, split)| evaluate_split(name, split, report))
        .collect();
    let passed = splits.iter().all(|s| s.passed);

    for split in &splits {
        for violation in &split.violations {
            warn!(split = %split.name, %violation, "gate violated");
        }
    }
    info!(splits = splits.len(), passed, "gates evaluated");
    GateOutcome { passed, splits }
}

fn evaluate_split(name: &str, split: &SplitConfig, report: &ExecutionReport) -> SplitOutcome {
    let subset: Vec<&FixtureExecutionResult> = report
        .fixtures
        .iter()
        .filter(|f| f.is_active() && split.selection.includes(f))
        .collect();
    let expected_pass: Vec<&FixtureExecutionResult> =
        subset.iter().copied().filter(|f| f.expects_pass()).collect();

    let observed_pass_among_expected = expected_pass.iter().filter(|f| f.observed_pass()).count();
    let expected_pass_rate = if expected_pass.is_empty() {
        1.0
    } else {
        observed_pass_among_expected as f64 / expected_pass.len() as f64
    };
    let weighted_mean = mean(
        expected_pass
            .iter()
            .filter_map(|f| f.quality.as_ref())
            .map(|q| q.weighted_score),
    );
    let catastrophic_expected_pass = expected_pass
        .iter()
        .filter(|f| f.quality.as_ref().is_some_and(|q| q.catastrophic_readability))
        .count();
    let critical_collisions_expected_pass = expected_pass
        .iter()
        .filter_map(|f| f.quality.as_ref())
        .map(|q| q.effective_critical_collision_count)
        .sum();

    let t = &split.thresholds;
    let mut violations = Vec::new();
    if let Some(min) = t.expected_pass_rate_min {
        if expected_pass_rate < min {
            violations.push(format!("expected-pass rate {expected_pass_rate:.3} below {min:.3}"));
        }
    }
    if let Some(min) = t.weighted_mean_min {
        match weighted_mean {
            Some(mean) if mean < min => {
                violations.push(format!("weighted mean {mean:.3} below {min:.3}"));
            }
            None if !expected_pass.is_empty() => {
                violations.push(format!("no scored expected-pass fixtures for weighted mean {min:.3}"));
            }
            _ => {}
        }
    }
    if let Some(max) = t.max_catastrophic_expected_pass {
        if catastrophic_expected_pass > max {
            violations.push(format!(
                "{catastrophic_expected_pass} catastrophic expected-pass fixture(s), at most {max} allowed"
            ));
        }
    }
    if let Some(max) = t.max_critical_collisions_expected_pass {
        if critical_collisions_expected_pass > max {
            violations.push(format!(
                "{critical_collisions_expected_pass} critical collision(s) in expected-pass fixtures, at most {max} allowed"
            ));
        }
    }

    SplitOutcome {
        name: name.to_string(),
        passed: violations.is_empty(),
        fixture_count: subset.len(),
        expected_pass_count: expected_pass.len(),
        observed_pass_among_expected,
        expected_pass_rate,
        weighted_mean,
        catastrophic_expected_pass,
        critical_collisions_expected_pass,
        violations,
        buckets: bucket(&subset),
    }
}

fn bucket(fixtures: &[&FixtureExecutionResult]) -> FailFastBuckets {
    let mut buckets = FailFastBuckets::default();
    for fixture in fixtures {
        let Some(q) = &fixture.quality else {
            continue;
        };
        let id = || fixture.id.clone();
        let dims = &q.dimensions;
        if q.metrics.overflow_count > 0 || dims.layout < BUCKET_THRESHOLD {
            buckets.layout_overflow.push(id());
        }
        if q.metrics.critical_overlap_count > 0 || q.effective_critical_collision_count > 0 {
            buckets.symbol_collision.push(id());
        }
        if dims.text < BUCKET_THRESHOLD {
            buckets.text_legibility.push(id());
        }
        if dims.spanner < BUCKET_THRESHOLD {
            buckets.spanner_quality.push(id());
        }
        if dims.symbol_fidelity < BUCKET_THRESHOLD {
            buckets.symbol_fidelity.push(id());
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::ExecutionStatus;
    use crate::quality::{QualityMetrics, QualityReport, QualityScorer, WaiverSet};

    fn fixture(id: &str, category: &str, expected: Expectation, observed: Expectation, quality: QualityReport) -> FixtureExecutionResult {
        FixtureExecutionResult {
            id: id.into(),
            path: format!("{category}/{id}.svg"),
            category: category.into(),
            expected,
            observed: Some(observed),
            status: if expected == observed {
                ExecutionStatus::Matched
            } else {
                ExecutionStatus::Mismatched
            },
            page_count: 1,
            parse_diagnostics: Vec::new(),
            render_diagnostics: Vec::new(),
            collision_audit: None,
            quality: Some(quality),
            failure_reasons: Vec::new(),
            warnings: Vec::new(),
            elapsed_ms: 0,
        }
    }

    fn healthy() -> QualityReport {
        let metrics = QualityMetrics {
            page_count: 1,
            notehead_count: 4,
            stem_count: 4,
            stave_count: 1,
            min_notehead_gap: Some(20.0),
            ..QualityMetrics::default()
        };
        QualityScorer::default().score(&metrics, &[], &WaiverSet::default(), None)
    }

    fn report() -> ExecutionReport {
        ExecutionReport::from_results(
            "2026-01-01T00:00:00Z",
            vec![
                fixture("a", "basic", Expectation::Pass, Expectation::Pass, healthy()),
                fixture("b", "basic", Expectation::Pass, Expectation::Fail, QualityReport::worst_case("x")),
                fixture("c", "spanners", Expectation::Fail, Expectation::Fail, QualityReport::worst_case("y")),
            ],
        )
    }

    #[test]
    fn lists_every_violated_threshold() {
        let config = GateConfig::from_json(
            r#"{"splits": {"core": {
                "selection": {"expectation": "all", "categories": ["basic"]},
                "thresholds": {
                    "expected_pass_rate_min": 0.9,
                    "weighted_mean_min": 4.0,
                    "max_catastrophic_expected_pass": 0
                }
            }}}"#,
            "gates.json",
        )
        .unwrap();
        let outcome = evaluate_gates(&report(), &config);
        assert!(!outcome.passed);
        let core = &outcome.splits[0];
        assert_eq!(core.fixture_count, 2);
        assert_eq!(core.expected_pass_rate, 0.5);
        assert_eq!(core.catastrophic_expected_pass, 1);
        assert_eq!(core.violations.len(), 3);
        assert_eq!(outcome.violations().count(), 3);
        assert_eq!(core.buckets.layout_overflow, vec!["b".to_string()]);
        assert_eq!(core.buckets.symbol_fidelity, vec!["b".to_string()]);
    }

    #[test]
    fn empty_expected_pass_subset_passes_rate_and_mean() {
        let config = GateConfig::from_json(
            r#"{"splits": {"negatives": {
                "selection": {"expectation": "fail", "categories": ["*"]},
                "thresholds": {"expected_pass_rate_min": 1.0, "weighted_mean_min": 4.5}
            }}}"#,
            "gates.json",
        )
        .unwrap();
        let outcome = evaluate_gates(&report(), &config);
        assert!(outcome.passed);
        let split = &outcome.splits[0];
        assert_eq!(split.fixture_count, 1);
        assert_eq!(split.expected_pass_rate, 1.0);
        assert_eq!(split.weighted_mean, None);
    }

    #[test]
    fn fixture_id_selection() {
        let config = GateConfig::from_json(
            r#"{"splits": {"smoke": {
                "selection": {"fixture_ids": ["a"]},
                "thresholds": {"expected_pass_rate_min": 1.0, "max_critical_collisions_expected_pass": 0}
            }}}"#,
            "gates.json",
        )
        .unwrap();
        let outcome = evaluate_gates(&report(), &config);
        assert!(outcome.passed, "{:?}", outcome.splits[0].violations);
        assert_eq!(outcome.splits[0].fixture_count, 1);
    }

    #[test]
    fn no_splits_pass_trivially() {
        let outcome = evaluate_gates(&report(), &GateConfig::default());
        assert!(outcome.passed);
        assert!(outcome.splits.is_empty());
    }
}
