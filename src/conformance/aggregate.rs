//! Per-fixture results and their deterministic roll-ups.

use std::collections::BTreeMap;

use serde::Serialize;

use super::fixture::Expectation;
use crate::model::Diagnostic;
use crate::overlap::CollisionAuditResult;
use crate::quality::{Dimension, QualityDimensions, QualityReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Matched,
    Mismatched,
    Skipped,
    TimedOut,
    Crashed,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Matched => "matched",
            ExecutionStatus::Mismatched => "mismatched",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::TimedOut => "timed_out",
            ExecutionStatus::Crashed => "crashed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureExecutionResult {
    pub id: String,
    pub path: String,
    pub category: String,
    pub expected: Expectation,
    /// `None` for fixtures that never ran
    pub observed: Option<Expectation>,
    pub status: ExecutionStatus,
    pub page_count: usize,
    pub parse_diagnostics: Vec<Diagnostic>,
    pub render_diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collision_audit: Option<CollisionAuditResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityReport>,
    pub failure_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Wall-clock time; kept out of reports so they stay reproducible
    #[serde(skip)]
    pub elapsed_ms: u64,
}

impl FixtureExecutionResult {
    pub fn observed_pass(&self) -> bool {
        self.observed == Some(Expectation::Pass)
    }

    pub fn expects_pass(&self) -> bool {
        self.expected == Expectation::Pass
    }

    pub fn is_active(&self) -> bool {
        self.status != ExecutionStatus::Skipped
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionTotals {
    pub total: usize,
    pub active: usize,
    pub skipped: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub timed_out: usize,
    pub crashed: usize,
    pub expected_pass: usize,
    pub expected_fail: usize,
    pub observed_pass: usize,
    pub observed_fail: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryRollup {
    pub total: usize,
    pub active: usize,
    pub skipped: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub timed_out: usize,
    pub mean_weighted_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityGroupSummary {
    pub scored_fixture_count: usize,
    pub mean_weighted_score: Option<f64>,
    pub dimension_means: Option<QualityDimensions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualitySummary {
    pub scored_fixture_count: usize,
    pub mean_weighted_score: Option<f64>,
    pub dimension_means: Option<QualityDimensions>,
    /// Same statistics restricted to fixtures expected to pass
    pub expected_pass: QualityGroupSummary,
    pub catastrophic_fixtures: Vec<String>,
    pub critical_collision_fixtures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub generated_at: String,
    pub totals: ExecutionTotals,
    pub fixtures: Vec<FixtureExecutionResult>,
    pub parse_code_histogram: BTreeMap<String, usize>,
    pub render_code_histogram: BTreeMap<String, usize>,
    pub severity_histogram: BTreeMap<String, usize>,
    pub category_rollups: BTreeMap<String, CategoryRollup>,
    pub quality_summary: QualitySummary,
}

impl ExecutionReport {
    /// Roll up fixture results, kept in the order given.
    pub fn from_results(generated_at: impl Into<String>, fixtures: Vec<FixtureExecutionResult>) -> Self {
        let mut totals = ExecutionTotals::default();
        let mut parse_code_histogram = BTreeMap::new();
        let mut render_code_histogram = BTreeMap::new();
        let mut severity_histogram = BTreeMap::new();
        let mut category_rollups: BTreeMap<String, CategoryRollup> = BTreeMap::new();

        for fixture in &fixtures {
            totals.total += 1;
            match fixture.expected {
                Expectation::Pass => totals.expected_pass += 1,
                Expectation::Fail => totals.expected_fail += 1,
            }
            match fixture.observed {
                Some(Expectation::Pass) => totals.observed_pass += 1,
                Some(Expectation::Fail) => totals.observed_fail += 1,
                None => {}
            }

            let rollup = category_rollups.entry(fixture.category.clone()).or_default();
            rollup.total += 1;
            if fixture.is_active() {
                totals.active += 1;
                rollup.active += 1;
            }
            match fixture.status {
                ExecutionStatus::Matched => {
                    totals.matched += 1;
                    rollup.matched += 1;
                }
                ExecutionStatus::Mismatched => {
                    totals.mismatched += 1;
                    rollup.mismatched += 1;
                }
                ExecutionStatus::Skipped => {
                    totals.skipped += 1;
                    rollup.skipped += 1;
                }
                ExecutionStatus::TimedOut => {
                    totals.timed_out += 1;
                    rollup.timed_out += 1;
                }
                ExecutionStatus::Crashed => totals.crashed += 1,
            }

            for d in &fixture.parse_diagnostics {
                *parse_code_histogram.entry(d.code.clone()).or_insert(0) += 1;
                *severity_histogram.entry(d.severity.as_str().to_string()).or_insert(0) += 1;
            }
            for d in &fixture.render_diagnostics {
                *render_code_histogram.entry(d.code.clone()).or_insert(0) += 1;
                *severity_histogram.entry(d.severity.as_str().to_string()).or_insert(0) += 1;
            }
        }

        for (category, rollup) in category_rollups.iter_mut() {
            rollup.mean_weighted_score = mean(
                fixtures
                    .iter()
                    .filter(|f| &f.category == category)
                    .filter_map(|f| f.quality.as_ref())
                    .map(|q| q.weighted_score),
            );
        }

        let quality_summary = summarize_quality(&fixtures);

        Self {
            generated_at: generated_at.into(),
            totals,
            fixtures,
            parse_code_histogram,
            render_code_histogram,
            severity_histogram,
            category_rollups,
            quality_summary,
        }
    }

    pub fn fixture(&self, id: &str) -> Option<&FixtureExecutionResult> {
        self.fixtures.iter().find(|f| f.id == id)
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn group_summary<'a>(reports: impl Iterator<Item = &'a QualityReport> + Clone) -> QualityGroupSummary {
    let scored_fixture_count = reports.clone().count();
    let mean_of = |dim: Dimension| mean(reports.clone().map(|r| r.dimensions.get(dim))).unwrap_or(0.0);
    let dimension_means = (scored_fixture_count > 0).then(|| QualityDimensions {
        rhythm_spacing: mean_of(Dimension::RhythmSpacing),
        collision: mean_of(Dimension::Collision),
        beam_stem_rest: mean_of(Dimension::BeamStemRest),
        spanner: mean_of(Dimension::Spanner),
        text: mean_of(Dimension::Text),
        layout: mean_of(Dimension::Layout),
        symbol_fidelity: mean_of(Dimension::SymbolFidelity),
    });
    QualityGroupSummary {
        scored_fixture_count,
        mean_weighted_score: mean(reports.map(|r| r.weighted_score)),
        dimension_means,
    }
}

fn summarize_quality(fixtures: &[FixtureExecutionResult]) -> QualitySummary {
    let all = group_summary(fixtures.iter().filter_map(|f| f.quality.as_ref()));
    let expected_pass = group_summary(
        fixtures
            .iter()
            .filter(|f| f.expects_pass())
            .filter_map(|f| f.quality.as_ref()),
    );
    let ids_where = |pred: fn(&QualityReport) -> bool| -> Vec<String> {
        fixtures
            .iter()
            .filter(|f| f.quality.as_ref().is_some_and(pred))
            .map(|f| f.id.clone())
            .collect()
    };

    QualitySummary {
        scored_fixture_count: all.scored_fixture_count,
        mean_weighted_score: all.mean_weighted_score,
        dimension_means: all.dimension_means,
        expected_pass,
        catastrophic_fixtures: ids_where(|q| q.catastrophic_readability),
        critical_collision_fixtures: ids_where(|q| q.effective_critical_collision_count > 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    fn result(id: &str, category: &str, expected: Expectation, status: ExecutionStatus) -> FixtureExecutionResult {
        let observed = match status {
            ExecutionStatus::Skipped => None,
            ExecutionStatus::Matched => Some(expected),
            _ => Some(match expected {
                Expectation::Pass => Expectation::Fail,
                Expectation::Fail => Expectation::Pass,
            }),
        };
        FixtureExecutionResult {
            id: id.into(),
            path: format!("{category}/{id}.svg"),
            category: category.into(),
            expected,
            observed,
            status,
            page_count: 1,
            parse_diagnostics: Vec::new(),
            render_diagnostics: Vec::new(),
            collision_audit: None,
            quality: None,
            failure_reasons: Vec::new(),
            warnings: Vec::new(),
            elapsed_ms: 0,
        }
    }

    #[test]
    fn totals_histograms_and_rollups() {
        let mut a = result("a", "basic", Expectation::Pass, ExecutionStatus::Matched);
        a.render_diagnostics.push(Diagnostic::new("RENDER_TIE_CLIPPED", Severity::Warning, "x"));
        a.quality = Some(QualityReport::worst_case("x"));
        let mut b = result("b", "basic", Expectation::Fail, ExecutionStatus::Mismatched);
        b.parse_diagnostics.push(Diagnostic::new("PARSE_BAD_PITCH", Severity::Error, "y"));
        b.render_diagnostics.push(Diagnostic::new("RENDER_TIE_CLIPPED", Severity::Warning, "z"));
        let c = result("c", "spanners", Expectation::Pass, ExecutionStatus::Skipped);

        let report = ExecutionReport::from_results("2026-01-01T00:00:00Z", vec![a, b, c]);
        assert_eq!(report.totals.total, 3);
        assert_eq!(report.totals.active, 2);
        assert_eq!(report.totals.skipped, 1);
        assert_eq!(report.totals.matched, 1);
        assert_eq!(report.totals.mismatched, 1);
        assert_eq!(report.totals.observed_pass, 2);
        assert_eq!(report.render_code_histogram["RENDER_TIE_CLIPPED"], 2);
        assert_eq!(report.parse_code_histogram["PARSE_BAD_PITCH"], 1);
        assert_eq!(report.severity_histogram["warning"], 2);
        assert_eq!(report.severity_histogram["error"], 1);
        assert_eq!(report.category_rollups["basic"].total, 2);
        assert_eq!(report.category_rollups["basic"].mean_weighted_score, Some(0.0));
        assert_eq!(report.category_rollups["spanners"].mean_weighted_score, None);
        assert_eq!(report.quality_summary.catastrophic_fixtures, vec!["a".to_string()]);
        assert_eq!(report.quality_summary.expected_pass.scored_fixture_count, 1);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(std::iter::empty()), None);
        assert_eq!(mean([1.0, 2.0].into_iter()), Some(1.5));
    }
}
