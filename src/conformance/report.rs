//! JSON and Markdown renderings of an [`ExecutionReport`].
//!
//! Both are pure functions of the report. Maps are ordered, fixtures keep
//! manifest order and wall-clock timings are not serialized, so two runs
//! over the same corpus differ only in `generated_at`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use super::aggregate::{ExecutionReport, FixtureExecutionResult};
use crate::error::{Error, Result};
use crate::quality::Dimension;

pub const JSON_REPORT_NAME: &str = "conformance-report.json";
pub const MARKDOWN_REPORT_NAME: &str = "conformance-report.md";

fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

impl ExecutionReport {
    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: JSON_REPORT_NAME.to_string(),
            source,
        })?;
        json.push('\n');
        Ok(json)
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let t = &self.totals;

        // Writing to a String cannot fail.
        let _ = writeln!(md, "# Conformance report\n");
        let _ = writeln!(md, "Generated at {}\n", self.generated_at);

        let _ = writeln!(md, "## Totals\n");
        let _ = writeln!(md, "| total | active | skipped | matched | mismatched | timed out | crashed |");
        let _ = writeln!(md, "|---|---|---|---|---|---|---|");
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            t.total, t.active, t.skipped, t.matched, t.mismatched, t.timed_out, t.crashed
        );

        let q = &self.quality_summary;
        let _ = writeln!(md, "## Quality\n");
        let _ = writeln!(md, "| scope | scored | mean | {} |", dimension_header());
        let _ = writeln!(md, "|---|---|---|{}", "---|".repeat(Dimension::ALL.len()));
        let _ = writeln!(
            md,
            "| all | {} | {} | {} |",
            q.scored_fixture_count,
            score(q.mean_weighted_score),
            dimension_cells(q.dimension_means.as_ref())
        );
        let _ = writeln!(
            md,
            "| expected pass | {} | {} | {} |\n",
            q.expected_pass.scored_fixture_count,
            score(q.expected_pass.mean_weighted_score),
            dimension_cells(q.expected_pass.dimension_means.as_ref())
        );
        if !q.catastrophic_fixtures.is_empty() {
            let _ = writeln!(md, "Catastrophic: {}\n", q.catastrophic_fixtures.join(", "));
        }
        if !q.critical_collision_fixtures.is_empty() {
            let _ = writeln!(md, "Critical collisions: {}\n", q.critical_collision_fixtures.join(", "));
        }

        let _ = writeln!(md, "## Categories\n");
        let _ = writeln!(md, "| category | total | active | matched | mismatched | timed out | mean |");
        let _ = writeln!(md, "|---|---|---|---|---|---|---|");
        for (name, c) in &self.category_rollups {
            let _ = writeln!(
                md,
                "| {name} | {} | {} | {} | {} | {} | {} |",
                c.total,
                c.active,
                c.matched,
                c.mismatched,
                c.timed_out,
                score(c.mean_weighted_score)
            );
        }
        md.push('\n');

        let _ = writeln!(md, "## Fixtures\n");
        let _ = writeln!(md, "| id | expected | observed | status | score | notes |");
        let _ = writeln!(md, "|---|---|---|---|---|---|");
        for f in &self.fixtures {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} | {} |",
                f.id,
                f.expected.as_str(),
                f.observed.map_or("-", |o| o.as_str()),
                f.status.as_str(),
                score(f.quality.as_ref().map(|q| q.weighted_score)),
                fixture_notes(f)
            );
        }

        if !self.parse_code_histogram.is_empty() || !self.render_code_histogram.is_empty() {
            let _ = writeln!(md, "\n## Diagnostic codes\n");
            let _ = writeln!(md, "| stage | code | count |");
            let _ = writeln!(md, "|---|---|---|");
            for (code, n) in &self.parse_code_histogram {
                let _ = writeln!(md, "| parse | {code} | {n} |");
            }
            for (code, n) in &self.render_code_histogram {
                let _ = writeln!(md, "| render | {code} | {n} |");
            }
        }
        md
    }

    /// Write both renderings into `dir`, creating it if needed.
    pub fn write_reports(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let json_path = dir.join(JSON_REPORT_NAME);
        let md_path = dir.join(MARKDOWN_REPORT_NAME);
        std::fs::write(&json_path, self.to_json()?).map_err(|e| Error::io(&json_path, e))?;
        std::fs::write(&md_path, self.to_markdown()).map_err(|e| Error::io(&md_path, e))?;
        info!(json = %json_path.display(), markdown = %md_path.display(), "wrote conformance reports");
        Ok((json_path, md_path))
    }
}

fn dimension_header() -> String {
    Dimension::ALL.iter().map(|d| d.code()).collect::<Vec<_>>().join(" | ")
}

fn dimension_cells(dims: Option<&crate::quality::QualityDimensions>) -> String {
    Dimension::ALL
        .iter()
        .map(|d| score(dims.map(|v| v.get(*d))))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn fixture_notes(f: &FixtureExecutionResult) -> String {
    let mut notes: Vec<String> = f.failure_reasons.clone();
    if let Some(q) = &f.quality {
        if q.catastrophic_readability {
            notes.push("catastrophic".to_string());
        }
        if q.effective_critical_collision_count > 0 {
            notes.push(format!("{} critical collision(s)", q.effective_critical_collision_count));
        }
    }
    notes.join("; ").replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::aggregate::{ExecutionStatus, FixtureExecutionResult};
    use crate::conformance::fixture::Expectation;
    use crate::quality::QualityReport;

    fn sample() -> ExecutionReport {
        let fixture = FixtureExecutionResult {
            id: "broken".into(),
            path: "basic/broken.svg".into(),
            category: "basic".into(),
            expected: Expectation::Pass,
            observed: Some(Expectation::Fail),
            status: ExecutionStatus::Mismatched,
            page_count: 0,
            parse_diagnostics: Vec::new(),
            render_diagnostics: Vec::new(),
            collision_audit: None,
            quality: Some(QualityReport::worst_case("no pages")),
            failure_reasons: vec!["renderer produced no pages".into()],
            warnings: Vec::new(),
            elapsed_ms: 1234,
        };
        ExecutionReport::from_results("2026-01-01T00:00:00Z", vec![fixture])
    }

    #[test]
    fn json_is_stable_and_omits_timing() {
        let report = sample();
        let json = report.to_json().unwrap();
        assert!(json.ends_with("}\n"));
        assert!(!json.contains("elapsed_ms"));
        let mut again = sample();
        again.fixtures[0].elapsed_ms = 99;
        assert_eq!(json, again.to_json().unwrap());
    }

    #[test]
    fn markdown_lists_fixtures_and_categories() {
        let md = sample().to_markdown();
        assert!(md.starts_with("# Conformance report"));
        assert!(md.contains("| broken | pass | fail | mismatched | 0.00 | renderer produced no pages; catastrophic |"));
        assert!(md.contains("| basic | 1 | 1 | 0 | 1 | 0 | 0.00 |"));
    }
}
