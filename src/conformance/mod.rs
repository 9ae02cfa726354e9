//! Conformance pipeline: render every fixture of a corpus, analyze and
//! score its pages, classify the outcome against the declared expectation,
//! and roll everything up into an [`ExecutionReport`].
//!
//! The renderer is a collaborator behind [`ScoreRenderer`]. Nothing that
//! goes wrong inside one fixture escapes it: unreadable sources, unparsable
//! pages and panics all become a failing result with a worst-case quality
//! report.

pub mod aggregate;
pub mod corpus;
pub mod fixture;
pub mod pool;
pub mod report;

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::geometry::SvgDocument;
use crate::model::{Diagnostic, Overlap, Severity, SourceLocation};
use crate::notation::NotationGeometrySnapshot;
use crate::overlap::CollisionAuditConfig;
use crate::quality::{compute_metrics, QualityMetrics, QualityReport, QualityScorer};

pub use aggregate::{
    CategoryRollup, ExecutionReport, ExecutionStatus, ExecutionTotals, FixtureExecutionResult, QualityGroupSummary,
    QualitySummary,
};
pub use corpus::Corpus;
pub use fixture::{Expectation, FixtureDeclaration, FixtureManifest, FixtureStatus, ParseMode};
pub use pool::{WorkOutcome, WorkerPool};
pub use report::{JSON_REPORT_NAME, MARKDOWN_REPORT_NAME};

// ═══════════════════════════════════════════════════════════════════════
// Renderer seam
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub fixture_id: &'a str,
    pub path: &'a str,
    pub source: &'a str,
    pub parse_mode: ParseMode,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOutput {
    pub parse_diagnostics: Vec<Diagnostic>,
    pub render_diagnostics: Vec<Diagnostic>,
    /// One SVG document per page
    pub pages: Vec<String>,
}

/// Turns a fixture source into SVG pages plus diagnostics.
pub trait ScoreRenderer: Sync {
    fn render(&self, request: &RenderRequest<'_>) -> RenderOutput;
}

/// Treats each fixture source as an already-rendered single SVG page.
///
/// Malformed markup is a `PARSE_MALFORMED_MARKUP` error in strict mode and a
/// warning in lenient mode, where the page is still handed on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrerenderedMarkup;

pub const MALFORMED_MARKUP: &str = "PARSE_MALFORMED_MARKUP";
pub const EMPTY_OUTPUT: &str = "RENDER_EMPTY_OUTPUT";

impl ScoreRenderer for PrerenderedMarkup {
    fn render(&self, request: &RenderRequest<'_>) -> RenderOutput {
        let mut output = RenderOutput::default();
        if request.source.trim().is_empty() {
            output.render_diagnostics.push(Diagnostic::new(
                EMPTY_OUTPUT,
                Severity::Error,
                format!("{} is empty", request.path),
            ));
            return output;
        }

        if let Err(err) = roxmltree::Document::parse(request.source) {
            let pos = err.pos();
            let severity = match request.parse_mode {
                ParseMode::Strict => Severity::Error,
                ParseMode::Lenient => Severity::Warning,
            };
            output.parse_diagnostics.push(Diagnostic {
                location: Some(SourceLocation {
                    line: pos.row,
                    column: pos.col,
                }),
                path: Some(request.path.to_string()),
                ..Diagnostic::new(MALFORMED_MARKUP, severity, err.to_string())
            });
            if request.parse_mode == ParseMode::Strict {
                return output;
            }
        }

        output.pages.push(request.source.to_string());
        output
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Page analysis
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct PageAnalysis {
    pub metrics: QualityMetrics,
    /// Overlaps found by the fixture's collision audit, if it declared one
    pub audit_overlaps: Vec<Overlap>,
}

/// Parse one page once and derive its metrics and audit overlaps.
pub fn analyze_page(
    markup: &str,
    config: &EvaluationConfig,
    audit: Option<&CollisionAuditConfig>,
) -> Result<PageAnalysis> {
    let doc = SvgDocument::parse(markup)?;
    let snapshot = NotationGeometrySnapshot::from_document(&doc, &config.roles)?;
    let metrics = compute_metrics(&snapshot, config);
    let audit_overlaps = match audit {
        Some(audit) => audit.audit_page(&doc)?,
        None => Vec::new(),
    };
    Ok(PageAnalysis {
        metrics,
        audit_overlaps,
    })
}

/// Analyze the pages of one multi-page document, one page per work item.
pub fn sweep_pages(
    pages: &[String],
    config: &EvaluationConfig,
    pool: &WorkerPool,
) -> Vec<WorkOutcome<Result<QualityMetrics>>> {
    pool.run_ordered(pages.iter().collect(), |page| {
        analyze_page(page, config, None).map(|analysis| analysis.metrics)
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub item_budget: Option<Duration>,
    pub deadline: Option<Duration>,
    /// Stamped into the report verbatim
    pub generated_at: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: WorkerPool::default().workers,
            item_budget: None,
            deadline: None,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

pub struct ConformanceRunner<'a, R: ScoreRenderer + ?Sized> {
    config: &'a EvaluationConfig,
    renderer: &'a R,
    scorer: QualityScorer,
}

impl<'a, R: ScoreRenderer + ?Sized> ConformanceRunner<'a, R> {
    pub fn new(config: &'a EvaluationConfig, renderer: &'a R) -> Self {
        Self {
            config,
            renderer,
            scorer: QualityScorer::new(config.quality.clone()),
        }
    }

    pub fn run(&self, corpus: &Corpus, options: &RunOptions) -> ExecutionReport {
        let declarations = &corpus.manifest().fixtures;
        let active: Vec<&FixtureDeclaration> = declarations.iter().filter(|d| d.is_active()).collect();
        info!(
            corpus = corpus.origin(),
            fixtures = declarations.len(),
            active = active.len(),
            workers = options.workers,
            "starting conformance run"
        );

        let pool = WorkerPool::new(options.workers)
            .with_item_budget(options.item_budget)
            .with_deadline(options.deadline);
        let mut outcomes = pool
            .run_ordered(active, |decl| self.run_fixture(corpus, decl))
            .into_iter();

        let mut results = Vec::with_capacity(declarations.len());
        for decl in declarations {
            if !decl.is_active() {
                results.push(skeleton(decl, ExecutionStatus::Skipped, None));
                continue;
            }
            let result = match outcomes.next() {
                Some(WorkOutcome::Completed {
                    value,
                    elapsed,
                    over_budget,
                }) => {
                    let mut result = value;
                    result.elapsed_ms = elapsed.as_millis() as u64;
                    if over_budget {
                        result.status = ExecutionStatus::TimedOut;
                        result.failure_reasons.push(format!(
                            "exceeded item budget of {} ms",
                            options.item_budget.map_or(0, |b| b.as_millis())
                        ));
                    }
                    result
                }
                Some(WorkOutcome::Panicked { message }) => {
                    let mut result = skeleton(decl, ExecutionStatus::Crashed, Some(Expectation::Fail));
                    let (waivers, _) = decl.parsed_waivers();
                    result.quality = Some(self.scorer.worst_case(format!("panicked: {message}"), &waivers));
                    result.failure_reasons.push(format!("panicked: {message}"));
                    result
                }
                Some(WorkOutcome::Skipped) | None => {
                    let mut result = skeleton(decl, ExecutionStatus::TimedOut, None);
                    result.failure_reasons.push("deadline passed before start".to_string());
                    result
                }
            };
            results.push(result);
        }

        let report = ExecutionReport::from_results(options.generated_at.clone(), results);
        let t = &report.totals;
        info!(
            total = t.total,
            matched = t.matched,
            mismatched = t.mismatched,
            skipped = t.skipped,
            timed_out = t.timed_out,
            crashed = t.crashed,
            "conformance run finished"
        );
        report
    }

    fn run_fixture(&self, corpus: &Corpus, decl: &FixtureDeclaration) -> FixtureExecutionResult {
        let mut result = skeleton(decl, ExecutionStatus::Matched, None);
        let (waivers, unknown) = decl.parsed_waivers();
        for name in unknown {
            warn!(fixture = %decl.id, waiver = %name, "unknown waiver ignored");
            result.warnings.push(format!("unknown waiver '{name}' ignored"));
        }

        let source = match corpus.read_source(&decl.path) {
            Ok(source) => source,
            Err(err) => {
                warn!(fixture = %decl.id, error = %err, "fixture source unavailable");
                let reason = format!("source unavailable: {err}");
                result.quality = Some(self.scorer.worst_case(reason.clone(), &waivers));
                result.failure_reasons.push(reason);
                return classify(result);
            }
        };

        let output = self.renderer.render(&RenderRequest {
            fixture_id: &decl.id,
            path: &decl.path,
            source: &source,
            parse_mode: decl.parse_mode.unwrap_or_default(),
        });
        result.parse_diagnostics = output.parse_diagnostics;
        result.render_diagnostics = output.render_diagnostics;

        let pages: Vec<&String> = output.pages.iter().filter(|p| !p.trim().is_empty()).collect();
        result.page_count = pages.len();

        let audit = decl.collision_audit.as_ref();
        let mut metrics: Option<QualityMetrics> = None;
        let mut audit_overlaps = Vec::new();
        let mut analysis_failure = None;
        for (index, page) in pages.iter().enumerate() {
            match analyze_page(page, self.config, audit) {
                Ok(analysis) => {
                    debug!(fixture = %decl.id, page = index + 1, "analyzed page");
                    metrics = Some(match metrics {
                        Some(acc) => acc.merge(&analysis.metrics),
                        None => analysis.metrics,
                    });
                    audit_overlaps.extend(analysis.audit_overlaps);
                }
                Err(err) => {
                    warn!(fixture = %decl.id, page = index + 1, error = %err, "page analysis failed");
                    analysis_failure = Some(format!("page {} could not be analyzed: {err}", index + 1));
                    break;
                }
            }
        }

        result.collision_audit = audit.map(|a| a.finish(audit_overlaps));
        let diagnostics: Vec<Diagnostic> = result
            .parse_diagnostics
            .iter()
            .chain(&result.render_diagnostics)
            .cloned()
            .collect();

        let quality: QualityReport = match (&analysis_failure, metrics) {
            (Some(reason), _) => self.scorer.worst_case(reason.clone(), &waivers),
            (None, None) => self.scorer.worst_case("renderer produced no pages", &waivers),
            (None, Some(metrics)) => self.scorer.score(&metrics, &diagnostics, &waivers, result.collision_audit.as_ref()),
        };

        let errors = diagnostics.iter().filter(|d| d.is_error()).count();
        if errors > 0 {
            result.failure_reasons.push(format!("{errors} error diagnostic(s)"));
        }
        if pages.is_empty() {
            result.failure_reasons.push("renderer produced no pages".to_string());
        }
        if let Some(reason) = analysis_failure {
            result.failure_reasons.push(reason);
        }
        if let Some(audit) = result.collision_audit.as_ref().filter(|a| !a.passed) {
            if !quality.waived_critical_collision {
                result.failure_reasons.push(format!(
                    "collision audit on '{}': {} overlap(s), at most {} allowed",
                    audit.selector, audit.overlap_count, audit.max_overlaps
                ));
            }
        }
        result.quality = Some(quality);
        classify(result)
    }
}

fn skeleton(decl: &FixtureDeclaration, status: ExecutionStatus, observed: Option<Expectation>) -> FixtureExecutionResult {
    FixtureExecutionResult {
        id: decl.id.clone(),
        path: decl.path.clone(),
        category: decl.category(),
        expected: decl.expected,
        observed,
        status,
        page_count: 0,
        parse_diagnostics: Vec::new(),
        render_diagnostics: Vec::new(),
        collision_audit: None,
        quality: None,
        failure_reasons: Vec::new(),
        warnings: Vec::new(),
        elapsed_ms: 0,
    }
}

/// Observed outcome from the failure reasons, status from the expectation.
fn classify(mut result: FixtureExecutionResult) -> FixtureExecutionResult {
    let observed = if result.failure_reasons.is_empty() {
        Expectation::Pass
    } else {
        Expectation::Fail
    };
    result.observed = Some(observed);
    result.status = if observed == result.expected {
        ExecutionStatus::Matched
    } else {
        ExecutionStatus::Mismatched
    };
    result
}
