//! Quality scoring: the seven-dimension rubric, the weighted score, and the
//! catastrophic-readability and critical-collision gates with their waivers.
//!
//! Scoring is a pure function of the metrics, the diagnostics, the declared
//! waivers and the collision audit. Weights and the critical-dimension set
//! come from an explicit [`QualityConfig`] handed to [`QualityScorer::new`].

pub mod diagnostics;
pub mod dimensions;
pub mod metrics;
pub mod waiver;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::Diagnostic;
use crate::overlap::CollisionAuditResult;
use diagnostics::DiagnosticCounts;
use dimensions::clamp_score;

pub use diagnostics::{categorize, DiagnosticCategory};
pub use metrics::{compute_metrics, CollisionScanOptions, QualityMetrics};
pub use waiver::{Waiver, WaiverSet};

// ─── Dimensions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "Q1")]
    RhythmSpacing,
    #[serde(rename = "Q2")]
    Collision,
    #[serde(rename = "Q3")]
    BeamStemRest,
    #[serde(rename = "Q4")]
    Spanner,
    #[serde(rename = "Q5")]
    Text,
    #[serde(rename = "Q6")]
    Layout,
    #[serde(rename = "Q7")]
    SymbolFidelity,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::RhythmSpacing,
        Dimension::Collision,
        Dimension::BeamStemRest,
        Dimension::Spanner,
        Dimension::Text,
        Dimension::Layout,
        Dimension::SymbolFidelity,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Dimension::RhythmSpacing => "Q1",
            Dimension::Collision => "Q2",
            Dimension::BeamStemRest => "Q3",
            Dimension::Spanner => "Q4",
            Dimension::Text => "Q5",
            Dimension::Layout => "Q6",
            Dimension::SymbolFidelity => "Q7",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::RhythmSpacing => "rhythm/spacing",
            Dimension::Collision => "collision",
            Dimension::BeamStemRest => "beam/stem/rest",
            Dimension::Spanner => "spanner",
            Dimension::Text => "text",
            Dimension::Layout => "layout",
            Dimension::SymbolFidelity => "symbol fidelity",
        }
    }
}

/// One value per dimension, serialized as a map keyed `Q1`..`Q7`. Used
/// for both scores and weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityDimensions {
    #[serde(rename = "Q1")]
    pub rhythm_spacing: f64,
    #[serde(rename = "Q2")]
    pub collision: f64,
    #[serde(rename = "Q3")]
    pub beam_stem_rest: f64,
    #[serde(rename = "Q4")]
    pub spanner: f64,
    #[serde(rename = "Q5")]
    pub text: f64,
    #[serde(rename = "Q6")]
    pub layout: f64,
    #[serde(rename = "Q7")]
    pub symbol_fidelity: f64,
}

impl QualityDimensions {
    pub fn uniform(value: f64) -> Self {
        Self {
            rhythm_spacing: value,
            collision: value,
            beam_stem_rest: value,
            spanner: value,
            text: value,
            layout: value,
            symbol_fidelity: value,
        }
    }

    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::RhythmSpacing => self.rhythm_spacing,
            Dimension::Collision => self.collision,
            Dimension::BeamStemRest => self.beam_stem_rest,
            Dimension::Spanner => self.spanner,
            Dimension::Text => self.text,
            Dimension::Layout => self.layout,
            Dimension::SymbolFidelity => self.symbol_fidelity,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

// ─── Configuration ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub weights: QualityDimensions,
    /// Dimensions whose collapse makes a rendering unreadable
    pub critical_dimensions: Vec<Dimension>,
    /// A critical dimension strictly below this is catastrophic
    pub catastrophic_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityDimensions {
                rhythm_spacing: 0.20,
                collision: 0.20,
                beam_stem_rest: 0.15,
                spanner: 0.15,
                text: 0.10,
                layout: 0.10,
                symbol_fidelity: 0.10,
            },
            critical_dimensions: vec![Dimension::RhythmSpacing, Dimension::Collision, Dimension::Layout],
            catastrophic_threshold: 2.0,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub weighted_score: f64,
    pub dimensions: QualityDimensions,
    pub metrics: QualityMetrics,
    pub critical_dimensions_below_two: Vec<Dimension>,
    pub catastrophic_readability: bool,
    /// Raw audit overlap count when the audit failed, else 0; never waived
    pub critical_collision_count: usize,
    pub effective_critical_collision_count: usize,
    pub waived_critical_collision: bool,
    pub waived_catastrophic_readability: bool,
    pub notes: Vec<String>,
}

impl QualityReport {
    /// Report for a fixture whose pages could not be analyzed at all.
    pub fn worst_case(reason: impl Into<String>) -> Self {
        QualityScorer::default().worst_case(reason, &WaiverSet::default())
    }
}

// ─── Scorer ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn score(
        &self,
        metrics: &QualityMetrics,
        diagnostics: &[Diagnostic],
        waivers: &WaiverSet,
        audit: Option<&CollisionAuditResult>,
    ) -> QualityReport {
        let counts = DiagnosticCounts::tally(diagnostics);
        let dims = QualityDimensions {
            rhythm_spacing: dimensions::rhythm_spacing(metrics),
            collision: dimensions::collision(metrics, &counts),
            beam_stem_rest: dimensions::beam_stem_rest(metrics, &counts),
            spanner: dimensions::spanner(metrics, &counts),
            text: dimensions::text(metrics, &counts),
            layout: dimensions::layout(metrics, &counts),
            symbol_fidelity: dimensions::symbol_fidelity(metrics, &counts),
        };

        let mut report = QualityReport {
            weighted_score: self.weighted_score(&dims),
            dimensions: dims,
            metrics: metrics.clone(),
            critical_dimensions_below_two: Vec::new(),
            catastrophic_readability: false,
            critical_collision_count: 0,
            effective_critical_collision_count: 0,
            waived_critical_collision: false,
            waived_catastrophic_readability: false,
            notes: Vec::new(),
        };
        self.apply_gates(&mut report, waivers, audit);

        debug!(
            weighted = report.weighted_score,
            catastrophic = report.catastrophic_readability,
            critical_collisions = report.effective_critical_collision_count,
            "scored fixture"
        );
        report
    }

    /// Every dimension 0; still subject to the declared waivers.
    pub fn worst_case(&self, reason: impl Into<String>, waivers: &WaiverSet) -> QualityReport {
        let mut report = QualityReport {
            weighted_score: 0.0,
            dimensions: QualityDimensions::uniform(0.0),
            metrics: QualityMetrics::default(),
            critical_dimensions_below_two: Vec::new(),
            catastrophic_readability: false,
            critical_collision_count: 0,
            effective_critical_collision_count: 0,
            waived_critical_collision: false,
            waived_catastrophic_readability: false,
            notes: vec![reason.into()],
        };
        self.apply_gates(&mut report, waivers, None);
        report
    }

    /// Σ(score × weight) / Σ(weight); 0 when the weights sum to zero.
    pub fn weighted_score(&self, dims: &QualityDimensions) -> f64 {
        let weights = &self.config.weights;
        let total: f64 = Dimension::ALL.iter().map(|d| weights.get(*d)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let sum: f64 = dims.iter().map(|(d, score)| score * weights.get(d)).sum();
        clamp_score(sum / total)
    }

    fn apply_gates(&self, report: &mut QualityReport, waivers: &WaiverSet, audit: Option<&CollisionAuditResult>) {
        report.critical_dimensions_below_two = self
            .config
            .critical_dimensions
            .iter()
            .copied()
            .filter(|d| report.dimensions.get(*d) < self.config.catastrophic_threshold)
            .collect();

        if report.critical_dimensions_below_two.is_empty() {
            if waivers.contains(Waiver::CatastrophicReadability) {
                report.notes.push(format!("waiver {} declared but not needed", Waiver::CatastrophicReadability));
            }
        } else if waivers.contains(Waiver::CatastrophicReadability) {
            report.waived_catastrophic_readability = true;
            let dims: Vec<&str> = report.critical_dimensions_below_two.iter().map(|d| d.code()).collect();
            report.notes.push(format!(
                "catastrophic readability waived ({} below {})",
                dims.join(", "),
                self.config.catastrophic_threshold
            ));
        } else {
            report.catastrophic_readability = true;
        }

        report.critical_collision_count = audit.filter(|a| !a.passed).map_or(0, |a| a.overlap_count);
        report.effective_critical_collision_count = report.critical_collision_count;
        if waivers.contains(Waiver::CriticalCollision) {
            if report.critical_collision_count > 0 {
                report.effective_critical_collision_count = 0;
                report.waived_critical_collision = true;
                report.notes.push(format!(
                    "{} critical collision(s) waived",
                    report.critical_collision_count
                ));
            } else {
                report.notes.push(format!("waiver {} declared but not needed", Waiver::CriticalCollision));
            }
        }
    }
}
