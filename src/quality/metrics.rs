//! Raw quality counters derived from one page's notation geometry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EvaluationConfig;
use crate::model::{ElementBounds, Overlap};
use crate::notation::{
    analyze_measure_spacing, content_usage, detect_barline_intrusions, detect_flag_beam_overlaps,
    detect_overflow, detect_steep_curves, min_stave_gap, NotationGeometrySnapshot,
};
use crate::overlap::{detect_cross_overlaps, detect_overlaps, OverlapOptions};

/// Thresholds for the general collision scan and the stem and gap checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionScanOptions {
    pub padding: f64,
    /// Minimum intersection area for a critical collision
    pub critical_min_area: f64,
    /// Minimum share of the smaller box covered for a critical collision
    pub critical_min_fraction: f64,
    /// Onset gaps below this are crowded
    pub crowded_gap: f64,
    pub min_stem_height: f64,
    pub max_stem_height: f64,
}

impl Default for CollisionScanOptions {
    fn default() -> Self {
        Self {
            padding: 0.0,
            critical_min_area: 6.0,
            critical_min_fraction: 0.4,
            crowded_gap: 6.0,
            min_stem_height: 10.0,
            max_stem_height: 80.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub page_count: usize,

    pub notehead_count: usize,
    pub stem_count: usize,
    pub beam_count: usize,
    pub flag_count: usize,
    pub tie_count: usize,
    pub barline_count: usize,
    pub text_count: usize,
    pub stave_count: usize,

    pub overflow_count: usize,
    pub text_overflow_count: usize,
    pub tie_overflow_count: usize,
    pub barline_intrusion_count: usize,
    pub flag_beam_overlap_count: usize,

    pub critical_overlap_count: usize,
    pub minor_overlap_count: usize,
    /// Minor notehead/notehead overlaps, mostly seconds in chords
    pub notehead_overlap_count: usize,
    pub text_overlap_count: usize,
    pub text_notehead_overlap_count: usize,

    pub min_notehead_gap: Option<f64>,
    pub gap_count: usize,
    pub crowded_gap_count: usize,
    /// Lowest density-aware first-measure ratio across bands
    pub min_first_measure_ratio: Option<f64>,

    pub abnormal_stem_count: usize,
    pub curve_anomaly_count: usize,

    pub horizontal_usage_ratio: Option<f64>,
    pub vertical_usage_ratio: Option<f64>,
    pub min_stave_gap: Option<f64>,
}

fn min_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl QualityMetrics {
    /// Combine two pages of the same fixture: counts add, minima take the
    /// smaller value, usage ratios take the larger.
    pub fn merge(&self, other: &QualityMetrics) -> QualityMetrics {
        QualityMetrics {
            page_count: self.page_count + other.page_count,
            notehead_count: self.notehead_count + other.notehead_count,
            stem_count: self.stem_count + other.stem_count,
            beam_count: self.beam_count + other.beam_count,
            flag_count: self.flag_count + other.flag_count,
            tie_count: self.tie_count + other.tie_count,
            barline_count: self.barline_count + other.barline_count,
            text_count: self.text_count + other.text_count,
            stave_count: self.stave_count + other.stave_count,
            overflow_count: self.overflow_count + other.overflow_count,
            text_overflow_count: self.text_overflow_count + other.text_overflow_count,
            tie_overflow_count: self.tie_overflow_count + other.tie_overflow_count,
            barline_intrusion_count: self.barline_intrusion_count + other.barline_intrusion_count,
            flag_beam_overlap_count: self.flag_beam_overlap_count + other.flag_beam_overlap_count,
            critical_overlap_count: self.critical_overlap_count + other.critical_overlap_count,
            minor_overlap_count: self.minor_overlap_count + other.minor_overlap_count,
            notehead_overlap_count: self.notehead_overlap_count + other.notehead_overlap_count,
            text_overlap_count: self.text_overlap_count + other.text_overlap_count,
            text_notehead_overlap_count: self.text_notehead_overlap_count
                + other.text_notehead_overlap_count,
            min_notehead_gap: min_opt(self.min_notehead_gap, other.min_notehead_gap),
            gap_count: self.gap_count + other.gap_count,
            crowded_gap_count: self.crowded_gap_count + other.crowded_gap_count,
            min_first_measure_ratio: min_opt(self.min_first_measure_ratio, other.min_first_measure_ratio),
            abnormal_stem_count: self.abnormal_stem_count + other.abnormal_stem_count,
            curve_anomaly_count: self.curve_anomaly_count + other.curve_anomaly_count,
            horizontal_usage_ratio: max_opt(self.horizontal_usage_ratio, other.horizontal_usage_ratio),
            vertical_usage_ratio: max_opt(self.vertical_usage_ratio, other.vertical_usage_ratio),
            min_stave_gap: min_opt(self.min_stave_gap, other.min_stave_gap),
        }
    }

    /// Share of onset gaps that are crowded; 0 when there are no gaps.
    pub fn crowded_ratio(&self) -> f64 {
        if self.gap_count == 0 {
            0.0
        } else {
            self.crowded_gap_count as f64 / self.gap_count as f64
        }
    }

    pub fn abnormal_stem_ratio(&self) -> f64 {
        if self.stem_count == 0 {
            0.0
        } else {
            self.abnormal_stem_count as f64 / self.stem_count as f64
        }
    }
}

// ─── Collision scan ─────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ScanTally {
    critical: usize,
    minor: usize,
}

impl ScanTally {
    fn add(&mut self, overlaps: &[Overlap], options: &CollisionScanOptions) -> usize {
        let mut minor = 0;
        for overlap in overlaps {
            if is_critical(overlap, options) {
                self.critical += 1;
            } else {
                self.minor += 1;
                minor += 1;
            }
        }
        minor
    }
}

fn is_critical(overlap: &Overlap, options: &CollisionScanOptions) -> bool {
    let smaller = overlap.left.bounds.area().min(overlap.right.bounds.area());
    overlap.area >= options.critical_min_area
        && smaller > 0.0
        && overlap.area / smaller >= options.critical_min_fraction
}

fn stem_is_abnormal(stem: &ElementBounds, options: &CollisionScanOptions) -> bool {
    let height = stem.bounds.height;
    height < options.min_stem_height || height > options.max_stem_height
}

// ─── Metrics ────────────────────────────────────────────────────────

/// Derive every counter for one page.
pub fn compute_metrics(snapshot: &NotationGeometrySnapshot, config: &EvaluationConfig) -> QualityMetrics {
    let scan = &config.collisions;
    let viewport = snapshot.viewport.as_ref();
    let tolerance = config.overflow_tolerance;
    let opts = OverlapOptions {
        padding: scan.padding,
        min_overlap_area: 0.0,
    };

    let mut tally = ScanTally::default();
    let notehead_pairs = detect_overlaps(&snapshot.noteheads, &opts);
    let text_pairs = detect_overlaps(&snapshot.text, &opts);
    let text_notehead_pairs = detect_cross_overlaps(&snapshot.noteheads, &snapshot.text, &opts);
    let notehead_minor = tally.add(&notehead_pairs, scan);
    tally.add(&text_notehead_pairs, scan);
    tally.add(&detect_cross_overlaps(&snapshot.noteheads, &snapshot.flags, &opts), scan);
    tally.add(&text_pairs, scan);
    tally.add(&detect_cross_overlaps(&snapshot.text, &snapshot.flags, &opts), scan);

    let bands = analyze_measure_spacing(&snapshot.noteheads, &snapshot.barlines, &config.spacing);
    let gaps: Vec<f64> = bands
        .iter()
        .flat_map(|b| &b.samples)
        .flat_map(|s| s.gaps.iter().copied())
        .collect();

    let usage = content_usage(&snapshot.layout_elements, viewport);

    let metrics = QualityMetrics {
        page_count: 1,
        notehead_count: snapshot.noteheads.len(),
        stem_count: snapshot.stems.len(),
        beam_count: snapshot.beams.len(),
        flag_count: snapshot.flags.len(),
        tie_count: snapshot.ties.len(),
        barline_count: snapshot.barlines.len(),
        text_count: snapshot.text.len(),
        stave_count: snapshot.staves.len(),
        overflow_count: detect_overflow(&snapshot.layout_elements, viewport, tolerance).len(),
        text_overflow_count: detect_overflow(&snapshot.text, viewport, tolerance).len(),
        tie_overflow_count: detect_overflow(&snapshot.ties, viewport, tolerance).len(),
        barline_intrusion_count: detect_barline_intrusions(
            &snapshot.noteheads,
            &snapshot.barlines,
            &config.intrusion,
        )
        .len(),
        flag_beam_overlap_count: detect_flag_beam_overlaps(&snapshot.flags, &snapshot.beams).len(),
        critical_overlap_count: tally.critical,
        minor_overlap_count: tally.minor,
        notehead_overlap_count: notehead_minor,
        text_overlap_count: text_pairs.len(),
        text_notehead_overlap_count: text_notehead_pairs.len(),
        min_notehead_gap: gaps.iter().copied().reduce(f64::min),
        gap_count: gaps.len(),
        crowded_gap_count: gaps.iter().filter(|g| **g < scan.crowded_gap).count(),
        min_first_measure_ratio: bands
            .iter()
            .filter_map(|b| b.density_aware_width_ratio)
            .reduce(f64::min),
        abnormal_stem_count: snapshot.stems.iter().filter(|s| stem_is_abnormal(s, scan)).count(),
        curve_anomaly_count: detect_steep_curves(&snapshot.curves, &config.curves).len(),
        horizontal_usage_ratio: usage.map(|u| u.horizontal),
        vertical_usage_ratio: usage.map(|u| u.vertical),
        min_stave_gap: min_stave_gap(&snapshot.staves),
    };

    debug!(
        noteheads = metrics.notehead_count,
        critical = metrics.critical_overlap_count,
        minor = metrics.minor_overlap_count,
        intrusions = metrics.barline_intrusion_count,
        overflow = metrics.overflow_count,
        "computed page metrics"
    );
    metrics
}
