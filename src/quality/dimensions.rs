//! Per-dimension scoring rules.
//!
//! Every dimension starts at [`FULL_SCORE`], subtracts capped penalties and
//! is clamped to `[0, FULL_SCORE]`.

use super::diagnostics::DiagnosticCounts;
use super::metrics::QualityMetrics;

pub const FULL_SCORE: f64 = 5.0;

// ═══════════════════════════════════════════════════════════════════════
// Penalty table
// ═══════════════════════════════════════════════════════════════════════

// Q1 rhythm/spacing
const GAP_BELOW_4: f64 = 0.5;
const GAP_BELOW_3: f64 = 1.0;
const GAP_BELOW_2: f64 = 1.6;
const CROWDED_RATIO_WEIGHT: f64 = 0.8;
const NOTEHEAD_OVERLAP_EACH: f64 = 0.1;
const NOTEHEAD_OVERLAP_CAP: f64 = 0.8;
const SQUEEZED_OPENING_RATIO: f64 = 0.5;
const SQUEEZED_OPENING: f64 = 0.4;

// Q2 collision
const CRITICAL_EACH: f64 = 1.2;
const CRITICAL_CAP: f64 = 3.0;
const MINOR_EACH: f64 = 0.02;
const MINOR_CAP: f64 = 1.0;
const COLLISION_DIAG_EACH: f64 = 0.2;
const COLLISION_DIAG_CAP: f64 = 0.9;

// Q3 beam/stem/rest
const STEMLESS_MIN_NOTEHEADS: usize = 4;
const STEMLESS: f64 = 1.5;
const ABNORMAL_STEM_WEIGHT: f64 = 3.0;
const ABNORMAL_STEM_CAP: f64 = 1.5;
const BEAMS_WITHOUT_STEMS: f64 = 1.0;
const FLAG_BEAM_EACH: f64 = 0.8;
const FLAG_BEAM_CAP: f64 = 2.4;
const STEM_BEAM_DIAG_EACH: f64 = 0.35;
const STEM_BEAM_DIAG_CAP: f64 = 1.05;

// Q4 spanner
const TIE_OVERFLOW_EACH: f64 = 0.8;
const TIE_OVERFLOW_CAP: f64 = 2.4;
const SPANNER_DIAG_EACH: f64 = 0.4;
const SPANNER_DIAG_CAP: f64 = 1.2;
const CURVE_ANOMALY_EACH: f64 = 0.5;
const CURVE_ANOMALY_CAP: f64 = 1.5;
// Covers tie overflow and spanner diagnostics only; curve anomalies are
// subtracted after it.
const CLEAN_TIES_FLOOR: f64 = 4.8;

// Q5 text
const TEXT_TEXT_EACH: f64 = 0.3;
const TEXT_TEXT_CAP: f64 = 1.5;
const TEXT_NOTEHEAD_EACH: f64 = 0.4;
const TEXT_NOTEHEAD_CAP: f64 = 1.6;
const TEXT_OVERFLOW_EACH: f64 = 0.5;
const TEXT_OVERFLOW_CAP: f64 = 1.5;
const TEXT_DIAG_EACH: f64 = 0.3;
const TEXT_DIAG_CAP: f64 = 0.9;

// Q6 layout
const OVERFLOW_EACH: f64 = 0.4;
const OVERFLOW_CAP: f64 = 2.0;
const INTRUSION_EACH: f64 = 0.5;
const INTRUSION_CAP: f64 = 2.0;
const MAX_HORIZONTAL_USAGE: f64 = 0.99;
const MAX_VERTICAL_USAGE: f64 = 1.0;
const USAGE_PENALTY: f64 = 0.5;
const TIGHT_STAVE_GAP: f64 = 8.0;
const TIGHT_STAVES: f64 = 0.6;
const CLASHING_STAVES: f64 = 1.5;
const LAYOUT_DIAG_EACH: f64 = 0.25;
const LAYOUT_DIAG_CAP: f64 = 0.75;

// Q7 symbol fidelity
const NO_NOTEHEADS: f64 = 2.2;
const NO_STAVES: f64 = 2.2;
const UNSUPPORTED_EACH: f64 = 0.4;
const UNSUPPORTED_CAP: f64 = 1.2;
const WARNING_EACH: f64 = 0.1;
const WARNING_CAP: f64 = 0.5;
const ERROR_CEILING: f64 = 1.0;

fn capped(count: usize, each: f64, cap: f64) -> f64 {
    (count as f64 * each).min(cap)
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, FULL_SCORE)
}

// ═══════════════════════════════════════════════════════════════════════
// Dimensions
// ═══════════════════════════════════════════════════════════════════════

pub fn rhythm_spacing(m: &QualityMetrics) -> f64 {
    let mut penalty = match m.min_notehead_gap {
        Some(gap) if gap < 2.0 => GAP_BELOW_2,
        Some(gap) if gap < 3.0 => GAP_BELOW_3,
        Some(gap) if gap < 4.0 => GAP_BELOW_4,
        _ => 0.0,
    };
    penalty += m.crowded_ratio() * CROWDED_RATIO_WEIGHT;
    penalty += capped(m.notehead_overlap_count, NOTEHEAD_OVERLAP_EACH, NOTEHEAD_OVERLAP_CAP);
    if m.min_first_measure_ratio.is_some_and(|r| r < SQUEEZED_OPENING_RATIO) {
        penalty += SQUEEZED_OPENING;
    }
    clamp_score(FULL_SCORE - penalty)
}

pub fn collision(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    let penalty = capped(m.critical_overlap_count, CRITICAL_EACH, CRITICAL_CAP)
        + capped(m.minor_overlap_count, MINOR_EACH, MINOR_CAP)
        + capped(d.collision, COLLISION_DIAG_EACH, COLLISION_DIAG_CAP);
    clamp_score(FULL_SCORE - penalty)
}

pub fn beam_stem_rest(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    let mut penalty = 0.0;
    if m.stem_count == 0 && m.notehead_count >= STEMLESS_MIN_NOTEHEADS {
        penalty += STEMLESS;
    }
    penalty += (m.abnormal_stem_ratio() * ABNORMAL_STEM_WEIGHT).min(ABNORMAL_STEM_CAP);
    if m.beam_count > 0 && m.stem_count == 0 {
        penalty += BEAMS_WITHOUT_STEMS;
    }
    penalty += capped(m.flag_beam_overlap_count, FLAG_BEAM_EACH, FLAG_BEAM_CAP);
    penalty += capped(d.stem_beam, STEM_BEAM_DIAG_EACH, STEM_BEAM_DIAG_CAP);
    clamp_score(FULL_SCORE - penalty)
}

pub fn spanner(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    let penalty = capped(m.tie_overflow_count, TIE_OVERFLOW_EACH, TIE_OVERFLOW_CAP)
        + capped(d.spanner, SPANNER_DIAG_EACH, SPANNER_DIAG_CAP);
    let mut score = FULL_SCORE - penalty;
    if m.tie_count > 0 && m.tie_overflow_count == 0 && d.spanner == 0 {
        score = score.max(CLEAN_TIES_FLOOR);
    }
    clamp_score(score - capped(m.curve_anomaly_count, CURVE_ANOMALY_EACH, CURVE_ANOMALY_CAP))
}

pub fn text(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    if m.text_count == 0 {
        return FULL_SCORE;
    }
    let penalty = capped(m.text_overlap_count, TEXT_TEXT_EACH, TEXT_TEXT_CAP)
        + capped(m.text_notehead_overlap_count, TEXT_NOTEHEAD_EACH, TEXT_NOTEHEAD_CAP)
        + capped(m.text_overflow_count, TEXT_OVERFLOW_EACH, TEXT_OVERFLOW_CAP)
        + capped(d.text, TEXT_DIAG_EACH, TEXT_DIAG_CAP);
    clamp_score(FULL_SCORE - penalty)
}

pub fn layout(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    let mut penalty = capped(m.overflow_count, OVERFLOW_EACH, OVERFLOW_CAP)
        + capped(m.barline_intrusion_count, INTRUSION_EACH, INTRUSION_CAP);
    if m.horizontal_usage_ratio.is_some_and(|r| r > MAX_HORIZONTAL_USAGE) {
        penalty += USAGE_PENALTY;
    }
    if m.vertical_usage_ratio.is_some_and(|r| r > MAX_VERTICAL_USAGE) {
        penalty += USAGE_PENALTY;
    }
    penalty += match m.min_stave_gap {
        Some(gap) if gap < 0.0 => CLASHING_STAVES,
        Some(gap) if gap < TIGHT_STAVE_GAP => TIGHT_STAVES,
        _ => 0.0,
    };
    penalty += capped(d.layout, LAYOUT_DIAG_EACH, LAYOUT_DIAG_CAP);
    clamp_score(FULL_SCORE - penalty)
}

pub fn symbol_fidelity(m: &QualityMetrics, d: &DiagnosticCounts) -> f64 {
    let mut penalty = 0.0;
    if m.notehead_count == 0 {
        penalty += NO_NOTEHEADS;
    }
    if m.stave_count == 0 {
        penalty += NO_STAVES;
    }
    penalty += capped(d.unsupported_symbol, UNSUPPORTED_EACH, UNSUPPORTED_CAP);
    penalty += capped(d.warnings, WARNING_EACH, WARNING_CAP);
    let score = clamp_score(FULL_SCORE - penalty);
    if d.errors > 0 {
        score.min(ERROR_CEILING)
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> QualityMetrics {
        QualityMetrics {
            page_count: 1,
            notehead_count: 12,
            stem_count: 12,
            stave_count: 2,
            barline_count: 4,
            gap_count: 10,
            min_notehead_gap: Some(18.0),
            min_first_measure_ratio: Some(1.0),
            horizontal_usage_ratio: Some(0.9),
            vertical_usage_ratio: Some(0.6),
            min_stave_gap: Some(40.0),
            ..QualityMetrics::default()
        }
    }

    #[test]
    fn healthy_page_scores_full_marks() {
        let m = healthy();
        let d = DiagnosticCounts::default();
        assert_eq!(rhythm_spacing(&m), 5.0);
        assert_eq!(collision(&m, &d), 5.0);
        assert_eq!(beam_stem_rest(&m, &d), 5.0);
        assert_eq!(spanner(&m, &d), 5.0);
        assert_eq!(text(&m, &d), 5.0);
        assert_eq!(layout(&m, &d), 5.0);
        assert_eq!(symbol_fidelity(&m, &d), 5.0);
    }

    #[test]
    fn gap_penalty_takes_largest_step() {
        let mut m = healthy();
        m.min_notehead_gap = Some(1.5);
        assert!((rhythm_spacing(&m) - 3.4).abs() < 1e-9);
        m.min_notehead_gap = Some(3.5);
        assert_eq!(rhythm_spacing(&m), 4.5);
    }

    #[test]
    fn collision_penalties_are_capped() {
        let mut m = healthy();
        m.critical_overlap_count = 10;
        m.minor_overlap_count = 1000;
        let d = DiagnosticCounts { collision: 20, ..DiagnosticCounts::default() };
        assert!((collision(&m, &d) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn clean_ties_floor_spanner_score() {
        let mut m = healthy();
        m.tie_count = 3;
        assert_eq!(spanner(&m, &DiagnosticCounts::default()), 5.0);
        m.tie_overflow_count = 1;
        assert!((spanner(&m, &DiagnosticCounts::default()) - 4.2).abs() < 1e-9);
    }

    #[test]
    fn steep_curves_lower_spanner_score_despite_clean_ties() {
        let mut m = healthy();
        m.tie_count = 3;
        m.curve_anomaly_count = 2;
        assert!((spanner(&m, &DiagnosticCounts::default()) - 4.0).abs() < 1e-9);
        m.curve_anomaly_count = 10;
        assert!((spanner(&m, &DiagnosticCounts::default()) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn empty_page_loses_symbol_fidelity() {
        let m = QualityMetrics::default();
        let d = DiagnosticCounts::default();
        assert!(symbol_fidelity(&m, &d) <= 0.6 + 1e-9);
        let d = DiagnosticCounts { errors: 1, ..DiagnosticCounts::default() };
        assert_eq!(symbol_fidelity(&healthy(), &d), 1.0);
    }

    #[test]
    fn clashing_staves_cost_more_than_tight_ones() {
        let mut m = healthy();
        m.min_stave_gap = Some(5.0);
        let tight = layout(&m, &DiagnosticCounts::default());
        m.min_stave_gap = Some(-2.0);
        let clashing = layout(&m, &DiagnosticCounts::default());
        assert!(clashing < tight);
        assert!((tight - 4.4).abs() < 1e-9);
    }

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(7.0), 5.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }
}
