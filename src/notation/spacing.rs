//! Measure spacing analysis.
//!
//! Barlines are clustered into bands (one per staff row), each band is cut
//! into measures at its barline positions, and noteheads are dropped into the
//! measure whose interval contains their horizontal center. The band summary
//! compares the opening measure against the rest of the row: a crushed first
//! measure is a classic symptom of a header (clef, key, time) eating the
//! space budget.

use serde::{Deserialize, Serialize};

use crate::model::{BoundingBox, ElementBounds};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpacingOptions {
    /// Max distance from a band's running mean center for a barline to join it
    pub band_merge_tolerance: f64,
    /// Barline x-centers closer than this are one position (double barlines)
    pub barline_dedupe_tolerance: f64,
    /// Vertical slack around a band when collecting its noteheads
    pub band_vertical_margin: f64,
    /// Notehead x-centers closer than this are one onset (chords)
    pub notehead_dedupe_tolerance: f64,
}

impl Default for SpacingOptions {
    fn default() -> Self {
        Self {
            band_merge_tolerance: 18.0,
            barline_dedupe_tolerance: 1.5,
            band_vertical_margin: 12.0,
            notehead_dedupe_tolerance: 0.75,
        }
    }
}

/// Spacing statistics for one measure, the interval `[left_x, right_x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureSpacingSample {
    pub band_index: usize,
    pub measure_index: usize,
    pub left_x: f64,
    pub right_x: f64,
    pub notehead_count: usize,
    pub average_gap: Option<f64>,
    pub min_gap: Option<f64>,
    pub max_gap: Option<f64>,
    /// Distances between consecutive onsets, left to right
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps: Vec<f64>,
}

/// Spacing summary for one band of barlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandSummary {
    pub band_index: usize,
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    pub barline_count: usize,
    pub samples: Vec<MeasureSpacingSample>,
    pub first_measure_average_gap: Option<f64>,
    pub median_other_measures_average_gap: Option<f64>,
    pub first_to_median_other_gap_ratio: Option<f64>,
    pub first_measure_notehead_count: usize,
    pub median_other_notehead_count: Option<f64>,
    /// Gap ratio scaled up when the opening measure is denser than usual
    pub density_aware_width_ratio: Option<f64>,
}

impl BandSummary {
    /// Union of the band's barline boxes.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_extents(self.left, self.top, self.right, self.bottom)
    }
}

// ─── Banding ────────────────────────────────────────────────────────

struct Band<'a> {
    barlines: Vec<&'a ElementBounds>,
    center_sum: f64,
}

impl<'a> Band<'a> {
    fn mean_center(&self) -> f64 {
        self.center_sum / self.barlines.len() as f64
    }

    fn push(&mut self, barline: &'a ElementBounds) {
        self.center_sum += barline.bounds.center_y();
        self.barlines.push(barline);
    }
}

fn cluster_bands<'a>(barlines: &'a [ElementBounds], tolerance: f64) -> Vec<Band<'a>> {
    let mut sorted: Vec<&ElementBounds> = barlines.iter().collect();
    sorted.sort_by(|a, b| a.bounds.center_y().total_cmp(&b.bounds.center_y()));

    let mut bands: Vec<Band> = Vec::new();
    for barline in sorted {
        match bands.last_mut() {
            Some(band) if (barline.bounds.center_y() - band.mean_center()).abs() <= tolerance => {
                band.push(barline);
            }
            _ => {
                let mut band = Band {
                    barlines: Vec::new(),
                    center_sum: 0.0,
                };
                band.push(barline);
                bands.push(band);
            }
        }
    }
    bands
}

/// Sort and merge positions closer than `tolerance` to the running cluster
/// mean; each cluster is represented by its mean.
fn dedupe_positions(mut xs: Vec<f64>, tolerance: f64) -> Vec<f64> {
    xs.sort_by(f64::total_cmp);
    let mut clusters: Vec<(f64, usize)> = Vec::new();
    for x in xs {
        match clusters.last_mut() {
            Some((sum, n)) if (x - *sum / *n as f64).abs() <= tolerance => {
                *sum += x;
                *n += 1;
            }
            _ => clusters.push((x, 1)),
        }
    }
    clusters.into_iter().map(|(sum, n)| sum / n as f64).collect()
}

pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

// ─── Analysis ───────────────────────────────────────────────────────

/// One summary per band, top to bottom.
pub fn analyze_measure_spacing(
    noteheads: &[ElementBounds],
    barlines: &[ElementBounds],
    options: &SpacingOptions,
) -> Vec<BandSummary> {
    cluster_bands(barlines, options.band_merge_tolerance)
        .into_iter()
        .enumerate()
        .map(|(band_index, band)| summarize_band(band_index, &band, noteheads, options))
        .collect()
}

fn summarize_band(
    band_index: usize,
    band: &Band<'_>,
    noteheads: &[ElementBounds],
    options: &SpacingOptions,
) -> BandSummary {
    let top = band.barlines.iter().map(|b| b.bounds.y).fold(f64::INFINITY, f64::min);
    let bottom = band.barlines.iter().map(|b| b.bounds.bottom()).fold(f64::NEG_INFINITY, f64::max);
    let left = band.barlines.iter().map(|b| b.bounds.x).fold(f64::INFINITY, f64::min);
    let right = band.barlines.iter().map(|b| b.bounds.right()).fold(f64::NEG_INFINITY, f64::max);

    let positions = dedupe_positions(
        band.barlines.iter().map(|b| b.bounds.center_x()).collect(),
        options.barline_dedupe_tolerance,
    );

    let onsets = dedupe_positions(
        noteheads
            .iter()
            .map(|n| &n.bounds)
            .filter(|b| {
                let cy = b.center_y();
                cy >= top - options.band_vertical_margin && cy <= bottom + options.band_vertical_margin
            })
            .map(|b| b.center_x())
            .collect(),
        options.notehead_dedupe_tolerance,
    );

    let samples: Vec<MeasureSpacingSample> = positions
        .windows(2)
        .enumerate()
        .map(|(measure_index, edge)| {
            let (left_x, right_x) = (edge[0], edge[1]);
            let inside: Vec<f64> = onsets
                .iter()
                .copied()
                .filter(|x| *x >= left_x && *x < right_x)
                .collect();
            let gaps: Vec<f64> = inside.windows(2).map(|w| w[1] - w[0]).collect();
            MeasureSpacingSample {
                band_index,
                measure_index,
                left_x,
                right_x,
                notehead_count: inside.len(),
                average_gap: (!gaps.is_empty()).then(|| gaps.iter().sum::<f64>() / gaps.len() as f64),
                min_gap: gaps.iter().copied().reduce(f64::min),
                max_gap: gaps.iter().copied().reduce(f64::max),
                gaps,
            }
        })
        .collect();

    let first = samples.first();
    let first_measure_average_gap = first.and_then(|s| s.average_gap);
    let first_measure_notehead_count = first.map_or(0, |s| s.notehead_count);

    let others: Vec<&MeasureSpacingSample> = samples
        .iter()
        .skip(1)
        .filter(|s| s.average_gap.is_some())
        .collect();
    let median_other_measures_average_gap =
        median(&mut others.iter().filter_map(|s| s.average_gap).collect::<Vec<_>>());
    let median_other_notehead_count =
        median(&mut others.iter().map(|s| s.notehead_count as f64).collect::<Vec<_>>());

    let first_to_median_other_gap_ratio = match (first_measure_average_gap, median_other_measures_average_gap) {
        (Some(first), Some(other)) if other > 0.0 => Some(first / other),
        _ => None,
    };

    let density_aware_width_ratio = first_to_median_other_gap_ratio.map(|ratio| {
        match median_other_notehead_count {
            Some(median_count) if median_count > 0.0 && first_measure_notehead_count as f64 > median_count => {
                ratio * first_measure_notehead_count as f64 / median_count
            }
            _ => ratio,
        }
    });

    BandSummary {
        band_index,
        top,
        bottom,
        left,
        right,
        barline_count: band.barlines.len(),
        samples,
        first_measure_average_gap,
        median_other_measures_average_gap,
        first_to_median_other_gap_ratio,
        first_measure_notehead_count,
        median_other_notehead_count,
        density_aware_width_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(index: usize, x: f64, y: f64, w: f64, h: f64) -> ElementBounds {
        ElementBounds {
            index,
            tag_name: "rect".into(),
            class_name: None,
            id: None,
            bounds: BoundingBox { x, y, width: w, height: h },
        }
    }

    fn barline_at(index: usize, x: f64, y: f64) -> ElementBounds {
        element(index, x - 0.5, y, 1.0, 40.0)
    }

    fn notehead_at(index: usize, cx: f64, cy: f64) -> ElementBounds {
        element(index, cx - 5.0, cy - 3.5, 10.0, 7.0)
    }

    fn measure(first_index: usize, start_cx: f64, count: usize, gap: f64) -> Vec<ElementBounds> {
        (0..count)
            .map(|i| notehead_at(first_index + i, start_cx + gap * i as f64, 60.0))
            .collect()
    }

    #[test]
    fn uniform_measures_have_ratio_one() {
        let barlines = vec![barline_at(0, 0.0, 40.0), barline_at(1, 100.0, 40.0), barline_at(2, 200.0, 40.0)];
        let mut noteheads = measure(0, 20.0, 4, 20.0);
        noteheads.extend(measure(4, 120.0, 4, 20.0));

        let bands = analyze_measure_spacing(&noteheads, &barlines, &SpacingOptions::default());
        assert_eq!(bands.len(), 1);
        let band = &bands[0];
        assert_eq!(band.samples.len(), 2);
        assert_eq!(band.first_measure_average_gap, Some(20.0));
        assert_eq!(band.median_other_measures_average_gap, Some(20.0));
        assert_eq!(band.first_to_median_other_gap_ratio, Some(1.0));
        assert_eq!(band.density_aware_width_ratio, Some(1.0));
        assert_eq!(band.samples[0].min_gap, Some(20.0));
        assert_eq!(band.samples[1].notehead_count, 4);
    }

    #[test]
    fn rows_split_into_bands_and_double_barlines_merge() {
        let barlines = vec![
            barline_at(0, 0.0, 40.0),
            barline_at(1, 100.0, 40.0),
            barline_at(2, 101.0, 40.0),
            barline_at(3, 0.0, 160.0),
            barline_at(4, 80.0, 161.0),
        ];
        let bands = analyze_measure_spacing(&[], &barlines, &SpacingOptions::default());
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].barline_count, 3);
        assert_eq!(bands[0].samples.len(), 1);
        assert_eq!(bands[0].samples[0].right_x, 100.5);
        assert_eq!(bands[1].top, 160.0);
    }

    #[test]
    fn chords_count_as_one_onset_and_far_noteheads_are_ignored() {
        let barlines = vec![barline_at(0, 0.0, 40.0), barline_at(1, 100.0, 40.0)];
        let noteheads = vec![
            notehead_at(0, 20.0, 55.0),
            notehead_at(1, 20.0, 65.0),
            notehead_at(2, 40.0, 60.0),
            notehead_at(3, 60.0, 200.0),
            // On the closing barline: belongs to the next interval.
            notehead_at(4, 100.0, 60.0),
        ];
        let bands = analyze_measure_spacing(&noteheads, &barlines, &SpacingOptions::default());
        assert_eq!(bands[0].samples[0].notehead_count, 2);
        assert_eq!(bands[0].samples[0].average_gap, Some(20.0));
    }

    #[test]
    fn sparse_opening_is_never_inflated() {
        let barlines: Vec<_> = (0..4).map(|i| barline_at(i, 100.0 * i as f64, 40.0)).collect();
        let mut noteheads = measure(0, 20.0, 2, 30.0);
        noteheads.extend(measure(10, 110.0, 4, 20.0));
        noteheads.extend(measure(20, 210.0, 4, 20.0));

        let band = &analyze_measure_spacing(&noteheads, &barlines, &SpacingOptions::default())[0];
        assert_eq!(band.first_measure_notehead_count, 2);
        assert_eq!(band.median_other_notehead_count, Some(4.0));
        assert_eq!(band.first_to_median_other_gap_ratio, Some(1.5));
        assert_eq!(band.density_aware_width_ratio, Some(1.5));
    }

    #[test]
    fn dense_opening_is_scaled_by_density() {
        let barlines: Vec<_> = (0..3).map(|i| barline_at(i, 100.0 * i as f64, 40.0)).collect();
        let mut noteheads = measure(0, 10.0, 8, 10.0);
        noteheads.extend(measure(10, 110.0, 4, 20.0));

        let band = &analyze_measure_spacing(&noteheads, &barlines, &SpacingOptions::default())[0];
        assert_eq!(band.first_to_median_other_gap_ratio, Some(0.5));
        assert_eq!(band.density_aware_width_ratio, Some(1.0));
    }

    #[test]
    fn single_barline_has_no_measures() {
        let band = &analyze_measure_spacing(&[], &[barline_at(0, 50.0, 40.0)], &SpacingOptions::default())[0];
        assert!(band.samples.is_empty());
        assert_eq!(band.first_to_median_other_gap_ratio, None);
        assert_eq!(band.density_aware_width_ratio, None);
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
