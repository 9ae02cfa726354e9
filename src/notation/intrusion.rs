//! Notehead/barline intrusion and flag/beam overlap checks.

use serde::{Deserialize, Serialize};

use crate::model::ElementBounds;

/// Thresholds for [`detect_barline_intrusions`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrusionOptions {
    pub min_horizontal_overlap: f64,
    pub min_vertical_overlap: f64,
    /// How far the notehead's right edge must reach past the barline center
    pub min_right_extension: f64,
}

impl Default for IntrusionOptions {
    fn default() -> Self {
        Self {
            min_horizontal_overlap: 0.75,
            min_vertical_overlap: 3.0,
            min_right_extension: 1.25,
        }
    }
}

/// A notehead bleeding rightwards across a barline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarlineIntrusion {
    pub notehead: ElementBounds,
    pub barline: ElementBounds,
    pub horizontal_overlap: f64,
    pub vertical_overlap: f64,
    /// Notehead right edge minus barline center
    pub right_extension: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagBeamOverlap {
    pub flag: ElementBounds,
    pub beam: ElementBounds,
    pub horizontal_overlap: f64,
    pub vertical_overlap: f64,
}

/// Every (notehead, barline) pair meeting all four intrusion conditions.
///
/// A notehead sitting right of the barline (the first note of the next
/// measure) is never an intrusion, however much it overlaps.
pub fn detect_barline_intrusions(
    noteheads: &[ElementBounds],
    barlines: &[ElementBounds],
    options: &IntrusionOptions,
) -> Vec<BarlineIntrusion> {
    let mut found = Vec::new();
    for notehead in noteheads {
        let nb = &notehead.bounds;
        for barline in barlines {
            let bb = &barline.bounds;
            let horizontal_overlap = nb.horizontal_overlap(bb);
            let vertical_overlap = nb.vertical_overlap(bb);
            let barline_center = bb.center_x();
            let right_extension = nb.right() - barline_center;

            if horizontal_overlap >= options.min_horizontal_overlap
                && vertical_overlap >= options.min_vertical_overlap
                && nb.center_x() < barline_center
                && right_extension > options.min_right_extension
            {
                found.push(BarlineIntrusion {
                    notehead: notehead.clone(),
                    barline: barline.clone(),
                    horizontal_overlap,
                    vertical_overlap,
                    right_extension,
                });
            }
        }
    }
    found
}

/// Every (flag, beam) pair whose boxes overlap on both axes.
pub fn detect_flag_beam_overlaps(
    flags: &[ElementBounds],
    beams: &[ElementBounds],
) -> Vec<FlagBeamOverlap> {
    flags
        .iter()
        .flat_map(|flag| {
            beams.iter().filter_map(move |beam| {
                let horizontal_overlap = flag.bounds.horizontal_overlap(&beam.bounds);
                let vertical_overlap = flag.bounds.vertical_overlap(&beam.bounds);
                (horizontal_overlap > 0.0 && vertical_overlap > 0.0).then(|| FlagBeamOverlap {
                    flag: flag.clone(),
                    beam: beam.clone(),
                    horizontal_overlap,
                    vertical_overlap,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn element(index: usize, x: f64, y: f64, w: f64, h: f64) -> ElementBounds {
        ElementBounds {
            index,
            tag_name: "path".into(),
            class_name: None,
            id: None,
            bounds: BoundingBox { x, y, width: w, height: h },
        }
    }

    #[test]
    fn notehead_reaching_past_barline_center_is_an_intrusion() {
        // Barline 1 unit wide centered at 100.5; notehead right edge 102.5.
        let barline = element(0, 100.0, 40.0, 1.0, 40.0);
        let notehead = element(0, 93.0, 60.0, 9.5, 5.0);
        let found = detect_barline_intrusions(&[notehead], &[barline], &IntrusionOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].horizontal_overlap, 1.0);
        assert_eq!(found[0].vertical_overlap, 5.0);
        assert_eq!(found[0].right_extension, 2.0);
    }

    #[test]
    fn notehead_right_of_barline_is_never_an_intrusion() {
        let barline = element(0, 100.0, 40.0, 1.0, 40.0);
        // Center at 104 lies right of the barline center.
        let notehead = element(0, 99.0, 60.0, 10.0, 5.0);
        assert!(detect_barline_intrusions(&[notehead], &[barline], &IntrusionOptions::default()).is_empty());
    }

    #[test]
    fn shallow_contacts_are_ignored() {
        let barline = element(0, 100.0, 40.0, 1.0, 40.0);
        // Right edge only 1.0 past the center.
        let touching = element(0, 91.5, 60.0, 10.0, 5.0);
        // Vertical overlap of 2 units.
        let grazing = element(1, 93.0, 78.0, 9.5, 5.0);
        let found = detect_barline_intrusions(&[touching, grazing], &[barline], &IntrusionOptions::default());
        assert!(found.is_empty());
    }

    #[test]
    fn flag_beam_overlap_needs_both_axes() {
        let beam = element(0, 0.0, 0.0, 40.0, 4.0);
        let flags = [
            element(0, 10.0, 2.0, 5.0, 10.0),
            element(1, 10.0, 4.0, 5.0, 10.0),
            element(2, 50.0, 2.0, 5.0, 10.0),
        ];
        let found = detect_flag_beam_overlaps(&flags, &[beam]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].flag.index, 0);
    }
}
