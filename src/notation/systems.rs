//! System grouping and crop-region computation.

use serde::{Deserialize, Serialize};

use super::spacing::BandSummary;
use crate::model::BoundingBox;

/// A system: `staves_per_system` consecutive bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemBounds {
    pub system_index: usize,
    pub band_indices: Vec<usize>,
    /// Union of every barline box in the system
    pub bounds: BoundingBox,
}

/// Per-edge padding in markup units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgePadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropOptions {
    /// Systems to keep; `None` keeps all of them
    pub system_indices: Option<Vec<usize>>,
    /// Extra room above the top system for titles and tempo marks
    pub header_padding: f64,
    pub padding: EdgePadding,
    pub pixels_per_unit: f64,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            system_indices: None,
            header_padding: 0.0,
            padding: EdgePadding::default(),
            pixels_per_unit: 1.0,
            image_width: u32::MAX,
            image_height: u32::MAX,
        }
    }
}

/// Pixel rectangle within a rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Chunk bands into systems of `staves_per_system`. A trailing group with
/// fewer bands is discarded.
pub fn group_systems(bands: &[BandSummary], staves_per_system: usize) -> Vec<SystemBounds> {
    if staves_per_system == 0 {
        return Vec::new();
    }
    bands
        .chunks_exact(staves_per_system)
        .enumerate()
        .filter_map(|(system_index, group)| {
            let bounds = group.iter().map(BandSummary::bounds).reduce(|a, b| a.union(&b))?;
            Some(SystemBounds {
                system_index,
                band_indices: group.iter().map(|b| b.band_index).collect(),
                bounds,
            })
        })
        .collect()
}

/// Pixel crop around the chosen systems, or `None` when nothing is chosen
/// or the region is empty after clamping.
pub fn crop_region(systems: &[SystemBounds], options: &CropOptions) -> Option<CropRegion> {
    let chosen = systems
        .iter()
        .filter(|s| {
            options
                .system_indices
                .as_ref()
                .map_or(true, |keep| keep.contains(&s.system_index))
        })
        .map(|s| s.bounds)
        .reduce(|a, b| a.union(&b))?;

    let pad = &options.padding;
    let scale = options.pixels_per_unit;
    let x0 = (chosen.x - pad.left) * scale;
    let y0 = (chosen.y - options.header_padding - pad.top) * scale;
    let x1 = (chosen.right() + pad.right) * scale;
    let y1 = (chosen.bottom() + pad.bottom) * scale;

    let clamp = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
    let left = clamp(x0.floor(), options.image_width);
    let top = clamp(y0.floor(), options.image_height);
    let right = clamp(x1.ceil(), options.image_width);
    let bottom = clamp(y1.ceil(), options.image_height);

    (right > left && bottom > top).then(|| CropRegion {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(band_index: usize, left: f64, top: f64, right: f64, bottom: f64) -> BandSummary {
        BandSummary {
            band_index,
            top,
            bottom,
            left,
            right,
            barline_count: 2,
            samples: Vec::new(),
            first_measure_average_gap: None,
            median_other_measures_average_gap: None,
            first_to_median_other_gap_ratio: None,
            first_measure_notehead_count: 0,
            median_other_notehead_count: None,
            density_aware_width_ratio: None,
        }
    }

    fn bands() -> Vec<BandSummary> {
        vec![
            band(0, 10.0, 40.0, 290.0, 80.0),
            band(1, 10.0, 120.0, 280.0, 160.0),
            band(2, 10.0, 240.0, 290.0, 280.0),
            band(3, 10.0, 320.0, 290.0, 360.0),
            band(4, 10.0, 440.0, 290.0, 480.0),
        ]
    }

    #[test]
    fn groups_bands_and_drops_incomplete_tail() {
        let systems = group_systems(&bands(), 2);
        assert_eq!(systems.len(), 2);
        assert_eq!(systems[0].band_indices, vec![0, 1]);
        assert_eq!(systems[0].bounds, BoundingBox { x: 10.0, y: 40.0, width: 280.0, height: 120.0 });
        assert_eq!(systems[1].band_indices, vec![2, 3]);
        assert!(group_systems(&bands(), 0).is_empty());
    }

    #[test]
    fn crop_pads_scales_and_clamps() {
        let systems = group_systems(&bands(), 2);
        let options = CropOptions {
            system_indices: Some(vec![0]),
            header_padding: 30.0,
            padding: EdgePadding { top: 5.0, right: 5.0, bottom: 5.0, left: 20.0 },
            pixels_per_unit: 2.0,
            image_width: 560,
            image_height: 1000,
        };
        let region = crop_region(&systems, &options).unwrap();
        // Left edge clamps to 0, right edge to the image width.
        assert_eq!(region, CropRegion { x: 0, y: 10, width: 560, height: 320 });
    }

    #[test]
    fn crop_of_nothing_is_none() {
        let systems = group_systems(&bands(), 2);
        let options = CropOptions {
            system_indices: Some(vec![7]),
            ..CropOptions::default()
        };
        assert_eq!(crop_region(&systems, &options), None);
        assert_eq!(crop_region(&[], &CropOptions::default()), None);
    }
}
