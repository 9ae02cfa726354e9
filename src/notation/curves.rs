//! Steep tie/slur detection.
//!
//! Only the first subpath's start and end anchors are compared, so a curve
//! that swoops but lands level is not flagged.

use serde::{Deserialize, Serialize};

use super::snapshot::CurveCandidate;
use crate::model::{ElementBounds, Point};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveOptions {
    pub min_vertical_delta: f64,
    pub min_horizontal_span: f64,
    pub min_slope: f64,
}

impl Default for CurveOptions {
    fn default() -> Self {
        Self {
            min_vertical_delta: 20.0,
            min_horizontal_span: 10.0,
            min_slope: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveAnomaly {
    pub element: ElementBounds,
    pub start: Point,
    pub end: Point,
    pub delta_x: f64,
    pub delta_y: f64,
    pub slope: f64,
}

pub fn detect_steep_curves(curves: &[CurveCandidate], options: &CurveOptions) -> Vec<CurveAnomaly> {
    curves
        .iter()
        .filter_map(|curve| {
            let delta_x = curve.end.x - curve.start.x;
            let delta_y = curve.end.y - curve.start.y;
            let slope = delta_y.abs() / delta_x.abs().max(1.0);
            let steep = delta_y.abs() > options.min_vertical_delta
                && delta_x.abs() > options.min_horizontal_span
                && slope > options.min_slope;
            steep.then(|| CurveAnomaly {
                element: curve.element.clone(),
                start: curve.start,
                end: curve.end,
                delta_x,
                delta_y,
                slope,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn curve(start: (f64, f64), end: (f64, f64)) -> CurveCandidate {
        CurveCandidate {
            element: ElementBounds {
                index: 0,
                tag_name: "path".into(),
                class_name: Some("vf-curve".into()),
                id: None,
                bounds: BoundingBox::from_extents(
                    start.0.min(end.0),
                    start.1.min(end.1),
                    start.0.max(end.0),
                    start.1.max(end.1),
                ),
            },
            start: Point { x: start.0, y: start.1 },
            end: Point { x: end.0, y: end.1 },
        }
    }

    #[test]
    fn flags_only_steep_wide_enough_curves() {
        let curves = [
            curve((0.0, 0.0), (30.0, 40.0)),
            curve((0.0, 0.0), (80.0, 2.0)),
            curve((0.0, 0.0), (5.0, 40.0)),
            curve((0.0, 0.0), (30.0, 19.0)),
            curve((0.0, 50.0), (20.0, 20.0)),
        ];
        let found = detect_steep_curves(&curves, &CurveOptions::default());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].delta_y, 40.0);
        assert_eq!(found[1].delta_y, -30.0);
        assert_eq!(found[1].slope, 1.5);
    }

    #[test]
    fn thresholds_are_exclusive() {
        let curves = [
            curve((0.0, 0.0), (25.0, 25.0)),
            curve((0.0, 0.0), (10.0, 30.0)),
            curve((0.0, 0.0), (15.0, 20.0)),
            curve((0.0, 0.0), (25.0, 25.5)),
        ];
        let found = detect_steep_curves(&curves, &CurveOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].end, Point { x: 25.0, y: 25.5 });
    }
}
