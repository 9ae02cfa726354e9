//! Pairwise overlap detection over extracted element bounds.
//!
//! Quadratic in the element count, which is fine for the tens to low
//! hundreds of symbols on one page.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::selector::Selector;
use crate::geometry::SvgDocument;
use crate::model::{ElementBounds, Overlap};

/// Thresholds for an overlap scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapOptions {
    /// Grow both boxes by this much on every side before intersecting
    pub padding: f64,
    /// Report only intersections with area strictly greater than this
    pub min_overlap_area: f64,
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self {
            padding: 0.0,
            min_overlap_area: 0.0,
        }
    }
}

/// All unordered pairs within `elements` whose padded boxes intersect with
/// more than `min_overlap_area`. Pairs come out ordered by position, left
/// before right, each pair once.
pub fn detect_overlaps(elements: &[ElementBounds], options: &OverlapOptions) -> Vec<Overlap> {
    let mut overlaps = Vec::new();
    for (i, left) in elements.iter().enumerate() {
        for right in &elements[i + 1..] {
            if let Some(overlap) = overlap_pair(left, right, options) {
                overlaps.push(overlap);
            }
        }
    }
    overlaps
}

/// Pairs taking one element from each list.
pub fn detect_cross_overlaps(
    lefts: &[ElementBounds],
    rights: &[ElementBounds],
    options: &OverlapOptions,
) -> Vec<Overlap> {
    lefts
        .iter()
        .flat_map(|l| rights.iter().filter_map(move |r| overlap_pair(l, r, options)))
        .collect()
}

// ─── Collision audit ────────────────────────────────────────────────

/// A fixture's declared overlap budget for one selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionAuditConfig {
    pub selector: String,
    #[serde(default)]
    pub padding: f64,
    #[serde(default)]
    pub min_overlap_area: f64,
    #[serde(default)]
    pub max_overlaps: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollisionAuditResult {
    pub selector: String,
    pub overlap_count: usize,
    pub max_overlaps: usize,
    pub passed: bool,
    pub overlaps: Vec<Overlap>,
}

impl CollisionAuditConfig {
    pub fn options(&self) -> OverlapOptions {
        OverlapOptions {
            padding: self.padding,
            min_overlap_area: self.min_overlap_area,
        }
    }

    /// Overlaps among this page's selector matches.
    pub fn audit_page(&self, doc: &SvgDocument<'_>) -> Result<Vec<Overlap>> {
        let selector = Selector::parse(&self.selector)?;
        Ok(detect_overlaps(&doc.select(&selector), &self.options()))
    }

    /// Fold the overlaps of every page into one verdict.
    pub fn finish(&self, overlaps: Vec<Overlap>) -> CollisionAuditResult {
        CollisionAuditResult {
            selector: self.selector.clone(),
            overlap_count: overlaps.len(),
            max_overlaps: self.max_overlaps,
            passed: overlaps.len() <= self.max_overlaps,
            overlaps,
        }
    }
}

fn overlap_pair(left: &ElementBounds, right: &ElementBounds, options: &OverlapOptions) -> Option<Overlap> {
    let a = left.bounds.expanded(options.padding);
    let b = right.bounds.expanded(options.padding);
    let intersection = a.intersection(&b)?;
    let area = intersection.area();
    (area > options.min_overlap_area).then(|| Overlap {
        left: left.clone(),
        right: right.clone(),
        intersection,
        area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn element(index: usize, x: f64, y: f64, w: f64, h: f64) -> ElementBounds {
        ElementBounds {
            index,
            tag_name: "rect".into(),
            class_name: None,
            id: None,
            bounds: BoundingBox { x, y, width: w, height: h },
        }
    }

    #[test]
    fn reports_each_pair_once_and_never_self() {
        let els = vec![
            element(0, 0.0, 0.0, 10.0, 10.0),
            element(1, 5.0, 5.0, 10.0, 10.0),
            element(2, 8.0, 8.0, 10.0, 10.0),
        ];
        let found = detect_overlaps(&els, &OverlapOptions::default());
        let pairs: Vec<(usize, usize)> = found.iter().map(|o| (o.left.index, o.right.index)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert!(found.iter().all(|o| o.left.index < o.right.index));
        assert_eq!(found[0].area, 25.0);
    }

    #[test]
    fn padding_catches_near_misses() {
        let els = vec![element(0, 0.0, 0.0, 10.0, 10.0), element(1, 11.0, 0.0, 10.0, 10.0)];
        assert!(detect_overlaps(&els, &OverlapOptions::default()).is_empty());
        let padded = OverlapOptions { padding: 1.0, min_overlap_area: 0.0 };
        let found = detect_overlaps(&els, &padded);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].intersection.width, 1.0);
    }

    #[test]
    fn area_threshold_is_strict() {
        let els = vec![element(0, 0.0, 0.0, 10.0, 10.0), element(1, 8.0, 8.0, 10.0, 10.0)];
        let opts = OverlapOptions { padding: 0.0, min_overlap_area: 4.0 };
        assert!(detect_overlaps(&els, &opts).is_empty());
        let opts = OverlapOptions { padding: 0.0, min_overlap_area: 3.9 };
        assert_eq!(detect_overlaps(&els, &opts).len(), 1);
    }

    #[test]
    fn audit_compares_against_budget() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg">
            <rect class="vf-notehead" x="0" y="0" width="10" height="10"/>
            <rect class="vf-notehead" x="5" y="0" width="10" height="10"/>
            <rect class="vf-notehead" x="40" y="0" width="10" height="10"/>
        </svg>"#;
        let doc = SvgDocument::parse(markup).unwrap();
        let audit = CollisionAuditConfig {
            selector: ".vf-notehead".into(),
            padding: 0.0,
            min_overlap_area: 0.0,
            max_overlaps: 0,
        };
        let overlaps = audit.audit_page(&doc).unwrap();
        let result = audit.finish(overlaps);
        assert_eq!(result.overlap_count, 1);
        assert!(!result.passed);

        let lenient = CollisionAuditConfig { max_overlaps: 1, ..audit };
        assert!(lenient.finish(lenient.audit_page(&doc).unwrap()).passed);
    }

    #[test]
    fn cross_overlaps_pair_across_lists() {
        let a = vec![element(0, 0.0, 0.0, 10.0, 10.0)];
        let b = vec![element(0, 5.0, 5.0, 2.0, 2.0), element(1, 50.0, 5.0, 2.0, 2.0)];
        let found = detect_cross_overlaps(&a, &b, &OverlapOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].area, 4.0);
    }
}
