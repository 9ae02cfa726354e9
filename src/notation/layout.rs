//! Page-level layout checks: overflow, stave spacing and content usage.

use serde::Serialize;

use crate::model::{ElementBounds, Viewport};

/// Share of the viewport covered by the union of the layout elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContentUsage {
    pub horizontal: f64,
    pub vertical: f64,
}

/// Elements reaching past the viewport edge by more than `tolerance`.
pub fn detect_overflow(
    elements: &[ElementBounds],
    viewport: Option<&Viewport>,
    tolerance: f64,
) -> Vec<ElementBounds> {
    let Some(vp) = viewport else {
        return Vec::new();
    };
    let page = vp.as_box();
    elements
        .iter()
        .filter(|e| {
            let b = &e.bounds;
            b.x < page.x - tolerance
                || b.y < page.y - tolerance
                || b.right() > page.right() + tolerance
                || b.bottom() > page.bottom() + tolerance
        })
        .cloned()
        .collect()
}

/// Smallest vertical gap between a stave and the next stave below it that
/// shares some horizontal extent. Negative when staves overlap.
pub fn min_stave_gap(staves: &[ElementBounds]) -> Option<f64> {
    let mut sorted: Vec<&ElementBounds> = staves.iter().collect();
    sorted.sort_by(|a, b| a.bounds.y.total_cmp(&b.bounds.y));

    sorted
        .iter()
        .enumerate()
        .filter_map(|(i, upper)| {
            let lower = sorted[i + 1..]
                .iter()
                .find(|s| s.bounds.horizontal_overlap(&upper.bounds) > 0.0)?;
            Some(lower.bounds.y - upper.bounds.bottom())
        })
        .reduce(f64::min)
}

pub fn content_usage(elements: &[ElementBounds], viewport: Option<&Viewport>) -> Option<ContentUsage> {
    let vp = viewport?;
    let content = elements.iter().map(|e| e.bounds).reduce(|a, b| a.union(&b))?;
    Some(ContentUsage {
        horizontal: content.width / vp.width,
        vertical: content.height / vp.height,
    })
}
