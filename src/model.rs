//! Data model shared by the geometry, notation and scoring layers.
//!
//! Everything here is produced once and never mutated afterwards; analyses
//! hand out owned copies rather than references into a parsed document.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in markup user units.
///
/// `width` and `height` are never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A point in markup user units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One element matched by a selector, with its computed bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    /// Document-order position among the selector's matches (traceability only)
    pub index: usize,
    /// Local tag name, e.g. "path", "g"
    pub tag_name: String,
    /// Raw `class` attribute
    pub class_name: Option<String>,
    /// Raw `id` attribute
    pub id: Option<String>,
    pub bounds: BoundingBox,
}

/// The root viewport, from `viewBox` or the `width`/`height` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A pairwise intersection between two elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlap {
    pub left: ElementBounds,
    pub right: ElementBounds,
    /// Intersection of the (padded) boxes
    pub intersection: BoundingBox,
    pub area: f64,
}

/// Diagnostic severity reported by the parse and render collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Source position of a diagnostic (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// A structured diagnostic from the parse or render stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine code, e.g. "RENDER_UNSUPPORTED_SYMBOL"
    pub code: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Document path of the offending node, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl BoundingBox {
    /// Build a box from min/max extents. Inverted extents collapse to zero size.
    pub fn from_extents(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x).max(0.0),
            height: (max_y - min_y).max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_extents(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Intersection box, or `None` when the boxes do not overlap with
    /// positive area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let w = self.horizontal_overlap(other);
        let h = self.vertical_overlap(other);
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        Some(BoundingBox {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
            width: w,
            height: h,
        })
    }

    /// Signed horizontal overlap length (negative when apart).
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> f64 {
        self.right().min(other.right()) - self.x.max(other.x)
    }

    /// Signed vertical overlap length (negative when apart).
    pub fn vertical_overlap(&self, other: &BoundingBox) -> f64 {
        self.bottom().min(other.bottom()) - self.y.max(other.y)
    }

    /// Grow the box by `padding` on every side.
    pub fn expanded(&self, padding: f64) -> BoundingBox {
        BoundingBox::from_extents(
            self.x - padding,
            self.y - padding,
            self.right() + padding,
            self.bottom() + padding,
        )
    }
}

impl Viewport {
    pub fn as_box(&self) -> BoundingBox {
        BoundingBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            location: None,
            path: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h }
    }

    #[test]
    fn intersection_requires_positive_area() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let touching = bbox(10.0, 0.0, 5.0, 5.0);
        assert!(a.intersection(&touching).is_none());

        let inside = bbox(2.0, 3.0, 4.0, 4.0);
        assert_eq!(a.intersection(&inside), Some(inside));
    }

    #[test]
    fn from_extents_never_negative() {
        let b = BoundingBox::from_extents(5.0, 5.0, 1.0, 1.0);
        assert_eq!(b.width, 0.0);
        assert_eq!(b.height, 0.0);
    }
}
