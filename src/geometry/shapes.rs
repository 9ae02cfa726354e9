//! Per-shape bounding rules, dispatched on tag name.

use roxmltree::Node;

use super::path::path_bounds;
use super::transform::parse_transform;
use crate::model::BoundingBox;

/// Default font size when neither the element nor an ancestor sets one.
const DEFAULT_FONT_SIZE: f64 = 12.0;
/// Estimated glyph advance as a fraction of the font size.
const TEXT_ADVANCE_RATIO: f64 = 0.5;
/// Share of the font size drawn above the baseline.
const TEXT_ASCENT_RATIO: f64 = 0.8;

/// Subtrees that are never painted directly.
const NON_RENDERED: &[&str] = &[
    "defs", "clipPath", "mask", "symbol", "marker", "pattern", "title", "desc", "metadata",
    "style", "script", "linearGradient", "radialGradient", "filter",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Rect,
    Line,
    Circle,
    Ellipse,
    Poly,
    Path,
    Text,
    Group,
}

impl Shape {
    pub(crate) fn from_tag(tag: &str) -> Option<Shape> {
        let shape = match tag {
            "rect" => Shape::Rect,
            "line" => Shape::Line,
            "circle" => Shape::Circle,
            "ellipse" => Shape::Ellipse,
            "polygon" | "polyline" => Shape::Poly,
            "path" => Shape::Path,
            "text" => Shape::Text,
            "g" | "svg" | "a" | "switch" => Shape::Group,
            _ => return None,
        };
        Some(shape)
    }

    /// Bounds in the element's own coordinate space (its `transform` not yet
    /// applied).
    fn local_bounds(self, node: Node) -> Option<BoundingBox> {
        match self {
            Shape::Rect => rect_bounds(node),
            Shape::Line => line_bounds(node),
            Shape::Circle => {
                let r = length(node, "r")?;
                ellipse_around(node, r, r)
            }
            Shape::Ellipse => {
                let rx = length(node, "rx")?;
                let ry = length(node, "ry")?;
                ellipse_around(node, rx, ry)
            }
            Shape::Poly => points_bounds(node.attribute("points")?),
            Shape::Path => path_bounds(node.attribute("d")?),
            Shape::Text => text_bounds(node),
            Shape::Group => group_bounds(node),
        }
    }
}

/// Whether the element (or its subtree) is excluded from geometry.
pub(crate) fn is_non_rendered(node: Node) -> bool {
    if NON_RENDERED.contains(&node.tag_name().name()) {
        return true;
    }
    if node.attribute("display").map(str::trim) == Some("none") {
        return true;
    }
    node.attribute("style")
        .and_then(|s| style_property(s, "display"))
        .is_some_and(|v| v == "none")
}

/// Bounds of an element including its own `transform`, but not its
/// ancestors'.
pub(crate) fn element_bounds(node: Node) -> Option<BoundingBox> {
    if !node.is_element() || is_non_rendered(node) {
        return None;
    }
    let shape = Shape::from_tag(node.tag_name().name())?;
    let local = shape.local_bounds(node)?;
    match node.attribute("transform") {
        Some(t) => Some(parse_transform(t).apply_box(&local)),
        None => Some(local),
    }
}

fn group_bounds(node: Node) -> Option<BoundingBox> {
    node.children()
        .filter(|c| c.is_element())
        .filter_map(element_bounds)
        .reduce(|acc, b| acc.union(&b))
}

fn rect_bounds(node: Node) -> Option<BoundingBox> {
    let width = length(node, "width")?;
    let height = length(node, "height")?;
    if width < 0.0 || height < 0.0 {
        return None;
    }
    Some(BoundingBox {
        x: length(node, "x").unwrap_or(0.0),
        y: length(node, "y").unwrap_or(0.0),
        width,
        height,
    })
}

fn line_bounds(node: Node) -> Option<BoundingBox> {
    let x1 = length(node, "x1").unwrap_or(0.0);
    let y1 = length(node, "y1").unwrap_or(0.0);
    let x2 = length(node, "x2").unwrap_or(0.0);
    let y2 = length(node, "y2").unwrap_or(0.0);
    Some(BoundingBox::from_extents(
        x1.min(x2),
        y1.min(y2),
        x1.max(x2),
        y1.max(y2),
    ))
}

fn ellipse_around(node: Node, rx: f64, ry: f64) -> Option<BoundingBox> {
    if rx < 0.0 || ry < 0.0 {
        return None;
    }
    let cx = length(node, "cx").unwrap_or(0.0);
    let cy = length(node, "cy").unwrap_or(0.0);
    Some(BoundingBox::from_extents(cx - rx, cy - ry, cx + rx, cy + ry))
}

fn points_bounds(points: &str) -> Option<BoundingBox> {
    let values: Vec<f64> = points
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map_while(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    let mut pairs = values.chunks_exact(2);
    let first = pairs.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
    for pair in pairs {
        min_x = min_x.min(pair[0]);
        max_x = max_x.max(pair[0]);
        min_y = min_y.min(pair[1]);
        max_y = max_y.max(pair[1]);
    }
    Some(BoundingBox::from_extents(min_x, min_y, max_x, max_y))
}

/// Fixed-ratio estimate; no font metrics are consulted.
fn text_bounds(node: Node) -> Option<BoundingBox> {
    let content: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let char_count = content.trim().chars().count();
    if char_count == 0 {
        return None;
    }

    let font_size = inherited(node, "font-size")
        .and_then(parse_length)
        .filter(|s| *s > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE);
    let x = first_coordinate(node.attribute("x")).unwrap_or(0.0);
    let y = first_coordinate(node.attribute("y")).unwrap_or(0.0);
    let width = char_count as f64 * font_size * TEXT_ADVANCE_RATIO;

    let left = match inherited(node, "text-anchor") {
        Some("middle") => x - width / 2.0,
        Some("end") => x - width,
        _ => x,
    };

    Some(BoundingBox {
        x: left,
        y: y - font_size * TEXT_ASCENT_RATIO,
        width,
        height: font_size,
    })
}

/// Presentation attribute or `style` property on the node or its nearest
/// ancestor that sets it.
fn inherited<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<&'a str> {
    node.ancestors().filter(|n| n.is_element()).find_map(|n| {
        n.attribute(name)
            .or_else(|| n.attribute("style").and_then(|s| style_property(s, name)))
    })
}

fn style_property<'a>(style: &'a str, name: &str) -> Option<&'a str> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

fn first_coordinate(raw: Option<&str>) -> Option<f64> {
    raw?.split(|c: char| c == ',' || c.is_whitespace())
        .find(|s| !s.is_empty())
        .and_then(parse_length)
}

fn length(node: Node, name: &str) -> Option<f64> {
    node.attribute(name).and_then(parse_length)
}

/// Plain numbers or `px` values; other units are not resolved.
pub(crate) fn parse_length(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s.strip_suffix("px").unwrap_or(s).trim();
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
