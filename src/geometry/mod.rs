//! Geometry extractor. Parses SVG markup and returns one bounding box per
//! element matched by a selector.
//!
//! The extractor knows nothing about notation. Elements whose bounds cannot
//! be computed (unsupported tags, malformed path data) are skipped without
//! error; only markup that does not parse at all is reported as an error.

pub mod path;
pub mod selector;
pub mod shapes;
pub mod transform;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{BoundingBox, ElementBounds, Viewport};
use selector::Selector;
use shapes::{element_bounds, is_non_rendered, parse_length};
use transform::{parse_transform, Affine};

pub use path::{contains_cubic, first_subpath_anchors, path_bounds};

/// A parsed SVG document that several selectors can run over.
pub struct SvgDocument<'input> {
    doc: Document<'input>,
}

impl<'input> SvgDocument<'input> {
    /// Parse markup whose root element is `<svg>`.
    pub fn parse(markup: &'input str) -> Result<Self> {
        let doc = Document::parse(markup)?;
        let root = doc.root_element().tag_name().name();
        if root != "svg" {
            return Err(Error::NotSvg(root.to_string()));
        }
        Ok(Self { doc })
    }

    /// Root viewport: `viewBox` when valid, else `width`/`height`.
    pub fn viewport(&self) -> Option<Viewport> {
        let root = self.doc.root_element();

        if let Some(vb) = root.attribute("viewBox") {
            let nums: Vec<f64> = vb
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<f64>().ok())
                .collect();
            if let [x, y, width, height] = nums[..] {
                if width > 0.0 && height > 0.0 {
                    return Some(Viewport { x, y, width, height });
                }
            }
        }

        let width = root.attribute("width").and_then(parse_length)?;
        let height = root.attribute("height").and_then(parse_length)?;
        (width > 0.0 && height > 0.0).then_some(Viewport {
            x: 0.0,
            y: 0.0,
            width,
            height,
        })
    }

    /// Rendered elements matching the selector, in document order.
    pub fn matching_nodes<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
        self.doc
            .root_element()
            .descendants()
            .filter(|n| n.is_element())
            .filter(move |n| selector.matches(*n))
            .filter(|n| is_rendered(*n))
    }

    /// One `ElementBounds` per match that has computable bounds, in root
    /// user space.
    pub fn select(&self, selector: &Selector) -> Vec<ElementBounds> {
        self.matching_nodes(selector)
            .enumerate()
            .filter_map(|(index, node)| {
                let bounds = bounds_in_root_space(node);
                if bounds.is_none() {
                    debug!(
                        index,
                        tag = node.tag_name().name(),
                        selector = selector.as_str(),
                        "element has no computable bounds; skipped"
                    );
                }
                Some(ElementBounds {
                    index,
                    tag_name: node.tag_name().name().to_string(),
                    class_name: node.attribute("class").map(String::from),
                    id: node.attribute("id").map(String::from),
                    bounds: bounds?,
                })
            })
            .collect()
    }

    pub fn select_str(&self, selector: &str) -> Result<Vec<ElementBounds>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select(&selector))
    }
}

/// Parse `markup` and extract bounds for every element matching `selector`.
pub fn extract_bounds(markup: &str, selector: &str) -> Result<Vec<ElementBounds>> {
    let selector = Selector::parse(selector)?;
    let doc = SvgDocument::parse(markup)?;
    Ok(doc.select(&selector))
}

/// Bounds with the element's own and all ancestor transforms applied.
pub fn bounds_in_root_space(node: Node) -> Option<BoundingBox> {
    let local = element_bounds(node)?;
    Some(ancestor_transform(node).apply_box(&local))
}

/// Combined transform of every ancestor, outermost applied last.
pub(crate) fn ancestor_transform(node: Node) -> Affine {
    node.ancestors()
        .skip(1)
        .filter(|n| n.is_element())
        .filter_map(|n| n.attribute("transform"))
        .fold(Affine::IDENTITY, |inner, t| parse_transform(t).then_inner(&inner))
}

fn is_rendered(node: Node) -> bool {
    !node.ancestors().any(|n| n.is_element() && is_non_rendered(n))
}
