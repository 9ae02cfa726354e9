//! Role classification of one rendered page.
//!
//! The parsed document does not outlive construction; every downstream
//! analysis works from the owned bounding boxes in the snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::geometry::selector::Selector;
use crate::geometry::transform::{parse_transform, Affine};
use crate::geometry::{
    ancestor_transform, bounds_in_root_space, contains_cubic, first_subpath_anchors, SvgDocument,
};
use crate::model::{ElementBounds, Point, Viewport};

/// Selectors that assign elements to notation roles.
///
/// The defaults follow the class names VexFlow-style renderers emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSelectors {
    pub notehead: String,
    pub stem: String,
    pub beam: String,
    pub flag: String,
    pub tie: String,
    pub barline: String,
    pub text: String,
    pub stave: String,
}

impl Default for RoleSelectors {
    fn default() -> Self {
        Self {
            notehead: ".vf-notehead".into(),
            stem: ".vf-stem".into(),
            beam: ".vf-beam".into(),
            flag: ".vf-flag".into(),
            tie: ".vf-stavetie, .vf-tie, .vf-curve".into(),
            barline: ".vf-stavebarline, .vf-barline".into(),
            text: "text".into(),
            stave: ".vf-stave".into(),
        }
    }
}

/// A stroked, unfilled path with a cubic segment: the shape of a tie or slur.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveCandidate {
    pub element: ElementBounds,
    /// First-subpath start anchor, root user space
    pub start: Point,
    /// First-subpath end anchor, root user space
    pub end: Point,
}

/// Elements of one page grouped by notation role.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotationGeometrySnapshot {
    pub viewport: Option<Viewport>,
    pub noteheads: Vec<ElementBounds>,
    pub stems: Vec<ElementBounds>,
    pub beams: Vec<ElementBounds>,
    pub flags: Vec<ElementBounds>,
    pub ties: Vec<ElementBounds>,
    pub barlines: Vec<ElementBounds>,
    pub text: Vec<ElementBounds>,
    pub staves: Vec<ElementBounds>,
    /// Union of every role list, used for overflow and usage checks
    pub layout_elements: Vec<ElementBounds>,
    pub curves: Vec<CurveCandidate>,
}

impl NotationGeometrySnapshot {
    /// Parse one page of markup and classify its elements.
    pub fn from_markup(markup: &str, roles: &RoleSelectors) -> Result<Self> {
        let doc = SvgDocument::parse(markup)?;
        Self::from_document(&doc, roles)
    }

    pub fn from_document(doc: &SvgDocument<'_>, roles: &RoleSelectors) -> Result<Self> {
        let mut snapshot = Self {
            viewport: doc.viewport(),
            noteheads: doc.select_str(&roles.notehead)?,
            stems: doc.select_str(&roles.stem)?,
            beams: doc.select_str(&roles.beam)?,
            flags: doc.select_str(&roles.flag)?,
            ties: doc.select_str(&roles.tie)?,
            barlines: doc.select_str(&roles.barline)?,
            text: doc.select_str(&roles.text)?,
            staves: doc.select_str(&roles.stave)?,
            layout_elements: Vec::new(),
            curves: curve_candidates(doc)?,
        };

        snapshot.layout_elements = [
            &snapshot.noteheads,
            &snapshot.stems,
            &snapshot.beams,
            &snapshot.flags,
            &snapshot.ties,
            &snapshot.barlines,
            &snapshot.text,
            &snapshot.staves,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();

        debug!(
            noteheads = snapshot.noteheads.len(),
            stems = snapshot.stems.len(),
            barlines = snapshot.barlines.len(),
            staves = snapshot.staves.len(),
            curves = snapshot.curves.len(),
            "built notation geometry snapshot"
        );
        Ok(snapshot)
    }
}

fn curve_candidates(doc: &SvgDocument<'_>) -> Result<Vec<CurveCandidate>> {
    let selector = Selector::parse("path")?;
    let candidates = doc
        .matching_nodes(&selector)
        .filter(|node| {
            let fill = paint(*node, "fill");
            let stroke = paint(*node, "stroke");
            fill == Some("none") && stroke.is_some_and(|s| s != "none")
        })
        .filter_map(|node| {
            let d = node.attribute("d")?;
            if !contains_cubic(d) {
                return None;
            }
            let (start, end) = first_subpath_anchors(d)?;
            let own = node
                .attribute("transform")
                .map(parse_transform)
                .unwrap_or(Affine::IDENTITY);
            let ctm = ancestor_transform(node).then_inner(&own);
            let map = |p: Point| {
                let (x, y) = ctm.apply(p.x, p.y);
                Point { x, y }
            };
            Some((node, map(start), map(end)))
        })
        .enumerate()
        .filter_map(|(index, (node, start, end))| {
            Some(CurveCandidate {
                element: ElementBounds {
                    index,
                    tag_name: "path".into(),
                    class_name: node.attribute("class").map(String::from),
                    id: node.attribute("id").map(String::from),
                    bounds: bounds_in_root_space(node)?,
                },
                start,
                end,
            })
        })
        .collect();
    Ok(candidates)
}

/// Paint property from the attribute or inline style; not inherited.
fn paint<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Option<&'a str> {
    let from_style = node.attribute("style").and_then(|style| {
        style.split(';').find_map(|decl| {
            let (key, value) = decl.split_once(':')?;
            (key.trim() == name).then(|| value.trim())
        })
    });
    from_style.or_else(|| node.attribute(name).map(str::trim))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 120">
        <g class="vf-stave"><path d="M10 40 L290 40 M10 80 L290 80"/></g>
        <g class="vf-stavebarline"><rect x="150" y="40" width="1" height="40"/></g>
        <g class="vf-stavenote">
            <g class="vf-notehead"><path d="M40 55 L50 55 L50 62 L40 62 Z"/></g>
            <path class="vf-stem" d="M49 58 L49 25"/>
            <g class="vf-flag"><path d="M49 25 L56 35"/></g>
        </g>
        <path class="vf-curve" d="M40 50 C60 30 100 30 120 50" fill="none" stroke="black"/>
        <path d="M10 10 C20 20 30 20 40 10" stroke="black"/>
        <text x="20" y="20">Title</text>
    </svg>"#;

    #[test]
    fn classifies_roles() {
        let snap = NotationGeometrySnapshot::from_markup(PAGE, &RoleSelectors::default()).unwrap();
        assert_eq!(snap.staves.len(), 1);
        assert_eq!(snap.barlines.len(), 1);
        assert_eq!(snap.noteheads.len(), 1);
        assert_eq!(snap.stems.len(), 1);
        assert_eq!(snap.flags.len(), 1);
        assert_eq!(snap.ties.len(), 1);
        assert_eq!(snap.text.len(), 1);
        assert!(snap.beams.is_empty());
        assert_eq!(snap.layout_elements.len(), 7);
        assert_eq!(snap.viewport.map(|v| v.width), Some(300.0));
    }

    #[test]
    fn curve_candidates_need_stroke_without_fill() {
        let snap = NotationGeometrySnapshot::from_markup(PAGE, &RoleSelectors::default()).unwrap();
        assert_eq!(snap.curves.len(), 1);
        assert_eq!(snap.curves[0].start, Point { x: 40.0, y: 50.0 });
        assert_eq!(snap.curves[0].end, Point { x: 120.0, y: 50.0 });
    }

    #[test]
    fn bad_role_selector_is_an_error() {
        let roles = RoleSelectors {
            stem: "g>path".into(),
            ..RoleSelectors::default()
        };
        assert!(NotationGeometrySnapshot::from_markup(PAGE, &roles).is_err());
    }
}
