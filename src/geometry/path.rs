//! Path-data interpreter. Walks an SVG `d` attribute and reports every
//! coordinate it references.
//!
//! Curves are bounded by the envelope of their control points and arcs by
//! `endpoint ± radii`. Both over-approximate the true outline on purpose:
//! tightening them would change which renderings get flagged.

use std::ops::ControlFlow;

use crate::model::{BoundingBox, Point};

/// One interpreted drawing step, in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PathStep {
    Move(Point),
    Line(Point),
    Cubic { c1: Point, c2: Point, to: Point },
    Quadratic { c: Point, to: Point },
    Arc { rx: f64, ry: f64, to: Point },
    Close(Point),
}

/// Bounding envelope of every coordinate referenced by the path.
///
/// Truncated or malformed data stops the walk; whatever was accumulated up to
/// that point is returned, or `None` if no point was ever included.
pub fn path_bounds(d: &str) -> Option<BoundingBox> {
    let mut env = Envelope::default();
    walk_path(d, |step| {
        match step {
            PathStep::Move(p) | PathStep::Line(p) | PathStep::Close(p) => env.include(p),
            PathStep::Cubic { c1, c2, to } => {
                env.include(c1);
                env.include(c2);
                env.include(to);
            }
            PathStep::Quadratic { c, to } => {
                env.include(c);
                env.include(to);
            }
            PathStep::Arc { rx, ry, to } => {
                env.include(to);
                env.include(Point { x: to.x - rx.abs(), y: to.y - ry.abs() });
                env.include(Point { x: to.x + rx.abs(), y: to.y + ry.abs() });
            }
        }
        ControlFlow::Continue(())
    });
    env.finish()
}

/// Start and end anchor of the first subpath, ignoring control points.
///
/// Returns `None` when the path does not begin with a moveto or has no
/// drawing step after it.
pub fn first_subpath_anchors(d: &str) -> Option<(Point, Point)> {
    let mut start: Option<Point> = None;
    let mut end: Option<Point> = None;
    let mut broken = false;
    walk_path(d, |step| {
        match (step, start) {
            (PathStep::Move(p), None) => {
                start = Some(p);
                ControlFlow::Continue(())
            }
            (_, None) => {
                broken = true;
                ControlFlow::Break(())
            }
            (PathStep::Move(_), Some(_)) => ControlFlow::Break(()),
            (PathStep::Close(p), Some(_)) => {
                end = Some(p);
                ControlFlow::Break(())
            }
            (PathStep::Line(to), Some(_))
            | (PathStep::Cubic { to, .. }, Some(_))
            | (PathStep::Quadratic { to, .. }, Some(_))
            | (PathStep::Arc { to, .. }, Some(_)) => {
                end = Some(to);
                ControlFlow::Continue(())
            }
        }
    });
    if broken {
        return None;
    }
    Some((start?, end?))
}

/// Whether the path uses a cubic Bézier command anywhere.
pub fn contains_cubic(d: &str) -> bool {
    d.bytes().any(|b| matches!(b, b'C' | b'c' | b'S' | b's'))
}

// ═══════════════════════════════════════════════════════════════════════
// Walker
// ═══════════════════════════════════════════════════════════════════════

pub(crate) fn walk_path(d: &str, mut visit: impl FnMut(PathStep) -> ControlFlow<()>) {
    let mut lexer = PathLexer::new(d);
    let mut state = WalkState::default();
    let mut command: Option<u8> = None;

    while !lexer.at_end() {
        if let Some(letter) = lexer.take_command() {
            if !is_command(letter) {
                return;
            }
            command = Some(letter);
            if letter == b'Z' || letter == b'z' {
                if state.close(&mut visit).is_break() {
                    return;
                }
                continue;
            }
        }

        // Numbers with no command in effect, or trailing a closepath.
        let current = match command {
            Some(c) if c != b'Z' && c != b'z' => c,
            _ => return,
        };

        match state.apply(current, &mut lexer, &mut visit) {
            Some(ControlFlow::Continue(())) => {}
            Some(ControlFlow::Break(())) | None => return,
        }

        // Extra coordinate pairs after a moveto are implicit linetos.
        command = match current {
            b'M' => Some(b'L'),
            b'm' => Some(b'l'),
            other => Some(other),
        };
    }
}

fn is_command(letter: u8) -> bool {
    matches!(
        letter.to_ascii_uppercase(),
        b'M' | b'L' | b'H' | b'V' | b'C' | b'S' | b'Q' | b'T' | b'A' | b'Z'
    )
}

#[derive(Default)]
struct WalkState {
    cursor: Point,
    start: Point,
    last_cubic: Option<Point>,
    last_quad: Option<Point>,
}

impl WalkState {
    fn close(&mut self, visit: &mut impl FnMut(PathStep) -> ControlFlow<()>) -> ControlFlow<()> {
        self.cursor = self.start;
        self.last_cubic = None;
        self.last_quad = None;
        visit(PathStep::Close(self.start))
    }

    /// Consume one parameter group for `command`. `None` means the data ran
    /// out or was malformed.
    fn apply(
        &mut self,
        command: u8,
        lexer: &mut PathLexer<'_>,
        visit: &mut impl FnMut(PathStep) -> ControlFlow<()>,
    ) -> Option<ControlFlow<()>> {
        let relative = command.is_ascii_lowercase();
        let origin = if relative { self.cursor } else { Point::default() };

        let step = match command.to_ascii_uppercase() {
            b'M' => {
                let p = lexer.point(origin)?;
                self.start = p;
                self.cursor = p;
                self.last_cubic = None;
                self.last_quad = None;
                PathStep::Move(p)
            }
            b'L' => {
                let p = lexer.point(origin)?;
                self.cursor = p;
                self.last_cubic = None;
                self.last_quad = None;
                PathStep::Line(p)
            }
            b'H' => {
                let x = lexer.number()? + origin.x;
                self.cursor = Point { x, y: self.cursor.y };
                self.last_cubic = None;
                self.last_quad = None;
                PathStep::Line(self.cursor)
            }
            b'V' => {
                let y = lexer.number()? + origin.y;
                self.cursor = Point { x: self.cursor.x, y };
                self.last_cubic = None;
                self.last_quad = None;
                PathStep::Line(self.cursor)
            }
            b'C' => {
                let c1 = lexer.point(origin)?;
                let c2 = lexer.point(origin)?;
                let to = lexer.point(origin)?;
                self.cursor = to;
                self.last_cubic = Some(c2);
                self.last_quad = None;
                PathStep::Cubic { c1, c2, to }
            }
            b'S' => {
                let c1 = reflect(self.last_cubic, self.cursor);
                let c2 = lexer.point(origin)?;
                let to = lexer.point(origin)?;
                self.cursor = to;
                self.last_cubic = Some(c2);
                self.last_quad = None;
                PathStep::Cubic { c1, c2, to }
            }
            b'Q' => {
                let c = lexer.point(origin)?;
                let to = lexer.point(origin)?;
                self.cursor = to;
                self.last_quad = Some(c);
                self.last_cubic = None;
                PathStep::Quadratic { c, to }
            }
            b'T' => {
                let c = reflect(self.last_quad, self.cursor);
                let to = lexer.point(origin)?;
                self.cursor = to;
                self.last_quad = Some(c);
                self.last_cubic = None;
                PathStep::Quadratic { c, to }
            }
            b'A' => {
                let rx = lexer.number()?;
                let ry = lexer.number()?;
                let _rotation = lexer.number()?;
                let _large_arc = lexer.flag()?;
                let _sweep = lexer.flag()?;
                let to = lexer.point(origin)?;
                self.cursor = to;
                self.last_cubic = None;
                self.last_quad = None;
                PathStep::Arc { rx, ry, to }
            }
            _ => return None,
        };

        Some(visit(step))
    }
}

fn reflect(control: Option<Point>, about: Point) -> Point {
    match control {
        Some(c) => Point {
            x: 2.0 * about.x - c.x,
            y: 2.0 * about.y - c.y,
        },
        None => about,
    }
}

#[derive(Default)]
struct Envelope {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    seen: bool,
}

impl Envelope {
    fn include(&mut self, p: Point) {
        if !self.seen {
            self.min_x = p.x;
            self.max_x = p.x;
            self.min_y = p.y;
            self.max_y = p.y;
            self.seen = true;
            return;
        }
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }

    fn finish(&self) -> Option<BoundingBox> {
        self.seen
            .then(|| BoundingBox::from_extents(self.min_x, self.min_y, self.max_x, self.max_y))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Lexer
// ═══════════════════════════════════════════════════════════════════════

struct PathLexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> PathLexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn skip_separators(&mut self) {
        while let Some(&b) = self.bytes().get(self.pos) {
            if b.is_ascii_whitespace() || b == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_separators();
        self.pos >= self.src.len()
    }

    /// Consume a command letter if one is next.
    fn take_command(&mut self) -> Option<u8> {
        self.skip_separators();
        let b = *self.bytes().get(self.pos)?;
        if b.is_ascii_alphabetic() {
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let bytes = self.bytes();
        let start = self.pos;
        let mut i = start;

        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let int_start = i;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        let mut digits = i - int_start;
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let frac_start = i;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            digits += i - frac_start;
        }
        if digits == 0 {
            return None;
        }
        if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
            let mut j = i + 1;
            if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                j += 1;
            }
            if bytes.get(j).is_some_and(u8::is_ascii_digit) {
                while bytes.get(j).is_some_and(u8::is_ascii_digit) {
                    j += 1;
                }
                i = j;
            }
        }

        let value: f64 = self.src[start..i].parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        self.pos = i;
        Some(value)
    }

    /// Arc flags may be written without separators ("a5 5 0 01 10 10").
    fn flag(&mut self) -> Option<bool> {
        self.skip_separators();
        let flag = match self.bytes().get(self.pos)? {
            b'0' => false,
            b'1' => true,
            _ => return None,
        };
        self.pos += 1;
        Some(flag)
    }

    fn point(&mut self, origin: Point) -> Option<Point> {
        let x = self.number()?;
        let y = self.number()?;
        Some(Point {
            x: origin.x + x,
            y: origin.y + y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extents(b: BoundingBox) -> (f64, f64, f64, f64) {
        (b.x, b.y, b.right(), b.bottom())
    }

    #[test]
    fn absolute_lines_and_close() {
        let b = path_bounds("M10 20 L30 40 L15 5 Z").unwrap();
        assert_eq!(extents(b), (10.0, 5.0, 30.0, 40.0));
    }

    #[test]
    fn relative_commands_accumulate_on_cursor() {
        let b = path_bounds("m10,10 l5,0 l0,5 h-20 v-30").unwrap();
        assert_eq!(extents(b), (-5.0, -15.0, 15.0, 15.0));
    }

    #[test]
    fn implicit_repetition_after_moveto() {
        let b = path_bounds("M0 0 10 10 20 -5").unwrap();
        assert_eq!(extents(b), (0.0, -5.0, 20.0, 10.0));
    }

    #[test]
    fn cubic_includes_control_points() {
        let b = path_bounds("M0 0 C0 -50 100 -50 100 0").unwrap();
        assert_eq!(extents(b), (0.0, -50.0, 100.0, 0.0));
    }

    #[test]
    fn smooth_cubic_includes_reflected_control() {
        // Reflection of (10,-10) about (20,0) is (30,10).
        let b = path_bounds("M0 0 C0 0 10 -10 20 0 S40 0 40 0").unwrap();
        assert_eq!(extents(b), (0.0, -10.0, 40.0, 10.0));
    }

    #[test]
    fn quadratic_and_smooth_quadratic() {
        let b = path_bounds("M0 0 Q10 20 20 0 T40 0").unwrap();
        // T reflects (10,20) about (20,0) → (30,-20)
        assert_eq!(extents(b), (0.0, -20.0, 40.0, 20.0));
    }

    #[test]
    fn arc_uses_radius_envelope_around_endpoint() {
        let b = path_bounds("M0 0 A5 3 0 0 1 10 0").unwrap();
        assert_eq!(extents(b), (0.0, -3.0, 15.0, 3.0));
    }

    #[test]
    fn arc_with_compact_flags() {
        let b = path_bounds("M0 0a5 5 0 0110 0").unwrap();
        assert_eq!(extents(b), (0.0, -5.0, 15.0, 5.0));
    }

    #[test]
    fn compact_number_forms() {
        let b = path_bounds("M.5.5L-1-2l1e1,2E0").unwrap();
        assert_eq!(extents(b), (-1.0, -2.0, 9.0, 0.5));
    }

    #[test]
    fn truncated_data_returns_partial_envelope() {
        let b = path_bounds("M0 0 L10 10 L20").unwrap();
        assert_eq!(extents(b), (0.0, 0.0, 10.0, 10.0));
        let b = path_bounds("M0 0 C5 5 6").unwrap();
        assert_eq!(extents(b), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn garbage_returns_none() {
        assert_eq!(path_bounds(""), None);
        assert_eq!(path_bounds("   "), None);
        assert_eq!(path_bounds("10 10"), None);
        assert_eq!(path_bounds("X 1 2"), None);
        assert_eq!(path_bounds("M"), None);
        assert_eq!(path_bounds("M 1e999 4"), None);
    }

    #[test]
    fn numbers_after_close_stop_the_walk() {
        let b = path_bounds("M0 0 L5 5 Z 100 100").unwrap();
        assert_eq!(extents(b), (0.0, 0.0, 5.0, 5.0));
    }

    #[test]
    fn first_subpath_anchors_ignore_controls_and_later_subpaths() {
        let (start, end) =
            first_subpath_anchors("M10 10 C10 -90 60 -90 60 50 M0 0 L500 500").unwrap();
        assert_eq!(start, Point { x: 10.0, y: 10.0 });
        assert_eq!(end, Point { x: 60.0, y: 50.0 });
    }

    #[test]
    fn first_subpath_anchors_requires_moveto() {
        assert_eq!(first_subpath_anchors("L10 10"), None);
        assert_eq!(first_subpath_anchors("M10 10"), None);
    }

    #[test]
    fn detects_cubic_commands() {
        assert!(contains_cubic("M0 0 c1 1 2 2 3 3"));
        assert!(contains_cubic("M0 0 S1 1 2 2"));
        assert!(!contains_cubic("M0 0 L1 1 Q2 2 3 3"));
    }
}
