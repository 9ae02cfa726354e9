//! SVG `transform` attribute support.
//!
//! Boxes are mapped by transforming their four corners and re-boxing the
//! result, which keeps rotated glyphs (e.g. tilted noteheads) conservatively
//! bounded.

use crate::model::BoundingBox;

/// 2D affine matrix in `matrix(a b c d e f)` form:
///
/// ```text
/// [a c e]
/// [b d f]
/// [0 0 1]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f64, ty: f64) -> Self {
        Affine { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn scale(sx: f64, sy: f64) -> Self {
        Affine { a: sx, d: sy, ..Self::IDENTITY }
    }

    fn rotate(deg: f64) -> Self {
        let (sin, cos) = deg.to_radians().sin_cos();
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self * other`: apply `other` first, then `self`.
    pub fn then_inner(&self, other: &Affine) -> Affine {
        Affine {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn apply_box(&self, b: &BoundingBox) -> BoundingBox {
        if self.is_identity() {
            return *b;
        }
        let corners = [
            self.apply(b.x, b.y),
            self.apply(b.right(), b.y),
            self.apply(b.x, b.bottom()),
            self.apply(b.right(), b.bottom()),
        ];
        let (mut min_x, mut min_y) = corners[0];
        let (mut max_x, mut max_y) = corners[0];
        for &(x, y) in &corners[1..] {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        BoundingBox::from_extents(min_x, min_y, max_x, max_y)
    }
}

/// Parse a transform list. Unknown or malformed operations end the list;
/// the operations parsed before them still apply.
pub fn parse_transform(raw: &str) -> Affine {
    let mut result = Affine::IDENTITY;
    let mut rest = raw.trim();

    while !rest.is_empty() {
        let Some(open) = rest.find('(') else {
            break;
        };
        let name = rest[..open].trim().trim_start_matches(',').trim();
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        let args: Vec<f64> = after[..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map_while(|s| s.parse::<f64>().ok())
            .collect();

        let op = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Affine {
                a: *a,
                b: *b,
                c: *c,
                d: *d,
                e: *e,
                f: *f,
            },
            ("translate", [tx]) => Affine::translate(*tx, 0.0),
            ("translate", [tx, ty]) => Affine::translate(*tx, *ty),
            ("scale", [s]) => Affine::scale(*s, *s),
            ("scale", [sx, sy]) => Affine::scale(*sx, *sy),
            ("rotate", [deg]) => Affine::rotate(*deg),
            ("rotate", [deg, cx, cy]) => Affine::translate(*cx, *cy)
                .then_inner(&Affine::rotate(*deg))
                .then_inner(&Affine::translate(-cx, -cy)),
            ("skewX", [deg]) => Affine {
                c: deg.to_radians().tan(),
                ..Affine::IDENTITY
            },
            ("skewY", [deg]) => Affine {
                b: deg.to_radians().tan(),
                ..Affine::IDENTITY
            },
            _ => break,
        };
        result = result.then_inner(&op);
        rest = after[close + 1..].trim();
    }

    result
}
