//! Output wiring primitives: path segments, vias and patch wires.

use crate::db::indices::{LayerId, ViaDefId};
use crate::geom::Coord;
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use serde::{Deserialize, Serialize};

/// How far a segment's metal reaches past one of its endpoints.
///
/// Ordered by how much room an end claims, so `max` never shrinks an extension.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStyle {
    #[default]
    Truncate,
    Variable,
    Extend,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegEnd {
    pub style: EndStyle,
    pub ext: Coord,
}

impl SegEnd {
    pub const TRUNCATE: SegEnd = SegEnd {
        style: EndStyle::Truncate,
        ext: 0,
    };

    pub fn new(style: EndStyle, ext: Coord) -> Self {
        Self { style, ext }
    }

    pub fn extend(ext: Coord) -> Self {
        Self {
            style: EndStyle::Extend,
            ext,
        }
    }

    /// Distance the metal actually covers past the endpoint.
    pub fn reach(&self) -> Coord {
        match self.style {
            EndStyle::Truncate => 0,
            EndStyle::Extend | EndStyle::Variable => self.ext,
        }
    }

    /// The end claiming more room, ties broken by style.
    pub fn max(self, other: SegEnd) -> SegEnd {
        if (other.reach(), other.style) > (self.reach(), self.style) {
            other
        } else {
            self
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegStyle {
    pub width: Coord,
    pub begin: SegEnd,
    pub end: SegEnd,
}

impl SegStyle {
    pub fn uniform(width: Coord, end: SegEnd) -> Self {
        Self {
            width,
            begin: end,
            end,
        }
    }

    fn reversed(self) -> Self {
        Self {
            width: self.width,
            begin: self.end,
            end: self.begin,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A straight wire. `begin` is always the lower endpoint along the wire's axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSeg {
    pub layer: LayerId,
    pub begin: Point,
    pub end: Point,
    pub style: SegStyle,
}

impl PathSeg {
    pub fn new(layer: LayerId, a: Point, b: Point, style: SegStyle) -> Self {
        if (b.x, b.y) < (a.x, a.y) {
            Self {
                layer,
                begin: b,
                end: a,
                style: style.reversed(),
            }
        } else {
            Self {
                layer,
                begin: a,
                end: b,
                style,
            }
        }
    }

    pub fn is_zero_length(&self) -> bool {
        self.begin == self.end
    }

    /// `None` for zero-length or diagonal segments.
    pub fn orientation(&self) -> Option<Orientation> {
        match (self.begin.x == self.end.x, self.begin.y == self.end.y) {
            (false, true) => Some(Orientation::Horizontal),
            (true, false) => Some(Orientation::Vertical),
            _ => None,
        }
    }

    /// Coordinate of the track the segment runs on.
    pub fn track(&self) -> Coord {
        match self.orientation() {
            Some(Orientation::Vertical) => self.begin.x,
            _ => self.begin.y,
        }
    }

    /// `(low, high)` extent along the wire's axis.
    pub fn span(&self) -> (Coord, Coord) {
        match self.orientation() {
            Some(Orientation::Vertical) => (self.begin.y, self.end.y),
            _ => (self.begin.x, self.end.x),
        }
    }

    pub fn length(&self) -> Coord {
        self.begin.manhattan(self.end)
    }

    /// Metal footprint including width and end extensions.
    pub fn bbox(&self) -> Rect {
        let hw = self.style.width / 2;
        let (b, e) = (self.style.begin.reach(), self.style.end.reach());
        match self.orientation() {
            Some(Orientation::Vertical) => Rect::new(
                Point::new(self.begin.x - hw, self.begin.y - b),
                Point::new(self.end.x + hw, self.end.y + e),
            ),
            _ => Rect::new(
                Point::new(self.begin.x - b, self.begin.y - hw),
                Point::new(self.end.x + e, self.end.y + hw),
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Via {
    pub origin: Point,
    pub def: ViaDefId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchWire {
    pub layer: LayerId,
    pub origin: Point,
    pub offset_box: Rect,
}

impl PatchWire {
    pub fn bbox(&self) -> Rect {
        Rect::new(
            self.origin + self.offset_box.min,
            self.origin + self.offset_box.max,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnFig {
    PathSeg(PathSeg),
    Via(Via),
    PatchWire(PatchWire),
}

impl From<PathSeg> for ConnFig {
    fn from(s: PathSeg) -> Self {
        ConnFig::PathSeg(s)
    }
}

impl From<Via> for ConnFig {
    fn from(v: Via) -> Self {
        ConnFig::Via(v)
    }
}

impl From<PatchWire> for ConnFig {
    fn from(p: PatchWire) -> Self {
        ConnFig::PatchWire(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_endpoints_and_swaps_styles() {
        let style = SegStyle {
            width: 10,
            begin: SegEnd::extend(5),
            end: SegEnd::TRUNCATE,
        };
        let s = PathSeg::new(LayerId(2), Point::new(200, 100), Point::new(0, 100), style);
        assert_eq!(s.begin, Point::new(0, 100));
        assert_eq!(s.end, Point::new(200, 100));
        assert_eq!(s.style.begin, SegEnd::TRUNCATE);
        assert_eq!(s.style.end, SegEnd::extend(5));
        assert_eq!(s.orientation(), Some(Orientation::Horizontal));
        assert_eq!(s.track(), 100);
        assert_eq!(s.span(), (0, 200));
    }

    #[test]
    fn max_prefers_longer_reach() {
        let a = SegEnd::new(EndStyle::Truncate, 50);
        let b = SegEnd::extend(10);
        assert_eq!(a.max(b), b);
        assert_eq!(b.max(SegEnd::extend(30)), SegEnd::extend(30));
        assert_eq!(SegEnd::TRUNCATE.max(SegEnd::TRUNCATE), SegEnd::TRUNCATE);
    }

    #[test]
    fn bbox_includes_extension() {
        let style = SegStyle::uniform(20, SegEnd::extend(10));
        let s = PathSeg::new(LayerId(0), Point::new(0, 0), Point::new(0, 100), style);
        assert_eq!(s.bbox(), Rect::from_array([-10, -10, 10, 110]));
    }
}
