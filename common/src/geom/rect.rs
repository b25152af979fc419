use super::Coord;
use super::point::Point;
use serde::{Deserialize, Serialize};

/// Closed axis-aligned box, `min <= max` on both axes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Builds a normalized rect from two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_array(v: [Coord; 4]) -> Self {
        Self::from_corners(Point::new(v[0], v[1]), Point::new(v[2], v[3]))
    }

    pub fn width(&self) -> Coord {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> Coord {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) / 2, (self.min.y + self.max.y) / 2)
    }

    /// Interiors overlap; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Closed intersection test; touching edges count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect::new(
            Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    pub fn merge(&self, other: &Rect) -> Rect {
        Rect::new(
            Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    pub fn bloat(&self, d: Coord) -> Rect {
        Rect::new(
            Point::new(self.min.x - d, self.min.y - d),
            Point::new(self.max.x + d, self.max.y + d),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rects_intersect_but_do_not_overlap() {
        let a = Rect::from_array([0, 0, 10, 10]);
        let b = Rect::from_array([10, 0, 20, 10]);
        assert!(a.intersects(&b));
        assert!(!a.overlaps(&b));
        assert_eq!(a.intersection(&b), Some(Rect::from_array([10, 0, 10, 10])));
    }

    #[test]
    fn from_corners_normalizes() {
        let r = Rect::from_corners(Point::new(5, -1), Point::new(-3, 4));
        assert_eq!(r.min, Point::new(-3, -1));
        assert_eq!(r.max, Point::new(5, 4));
        assert_eq!(r.area(), 40);
    }
}
