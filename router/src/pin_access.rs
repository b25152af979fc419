//! Access point generation for pin shapes.
//!
//! Candidates come in five kinds, best first: track crossings inside the shape,
//! half-track crossings, the shape center, positions that keep the via cut
//! enclosed, and the nearest crossing outside the shape.

use crate::grid::adjust::LayerTracks;
use vroute_common::db::core::{DesignDB, PinData, PinShape};
use vroute_common::geom::Coord;
use vroute_common::geom::point::Point;
use vroute_common::geom::rect::Rect;

/// Cap on candidates per axis so huge pins stay cheap.
const MAX_PER_AXIS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessKind {
    OnGrid,
    HalfGrid,
    Center,
    Enclose,
    Nearby,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessPoint {
    pub point: Point,
    /// Routing layer index of the shape.
    pub z: u8,
    pub kind: AccessKind,
}

/// Track positions `origin + k * pitch` along one axis.
#[derive(Clone, Copy, Debug)]
struct Axis {
    origin: Coord,
    pitch: Coord,
}

impl Axis {
    fn first_at_or_above(&self, v: Coord) -> Coord {
        let k = -(-(v - self.origin)).div_euclid(self.pitch);
        self.origin + k * self.pitch
    }

    fn last_at_or_below(&self, v: Coord) -> Coord {
        self.origin + (v - self.origin).div_euclid(self.pitch) * self.pitch
    }

    /// Tracks inside `[lo, hi]`, nearest to `mid` first.
    fn within(&self, lo: Coord, hi: Coord, mid: Coord) -> Vec<Coord> {
        let mut out = Vec::new();
        let mut t = self.first_at_or_above(lo);
        while t <= hi {
            out.push(t);
            t += self.pitch;
        }
        out.sort_by_key(|&t| ((t - mid).abs(), t));
        out.truncate(MAX_PER_AXIS);
        out
    }

    /// Half-track positions inside `[lo, hi]`, nearest to `mid` first.
    fn halves_within(&self, lo: Coord, hi: Coord, mid: Coord) -> Vec<Coord> {
        let half = Axis {
            origin: self.origin + self.pitch / 2,
            pitch: self.pitch,
        };
        if self.pitch < 2 {
            return Vec::new();
        }
        half.within(lo, hi, mid)
    }

    fn nearest(&self, v: Coord) -> Coord {
        let below = self.last_at_or_below(v);
        let above = below + self.pitch;
        if v - below <= above - v { below } else { above }
    }
}

fn dist(a: Point, b: Point) -> Coord {
    a.manhattan(b)
}

fn candidates(shape: &PinShape, z: u8, tracks: &LayerTracks, via_cut: Option<Rect>) -> Vec<AccessPoint> {
    let r = shape.rect;
    let c = r.center();
    let xs = Axis {
        origin: tracks.origin.x,
        pitch: tracks.pitch,
    };
    let ys = Axis {
        origin: tracks.origin.y,
        pitch: tracks.pitch,
    };
    let mut out = Vec::new();
    let mut push = |x: Coord, y: Coord, kind: AccessKind| {
        out.push(AccessPoint {
            point: Point::new(x, y),
            z,
            kind,
        })
    };

    let on_x = xs.within(r.min.x, r.max.x, c.x);
    let on_y = ys.within(r.min.y, r.max.y, c.y);
    for &x in &on_x {
        for &y in &on_y {
            push(x, y, AccessKind::OnGrid);
        }
    }

    let half_x = xs.halves_within(r.min.x, r.max.x, c.x);
    let half_y = ys.halves_within(r.min.y, r.max.y, c.y);
    for &x in on_x.iter().chain(&half_x) {
        for &y in on_y.iter().chain(&half_y) {
            if half_x.contains(&x) || half_y.contains(&y) {
                push(x, y, AccessKind::HalfGrid);
            }
        }
    }

    push(c.x, c.y, AccessKind::Center);

    if let Some(cut) = via_cut {
        // Origins whose cut box stays inside the shape.
        let lo_x = r.min.x - cut.min.x;
        let hi_x = r.max.x - cut.max.x;
        let lo_y = r.min.y - cut.min.y;
        let hi_y = r.max.y - cut.max.y;
        if lo_x <= hi_x && lo_y <= hi_y {
            let x = xs.nearest(c.x).clamp(lo_x, hi_x);
            let y = ys.nearest(c.y).clamp(lo_y, hi_y);
            push(x, y, AccessKind::Enclose);
        }
    }

    push(xs.nearest(c.x), ys.nearest(c.y), AccessKind::Nearby);
    out
}

/// Ranked access candidates for every routing-layer shape of `pin`.
pub fn access_points(db: &DesignDB, pin: &PinData, tracks: &[LayerTracks]) -> Vec<AccessPoint> {
    let mut all = Vec::new();
    for shape in &pin.shapes {
        let Some(z) = db.tech.layer(shape.layer).routing_index else {
            continue;
        };
        let Some(t) = tracks.get(z as usize) else {
            continue;
        };
        let via_cut = db
            .tech
            .default_via(z)
            .map(|v| db.tech.via_def(v).cut_rect);
        let center = shape.rect.center();
        let mut found = candidates(shape, z, t, via_cut);
        found.retain(|ap| ap.kind != AccessKind::Nearby || !shape.rect.contains(ap.point));
        found.sort_by_key(|ap| (ap.kind, dist(ap.point, center), ap.z));
        all.extend(found);
    }
    all.sort_by_key(|ap| ap.kind);
    all
}

/// The preferred access point of `pin`, if it has any shape on a routing layer.
pub fn best_access(db: &DesignDB, pin: &PinData, tracks: &[LayerTracks]) -> Option<AccessPoint> {
    let best = access_points(db, pin, tracks).into_iter().min_by_key(|ap| {
        let center = pin
            .bbox()
            .map(|b| b.center())
            .unwrap_or(ap.point);
        (ap.kind, ap.z, dist(ap.point, center))
    });
    if best.is_none() {
        log::warn!("Pin {} has no shape on a routing layer", pin.name);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use vroute_common::db::core::{LayerDirection, LayerType, NetClass, Tech};
    use vroute_common::db::indices::LayerId;

    fn design() -> DesignDB {
        let mut tech = Tech::new();
        tech.add_layer("M1".into(), LayerType::Routing, LayerDirection::Horizontal, 100, 40)
            .unwrap();
        tech.add_layer("V1".into(), LayerType::Cut, LayerDirection::Unknown, 0, 20)
            .unwrap();
        tech.add_layer("M2".into(), LayerType::Routing, LayerDirection::Vertical, 100, 40)
            .unwrap();
        let names: Vec<String> = ["M1", "V1", "M2"].iter().map(|s| s.to_string()).collect();
        tech.add_via_def("VIA12".into(), &names, Rect::from_array([-10, -10, 10, 10]), true)
            .unwrap();
        DesignDB::new("t".into(), tech, Rect::from_array([0, 0, 2000, 2000]))
    }

    fn tracks() -> Vec<LayerTracks> {
        [(LayerId(0), LayerDirection::Horizontal), (LayerId(2), LayerDirection::Vertical)]
            .into_iter()
            .map(|(layer, direction)| LayerTracks {
                layer,
                direction,
                pitch: 100,
                origin: Point::new(50, 50),
            })
            .collect()
    }

    fn pin_with(db: &mut DesignDB, rect: [Coord; 4]) -> PinData {
        let net = db.add_net("n".into(), NetClass::Signal);
        let id = db
            .add_pin(
                net,
                "p".into(),
                vec![PinShape {
                    layer: LayerId(0),
                    rect: Rect::from_array(rect),
                }],
                false,
            )
            .unwrap();
        db.pin(id).clone()
    }

    #[rstest]
    #[case::covers_a_crossing([140, 140, 260, 160], AccessKind::OnGrid, Point::new(150, 150))]
    #[case::only_half_tracks([190, 120, 210, 180], AccessKind::HalfGrid, Point::new(200, 150))]
    #[case::between_tracks([160, 160, 190, 190], AccessKind::Center, Point::new(175, 175))]
    fn best_kind_by_shape(#[case] rect: [Coord; 4], #[case] kind: AccessKind, #[case] at: Point) {
        let mut db = design();
        let pin = pin_with(&mut db, rect);
        let best = best_access(&db, &pin, &tracks()).unwrap();
        assert_eq!(best.kind, kind);
        assert_eq!(best.point, at);
        assert_eq!(best.z, 0);
    }

    #[test]
    fn kinds_are_ranked_in_order() {
        let mut db = design();
        let pin = pin_with(&mut db, [100, 100, 400, 400]);
        let aps = access_points(&db, &pin, &tracks());
        assert!(aps.windows(2).all(|w| w[0].kind <= w[1].kind));
        assert_eq!(aps[0].point, Point::new(250, 250));
        assert!(aps.iter().any(|a| a.kind == AccessKind::Enclose));
    }

    #[test]
    fn nearby_lands_outside_the_shape() {
        let t = tracks();
        let shape = PinShape {
            layer: LayerId(0),
            rect: Rect::from_array([160, 160, 190, 190]),
        };
        let near = candidates(&shape, 0, &t[0], None)
            .into_iter()
            .find(|a| a.kind == AccessKind::Nearby)
            .unwrap();
        assert_eq!(near.point, Point::new(150, 150));
    }
}
