//! Tile paths to GSegments, and GSegments to route guides.

use crate::utils::conversion::GridConverter;
use std::collections::BTreeMap;
use vroute_common::db::core::Tech;
use vroute_common::db::parser::guide::Guide;
use vroute_common::db::route::GSegment;
use vroute_common::geom::coord::GridCoord;
use vroute_common::geom::rect::Rect;

/// Collapses a tile path into maximal straight runs.
pub fn path_to_segments(path: &[GridCoord]) -> Vec<GSegment> {
    let mut out = Vec::new();
    if path.len() < 2 {
        return out;
    }
    let mut start = path[0];
    let mut prev = path[0];
    let mut axis = None;
    for &c in &path[1..] {
        let step = axis_of(prev, c);
        if axis.is_some() && axis != step {
            out.push(GSegment::new(start, prev));
            start = prev;
        }
        axis = step;
        prev = c;
    }
    out.push(GSegment::new(start, prev));
    out
}

fn axis_of(a: GridCoord, b: GridCoord) -> Option<u8> {
    if a.x != b.x {
        Some(0)
    } else if a.y != b.y {
        Some(1)
    } else if a.z != b.z {
        Some(2)
    } else {
        None
    }
}

/// Line a segment lies on, and its extent along that line.
fn line_key(s: &GSegment) -> ((u8, u32, u32), u32, u32) {
    let (a, b) = (s.from, s.to);
    match axis_of(a, b) {
        Some(0) => ((0, a.y, a.z as u32), a.x.min(b.x), a.x.max(b.x)),
        Some(1) => ((1, a.x, a.z as u32), a.y.min(b.y), a.y.max(b.y)),
        _ => ((2, a.x, a.y), a.z.min(b.z) as u32, a.z.max(b.z) as u32),
    }
}

/// Merges overlapping or touching collinear segments and drops duplicates.
pub fn merge_segments(segments: &[GSegment]) -> Vec<GSegment> {
    let mut lines: BTreeMap<(u8, u32, u32), Vec<(u32, u32)>> = BTreeMap::new();
    for s in segments.iter().filter(|s| s.is_manhattan()) {
        let (key, lo, hi) = line_key(s);
        lines.entry(key).or_default().push((lo, hi));
    }
    let mut out = Vec::new();
    for ((axis, p, q), mut spans) in lines {
        spans.sort_unstable();
        let mut cur = spans[0];
        let mut flush = |(lo, hi): (u32, u32)| {
            let seg = match axis {
                0 => GSegment::new(GridCoord::new(lo, p, q as u8), GridCoord::new(hi, p, q as u8)),
                1 => GSegment::new(GridCoord::new(p, lo, q as u8), GridCoord::new(p, hi, q as u8)),
                _ => GSegment::new(GridCoord::new(p, q, lo as u8), GridCoord::new(p, q, hi as u8)),
            };
            out.push(seg);
        };
        for &(lo, hi) in &spans[1..] {
            if lo <= cur.1 {
                cur.1 = cur.1.max(hi);
            } else {
                flush(cur);
                cur = (lo, hi);
            }
        }
        flush(cur);
    }
    out
}

/// Via stack joining pins that share one tile on different layers.
pub fn local_connection(pins: &[GridCoord]) -> Vec<GSegment> {
    let (Some(lo), Some(hi)) = (
        pins.iter().map(|p| p.z).min(),
        pins.iter().map(|p| p.z).max(),
    ) else {
        return Vec::new();
    };
    if lo == hi {
        return Vec::new();
    }
    let p = pins[0];
    vec![GSegment::new(p.with_layer(lo), p.with_layer(hi))]
}

/// Tile-aligned guide rectangles for a net's segments and pin tiles.
pub fn net_guides(
    tech: &Tech,
    conv: &GridConverter,
    segments: &[GSegment],
    pins: &[GridCoord],
) -> Vec<Guide> {
    let mut boxes: Vec<(u8, Rect)> = Vec::new();
    for s in segments {
        let (a, b) = (s.from, s.to);
        let rect = conv
            .tile_rect(a.x.min(b.x), a.y.min(b.y))
            .merge(&conv.tile_rect(a.x.max(b.x), a.y.max(b.y)));
        for z in a.z.min(b.z)..=a.z.max(b.z) {
            boxes.push((z, rect));
        }
    }
    for p in pins {
        boxes.push((p.z, conv.tile_rect(p.x, p.y)));
    }

    let mut by_layer: BTreeMap<u8, Vec<Rect>> = BTreeMap::new();
    for (z, r) in boxes {
        by_layer.entry(z).or_default().push(r);
    }
    let mut guides = Vec::new();
    for (z, rects) in by_layer {
        let Some(layer) = tech.routing_layer(z).map(|l| l.id) else {
            continue;
        };
        guides.extend(
            merge_boxes(rects)
                .into_iter()
                .map(|rect| Guide { layer, rect }),
        );
    }
    guides
}

/// Repeatedly fuses boxes whose union is itself a box: contained boxes, and
/// boxes sharing a full side span that overlap or abut along the other axis.
pub fn merge_boxes(mut rects: Vec<Rect>) -> Vec<Rect> {
    rects.sort_by_key(|r| (r.min.x, r.min.y, r.max.x, r.max.y));
    rects.dedup();
    loop {
        let mut merged = false;
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                if let Some(u) = union_box(&rects[i], &rects[j]) {
                    rects[i] = u;
                    rects.swap_remove(j);
                    merged = true;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged {
            break;
        }
    }
    rects.sort_by_key(|r| (r.min.x, r.min.y, r.max.x, r.max.y));
    rects
}

fn union_box(a: &Rect, b: &Rect) -> Option<Rect> {
    if a.contains_rect(b) {
        return Some(*a);
    }
    if b.contains_rect(a) {
        return Some(*b);
    }
    let same_x = a.min.x == b.min.x && a.max.x == b.max.x;
    let same_y = a.min.y == b.min.y && a.max.y == b.max.y;
    let touch_y = a.min.y <= b.max.y && b.min.y <= a.max.y;
    let touch_x = a.min.x <= b.max.x && b.min.x <= a.max.x;
    if (same_x && touch_y) || (same_y && touch_x) {
        Some(a.merge(b))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vroute_common::geom::point::Point;

    fn g(x: u32, y: u32, z: u8) -> GridCoord {
        GridCoord::new(x, y, z)
    }

    #[test]
    fn path_collapses_into_runs() {
        let path = [g(0, 0, 0), g(1, 0, 0), g(2, 0, 0), g(2, 0, 1), g(2, 1, 1), g(2, 2, 1)];
        assert_eq!(
            path_to_segments(&path),
            vec![
                GSegment::new(g(0, 0, 0), g(2, 0, 0)),
                GSegment::new(g(2, 0, 0), g(2, 0, 1)),
                GSegment::new(g(2, 0, 1), g(2, 2, 1)),
            ]
        );
        assert!(path_to_segments(&[g(1, 1, 1)]).is_empty());
    }

    #[test]
    fn collinear_segments_merge() {
        let segs = [
            GSegment::new(g(0, 0, 0), g(2, 0, 0)),
            GSegment::new(g(4, 0, 0), g(2, 0, 0)),
            GSegment::new(g(6, 0, 0), g(7, 0, 0)),
            GSegment::new(g(0, 0, 0), g(2, 0, 0)),
        ];
        assert_eq!(
            merge_segments(&segs),
            vec![
                GSegment::new(g(0, 0, 0), g(4, 0, 0)),
                GSegment::new(g(6, 0, 0), g(7, 0, 0)),
            ]
        );
    }

    #[test]
    fn local_nets_get_a_via_stack() {
        assert_eq!(
            local_connection(&[g(3, 3, 0), g(3, 3, 2)]),
            vec![GSegment::new(g(3, 3, 0), g(3, 3, 2))]
        );
        assert!(local_connection(&[g(3, 3, 1), g(3, 3, 1)]).is_empty());
    }

    #[test]
    fn boxes_merge_only_into_rectangles() {
        let a = Rect::from_array([0, 0, 100, 100]);
        let b = Rect::from_array([100, 0, 300, 100]);
        let c = Rect::from_array([200, 100, 300, 400]);
        let inner = Rect::from_array([10, 10, 20, 20]);
        let merged = merge_boxes(vec![c, inner, b, a]);
        assert_eq!(
            merged,
            vec![Rect::from_array([0, 0, 300, 100]), c]
        );
        assert_eq!(
            union_box(&a, &Rect::new(Point::new(0, 50), Point::new(100, 200))),
            Some(Rect::from_array([0, 0, 100, 200]))
        );
    }
}
