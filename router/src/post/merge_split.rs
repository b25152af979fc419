//! Merge/split pass over a net's final wiring.
//!
//! 1. Collinear segments on one track merge into maximal runs.
//! 2. Runs on either metal layer of a via are cut at the via origin.
//! 3. Perpendicular runs on one layer that cross are cut at the crossing.
//!
//! Cuts get the layer's default end style at the new endpoints.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use vroute_common::db::conn_fig::{ConnFig, Orientation, PatchWire, PathSeg, SegEnd, SegStyle, Via};
use vroute_common::db::core::Tech;
use vroute_common::db::indices::LayerId;
use vroute_common::db::parser::geometry::NetGeometry;
use vroute_common::geom::Coord;
use vroute_common::geom::point::Point;

type TrackKey = (LayerId, Orientation, Coord);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSplitStats {
    pub segments_in: usize,
    pub segments_out: usize,
    pub dropped: usize,
    pub duplicate_vias: usize,
    pub via_splits: usize,
    pub crossing_splits: usize,
}

fn seg_on(layer: LayerId, o: Orientation, track: Coord, lo: Coord, hi: Coord, style: SegStyle) -> PathSeg {
    let (a, b) = match o {
        Orientation::Horizontal => (Point::new(lo, track), Point::new(hi, track)),
        Orientation::Vertical => (Point::new(track, lo), Point::new(track, hi)),
    };
    PathSeg::new(layer, a, b, style)
}

/// Cuts `seg` at `pos` along its axis if `pos` lies strictly inside it.
fn cut(tech: &Tech, seg: &PathSeg, pos: Coord) -> Option<(PathSeg, PathSeg)> {
    let o = seg.orientation()?;
    let (lo, hi) = seg.span();
    if pos <= lo || pos >= hi {
        return None;
    }
    let at = tech.layer(seg.layer).default_style();
    let left = SegStyle {
        end: at.end,
        ..seg.style
    };
    let right = SegStyle {
        begin: at.begin,
        ..seg.style
    };
    let track = seg.track();
    Some((
        seg_on(seg.layer, o, track, lo, pos, left),
        seg_on(seg.layer, o, track, pos, hi, right),
    ))
}

/// Sweep over one track. Touching or overlapping segments fuse; width and
/// end styles are the largest among the segments sharing each end.
fn merge_track(key: TrackKey, segs: Vec<PathSeg>) -> Vec<PathSeg> {
    let (layer, o, track) = key;
    // (coordinate, 0 = open / 1 = close, segment)
    let mut events: Vec<(Coord, u8, usize)> = Vec::with_capacity(segs.len() * 2);
    for (i, s) in segs.iter().enumerate() {
        let (lo, hi) = s.span();
        events.push((lo, 0, i));
        events.push((hi, 1, i));
    }
    events.sort_unstable();

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut group: Vec<usize> = Vec::new();
    for (pos, kind, i) in events {
        if kind == 0 {
            if depth == 0 {
                start = pos;
                group.clear();
            }
            depth += 1;
            group.push(i);
            continue;
        }
        depth -= 1;
        if depth > 0 {
            continue;
        }
        let mut width = 0;
        let mut begin: Option<SegEnd> = None;
        let mut end: Option<SegEnd> = None;
        for &g in &group {
            let s = &segs[g];
            let (lo, hi) = s.span();
            width = width.max(s.style.width);
            if lo == start {
                begin = Some(begin.map_or(s.style.begin, |b| b.max(s.style.begin)));
            }
            if hi == pos {
                end = Some(end.map_or(s.style.end, |e| e.max(s.style.end)));
            }
        }
        let style = SegStyle {
            width,
            begin: begin.unwrap_or(SegEnd::TRUNCATE),
            end: end.unwrap_or(SegEnd::TRUNCATE),
        };
        out.push(seg_on(layer, o, track, start, pos, style));
    }
    out
}

fn track_key(s: &PathSeg) -> Option<TrackKey> {
    s.orientation().map(|o| (s.layer, o, s.track()))
}

/// Runs the three passes on one net's wiring.
pub fn merge_split(tech: &Tech, figs: &[ConnFig]) -> (Vec<ConnFig>, MergeSplitStats) {
    let mut stats = MergeSplitStats::default();
    let mut tracks: BTreeMap<TrackKey, Vec<PathSeg>> = BTreeMap::new();
    let mut vias: Vec<Via> = Vec::new();
    let mut patches: Vec<PatchWire> = Vec::new();
    let mut seen_vias = HashSet::new();

    for fig in figs {
        match fig {
            ConnFig::PathSeg(s) => {
                stats.segments_in += 1;
                match track_key(s) {
                    Some(key) => tracks.entry(key).or_default().push(*s),
                    None => stats.dropped += 1,
                }
            }
            ConnFig::Via(v) => {
                let cut_layer = tech.via_def(v.def).cut;
                if seen_vias.insert((v.origin, cut_layer)) {
                    vias.push(*v);
                } else {
                    stats.duplicate_vias += 1;
                }
            }
            ConnFig::PatchWire(p) => patches.push(*p),
        }
    }

    let mut tracks: BTreeMap<TrackKey, Vec<PathSeg>> = tracks
        .into_iter()
        .map(|(key, segs)| (key, merge_track(key, segs)))
        .collect();

    for v in &vias {
        let def = tech.via_def(v.def);
        for layer in [def.bottom, def.top] {
            for (o, track, pos) in [
                (Orientation::Horizontal, v.origin.y, v.origin.x),
                (Orientation::Vertical, v.origin.x, v.origin.y),
            ] {
                let Some(segs) = tracks.get_mut(&(layer, o, track)) else {
                    continue;
                };
                let Some((i, (a, b))) = segs
                    .iter()
                    .enumerate()
                    .find_map(|(i, s)| cut(tech, s, pos).map(|p| (i, p)))
                else {
                    continue;
                };
                segs[i] = a;
                segs.insert(i + 1, b);
                stats.via_splits += 1;
            }
        }
    }

    let mut by_layer: BTreeMap<LayerId, (Vec<PathSeg>, Vec<PathSeg>)> = BTreeMap::new();
    for ((layer, o, _), segs) in tracks {
        let entry = by_layer.entry(layer).or_default();
        match o {
            Orientation::Horizontal => entry.0.extend(segs),
            Orientation::Vertical => entry.1.extend(segs),
        }
    }

    let mut out: Vec<ConnFig> = Vec::new();
    for (_, (horizontal, vertical)) in by_layer {
        let (h, v, splits) = split_crossings(tech, horizontal, vertical);
        stats.crossing_splits += splits;
        out.extend(h.into_iter().chain(v).map(ConnFig::from));
    }
    stats.segments_out = out.len();
    out.extend(vias.into_iter().map(ConnFig::from));
    out.extend(patches.into_iter().map(ConnFig::from));
    (out, stats)
}

/// Cuts crossing horizontal/vertical pairs at their intersection.
///
/// A vertical run stops scanning the horizontal list after its first split;
/// its pieces are rescanned, so one pair is cut at most once.
fn split_crossings(
    tech: &Tech,
    mut horizontal: Vec<PathSeg>,
    vertical: Vec<PathSeg>,
) -> (Vec<PathSeg>, Vec<PathSeg>, usize) {
    let mut splits = 0;
    let mut done = Vec::with_capacity(vertical.len());
    let mut queue = vertical;
    while let Some(v) = queue.pop() {
        let (vlo, vhi) = v.span();
        let x = v.track();
        let mut hit = None;
        for (i, h) in horizontal.iter().enumerate() {
            let (hlo, hhi) = h.span();
            let y = h.track();
            if y < vlo || y > vhi || x < hlo || x > hhi {
                continue;
            }
            let vcut = cut(tech, &v, y);
            let hcut = cut(tech, h, x);
            if vcut.is_some() || hcut.is_some() {
                hit = Some((i, vcut, hcut));
                break;
            }
        }
        match hit {
            Some((i, vcut, hcut)) => {
                splits += 1;
                if let Some((a, b)) = hcut {
                    horizontal[i] = a;
                    horizontal.push(b);
                }
                match vcut {
                    Some((a, b)) => {
                        queue.push(a);
                        queue.push(b);
                    }
                    None => queue.push(v),
                }
            }
            None => done.push(v),
        }
    }
    horizontal.sort_by_key(|s| (s.track(), s.span()));
    done.sort_by_key(|s| (s.track(), s.span()));
    (horizontal, done, splits)
}

/// Runs [`merge_split`] on every net in parallel.
pub fn merge_split_nets(tech: &Tech, nets: &[NetGeometry]) -> (Vec<NetGeometry>, MergeSplitStats) {
    let results: Vec<(NetGeometry, MergeSplitStats)> = nets
        .par_iter()
        .map(|(net, figs)| {
            let (out, stats) = merge_split(tech, figs);
            ((*net, out), stats)
        })
        .collect();
    let mut total = MergeSplitStats::default();
    let mut out = Vec::with_capacity(results.len());
    for (geom, s) in results {
        total.segments_in += s.segments_in;
        total.segments_out += s.segments_out;
        total.dropped += s.dropped;
        total.duplicate_vias += s.duplicate_vias;
        total.via_splits += s.via_splits;
        total.crossing_splits += s.crossing_splits;
        out.push(geom);
    }
    log::info!(
        "Merge/split: {} segments in, {} out ({} dropped), {} via splits, {} crossing splits, {} duplicate vias",
        total.segments_in,
        total.segments_out,
        total.dropped,
        total.via_splits,
        total.crossing_splits,
        total.duplicate_vias
    );
    (out, total)
}
