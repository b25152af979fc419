//! Post-run verification of global routes and final wiring.

use crate::db::conn_fig::ConnFig;
use crate::db::core::Tech;
use crate::db::indices::{LayerId, NetId};
use crate::db::route::{GRoute, NetStatus};
use crate::geom::coord::GridCoord;
use crate::geom::rect::Rect;
use crate::geom::rtree::SpatialIndex;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Checks that every routed net is made of Manhattan hops and reaches all of its pin tiles.
/// `pin_tiles` is indexed by net.
pub fn check_routes(routes: &[GRoute], pin_tiles: &[Vec<GridCoord>]) -> Result<(), String> {
    log::info!("Verifying {} global routes...", routes.len());
    let errors = Mutex::new(Vec::new());

    routes.par_iter().for_each(|route| {
        if !matches!(route.status, NetStatus::Routed | NetStatus::Overflowed) {
            return;
        }
        if let Some(bad) = route.segments.iter().find(|s| !s.is_manhattan()) {
            errors.lock().unwrap_or_else(|e| e.into_inner()).push(format!(
                "{:?}: non-Manhattan segment {:?} -> {:?}",
                route.net, bad.from, bad.to
            ));
            return;
        }
        let pins = pin_tiles
            .get(route.net.index())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        if let Err(e) = check_connected(route, pins) {
            errors.lock().unwrap_or_else(|e| e.into_inner()).push(e);
        }
    });

    let errors = errors.into_inner().unwrap_or_else(|e| e.into_inner());
    if errors.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: All global routes are Manhattan and connected.");
        Ok(())
    } else {
        for e in errors.iter().take(20) {
            log::error!("{}", e);
        }
        log::error!("\x1b[31mFAIL\x1b[0m: {} route errors", errors.len());
        Err(errors.join("; "))
    }
}

fn check_connected(route: &GRoute, pins: &[GridCoord]) -> Result<(), String> {
    let Some(&start) = pins.first() else {
        return Ok(());
    };
    let mut adj: HashMap<GridCoord, Vec<GridCoord>> = HashMap::new();
    for seg in &route.segments {
        let tiles = seg.tiles();
        for w in tiles.windows(2) {
            adj.entry(w[0]).or_default().push(w[1]);
            adj.entry(w[1]).or_default().push(w[0]);
        }
        if tiles.len() == 1 {
            adj.entry(tiles[0]).or_default();
        }
    }

    // Pins may sit on any layer of their tile column.
    let planar = |c: GridCoord| (c.x, c.y);
    let mut seen: HashSet<GridCoord> = HashSet::new();
    let mut queue = VecDeque::new();
    for &n in adj.keys() {
        if planar(n) == planar(start) {
            seen.insert(n);
            queue.push_back(n);
        }
    }
    if queue.is_empty() {
        return if pins.iter().all(|p| planar(*p) == planar(start)) {
            Ok(())
        } else {
            Err(format!("{:?}: route does not touch first pin", route.net))
        };
    }
    while let Some(c) = queue.pop_front() {
        if let Some(next) = adj.get(&c) {
            for &n in next {
                if seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }
    let reached: HashSet<(u32, u32)> = seen.iter().map(|&c| planar(c)).collect();
    match pins.iter().find(|p| !reached.contains(&planar(**p))) {
        Some(p) => Err(format!("{:?}: pin tile {:?} not reached", route.net, p)),
        None => Ok(()),
    }
}

/// Checks `(usage, capacity)` pairs for overflow beyond `slack`.
pub fn check_capacity<I>(edges: I, slack: u32) -> Result<(), String>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let over = edges
        .into_iter()
        .filter(|&(usage, cap)| usage > cap.saturating_add(slack))
        .count();
    if over == 0 {
        log::info!("\x1b[32mPASS\x1b[0m: No edge exceeds its capacity.");
        Ok(())
    } else {
        log::error!("\x1b[31mFAIL\x1b[0m: {} overflowed edges", over);
        Err(format!("{} edges exceed capacity", over))
    }
}

#[derive(Clone, Copy)]
struct Shape {
    net: NetId,
    layer: LayerId,
    rect: Rect,
}

/// Looks for metal of two different nets overlapping on the same layer.
pub fn check_geometry(tech: &Tech, nets: &[(NetId, Vec<ConnFig>)]) -> Result<(), String> {
    log::info!("Checking final wiring for shorts...");
    let mut shapes = Vec::new();
    for (net, figs) in nets {
        for fig in figs {
            let (layer, rect) = match fig {
                ConnFig::PathSeg(s) => (s.layer, s.bbox()),
                ConnFig::PatchWire(p) => (p.layer, p.bbox()),
                ConnFig::Via(v) => {
                    let def = tech.via_def(v.def);
                    let r = def.cut_rect;
                    (
                        def.cut,
                        Rect::new(v.origin + r.min, v.origin + r.max),
                    )
                }
            };
            shapes.push(Shape {
                net: *net,
                layer,
                rect,
            });
        }
    }

    let mut by_layer: HashMap<LayerId, Vec<usize>> = HashMap::new();
    for (i, s) in shapes.iter().enumerate() {
        by_layer.entry(s.layer).or_default().push(i);
    }
    let indexes: HashMap<LayerId, SpatialIndex> = by_layer
        .into_iter()
        .map(|(layer, ids)| {
            (
                layer,
                SpatialIndex::bulk_load(ids.into_iter().map(|i| (shapes[i].rect, i))),
            )
        })
        .collect();

    let shorts: Vec<String> = shapes
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, s)| {
            let hits = indexes
                .get(&s.layer)
                .map(|idx| idx.query(s.rect))
                .unwrap_or_default();
            hits.into_iter()
                .filter(move |&j| j > i)
                .filter(|&j| shapes[j].net != s.net && shapes[j].rect.overlaps(&s.rect))
                .map(|j| {
                    format!(
                        "short on {} between {:?} and {:?} at {:?}",
                        tech.layer(s.layer).name,
                        s.net,
                        shapes[j].net,
                        s.rect.intersection(&shapes[j].rect)
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect();

    if shorts.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: No shorts found.");
        Ok(())
    } else {
        for s in shorts.iter().take(20) {
            log::error!("{}", s);
        }
        log::error!("\x1b[31mFAIL\x1b[0m: {} shorts", shorts.len());
        Err(format!("{} shorts", shorts.len()))
    }
}
