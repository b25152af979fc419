use crate::grid::{Edge, RoutingGrid};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use vroute_common::db::core::LayerRange;
use vroute_common::geom::coord::GridCoord;

/// Integer cost resolution.
const SCALE: f64 = 100.0;

const NO_PARENT: u32 = u32::MAX;

#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier {
    priority: i64,
    cost: i64,
    vias: u32,
    slot: u32,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on priority; among equal priority, fewer vias, then deeper cost.
        (other.priority, other.vias)
            .cmp(&(self.priority, self.vias))
            .then(self.cost.cmp(&other.cost))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-search cost knobs.
#[derive(Clone, Copy, Debug)]
pub struct SearchParams {
    /// Cost of one planar hop before congestion.
    pub wire_weight: f64,
    pub via_cost: f64,
    pub wrong_way_cost: f64,
    pub heuristic_weight: f64,
    pub margin: u32,
    pub max_expansions: u32,
    /// Layers on which planar moves are allowed; vias may cross any layer.
    pub range: LayerRange,
}

/// Inclusive tile box the search is confined to, spanning every layer.
#[derive(Clone, Copy)]
struct SearchBox {
    x0: u32,
    y0: u32,
    nx: u32,
    ny: u32,
    nz: u8,
    full: bool,
}

impl SearchBox {
    fn around<G: RoutingGrid + ?Sized>(grid: &G, terminals: &[GridCoord], margin: u32) -> Self {
        let (lo_x, hi_x) = span(terminals.iter().map(|c| c.x));
        let (lo_y, hi_y) = span(terminals.iter().map(|c| c.y));
        let x0 = lo_x.saturating_sub(margin);
        let y0 = lo_y.saturating_sub(margin);
        let x1 = hi_x.saturating_add(margin).min(grid.width() - 1);
        let y1 = hi_y.saturating_add(margin).min(grid.height() - 1);
        Self {
            x0,
            y0,
            nx: x1 - x0 + 1,
            ny: y1 - y0 + 1,
            nz: grid.layers(),
            full: x0 == 0 && y0 == 0 && x1 == grid.width() - 1 && y1 == grid.height() - 1,
        }
    }

    fn len(&self) -> usize {
        self.nx as usize * self.ny as usize * self.nz as usize
    }

    #[inline]
    fn slot(&self, c: GridCoord) -> Option<usize> {
        let dx = c.x.checked_sub(self.x0).filter(|&d| d < self.nx)?;
        let dy = c.y.checked_sub(self.y0).filter(|&d| d < self.ny)?;
        (c.z < self.nz).then(|| ((c.z as u32 * self.ny + dy) * self.nx + dx) as usize)
    }

    #[inline]
    fn coord(&self, slot: u32) -> GridCoord {
        let (plane, rest) = (slot / (self.nx * self.ny), slot % (self.nx * self.ny));
        GridCoord::new(self.x0 + rest % self.nx, self.y0 + rest / self.nx, plane as u8)
    }
}

fn span(values: impl Iterator<Item = u32>) -> (u32, u32) {
    values.fold((u32::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Up to six grid neighbours of `c`. Planar moves only where `planar` holds.
fn neighbours(c: GridCoord, planar: bool, w: u32, h: u32, layers: u8) -> impl Iterator<Item = GridCoord> {
    let west = (planar && c.x > 0).then(|| GridCoord::new(c.x - 1, c.y, c.z));
    let east = (planar && c.x + 1 < w).then(|| GridCoord::new(c.x + 1, c.y, c.z));
    let south = (planar && c.y > 0).then(|| GridCoord::new(c.x, c.y - 1, c.z));
    let north = (planar && c.y + 1 < h).then(|| GridCoord::new(c.x, c.y + 1, c.z));
    let down = (c.z > 0).then(|| GridCoord::new(c.x, c.y, c.z - 1));
    let up = (c.z + 1 < layers).then(|| GridCoord::new(c.x, c.y, c.z + 1));
    [west, east, south, north, down, up].into_iter().flatten()
}

/// Reusable maze search. Buffers survive between calls; one instance per worker.
#[derive(Clone, Default)]
pub struct AStar {
    came_from: Vec<u32>,
    cost: Vec<i64>,
    via_count: Vec<u32>,
    /// A slot is live for the current search iff its stamp equals `epoch`.
    stamp: Vec<u32>,
    epoch: u32,
}

impl AStar {
    pub fn new() -> Self {
        let mut solver = Self::default();
        solver.prepare(1 << 16);
        solver
    }

    /// Grows the buffers to `slots` and invalidates every slot from the last search.
    fn prepare(&mut self, slots: usize) {
        if slots > self.stamp.len() {
            let n = slots.max(self.stamp.len() * 2);
            self.came_from.resize(n, NO_PARENT);
            self.cost.resize(n, i64::MAX);
            self.via_count.resize(n, 0);
            self.stamp.resize(n, 0);
        }
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            self.stamp.fill(0);
            self.epoch = 1;
        }
    }

    fn settle(&mut self, slot: usize, parent: u32, cost: i64, vias: u32) {
        self.came_from[slot] = parent;
        self.cost[slot] = cost;
        self.via_count[slot] = vias;
        self.stamp[slot] = self.epoch;
    }

    /// Cheapest path from any of `starts` to `end`, inclusive of both.
    ///
    /// Searches a window around the terminals first and retries once with a
    /// window four times larger before giving up.
    pub fn route<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        starts: &[GridCoord],
        end: GridCoord,
        params: &SearchParams,
    ) -> Option<Vec<GridCoord>> {
        let mut margin = params.margin;
        for _ in 0..2 {
            let (path, full) = self.find_path(grid, starts, end, params, margin);
            if path.is_some() || full {
                return path;
            }
            margin = margin.saturating_mul(4).max(1);
        }
        None
    }

    /// Returns the path and whether the window already covered the whole grid.
    pub fn find_path<G: RoutingGrid + ?Sized>(
        &mut self,
        grid: &G,
        starts: &[GridCoord],
        end: GridCoord,
        params: &SearchParams,
        margin: u32,
    ) -> (Option<Vec<GridCoord>>, bool) {
        if starts.is_empty() || grid.width() == 0 || grid.height() == 0 {
            return (None, true);
        }
        if starts.contains(&end) {
            return (Some(vec![end]), true);
        }

        let mut terminals = starts.to_vec();
        terminals.push(end);
        let area = SearchBox::around(grid, &terminals, margin);
        let Some(goal) = area.slot(end) else {
            return (None, area.full);
        };
        self.prepare(area.len());

        let estimate = |c: GridCoord| {
            let h = c.planar_distance(end) as f64 * params.wire_weight
                + c.z.abs_diff(end.z) as f64 * params.via_cost;
            (h * params.heuristic_weight * SCALE) as i64
        };

        let mut open = BinaryHeap::new();
        for &s in starts {
            if let Some(slot) = area.slot(s) {
                self.settle(slot, NO_PARENT, 0, 0);
                open.push(Frontier {
                    priority: estimate(s),
                    cost: 0,
                    vias: 0,
                    slot: slot as u32,
                });
            }
        }

        let mut expanded = 0u32;
        while let Some(top) = open.pop() {
            let here = top.slot as usize;
            if top.cost > self.cost[here] {
                continue;
            }
            if here == goal {
                return (Some(self.trace(goal, &area)), area.full);
            }
            expanded += 1;
            if expanded > params.max_expansions {
                log::debug!("A* gave up after {} expansions towards {:?}", expanded, end);
                return (None, true);
            }

            let at = area.coord(top.slot);
            let planar = params.range.contains(at.z);
            for next in neighbours(at, planar, grid.width(), grid.height(), grid.layers()) {
                let (Some(slot), Some(edge)) = (area.slot(next), Edge::between(at, next)) else {
                    continue;
                };
                let mut step = if edge.is_via() {
                    params.via_cost
                } else {
                    params.wire_weight
                };
                if edge.is_wrong_way(grid.direction(edge.z)) {
                    step += params.wrong_way_cost;
                }
                step += grid.congestion_cost(edge);

                let cost = top.cost + (step * SCALE) as i64;
                let vias = top.vias + edge.is_via() as u32;
                let improves = self.stamp[slot] != self.epoch
                    || (cost, vias) < (self.cost[slot], self.via_count[slot]);
                if improves {
                    self.settle(slot, top.slot, cost, vias);
                    open.push(Frontier {
                        priority: cost + estimate(next),
                        cost,
                        vias,
                        slot: slot as u32,
                    });
                }
            }
        }
        (None, area.full)
    }

    fn trace(&self, goal: usize, area: &SearchBox) -> Vec<GridCoord> {
        let mut path: Vec<GridCoord> = std::iter::successors(Some(goal as u32), |&s| {
            Some(self.came_from[s as usize]).filter(|&p| p != NO_PARENT)
        })
        .map(|s| area.coord(s))
        .collect();
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{DenseGrid, EdgeDir};
    use vroute_common::db::core::LayerDirection;

    fn params(layers: u8) -> SearchParams {
        SearchParams {
            wire_weight: 1.0,
            via_cost: 2.0,
            wrong_way_cost: 4.0,
            heuristic_weight: 1.0,
            margin: 2,
            max_expansions: 100_000,
            range: LayerRange::new(0, layers - 1),
        }
    }

    fn hv_grid(w: u32, h: u32, cap: u32) -> DenseGrid {
        DenseGrid::uniform(
            w,
            h,
            vec![LayerDirection::Horizontal, LayerDirection::Vertical],
            cap,
        )
    }

    fn is_connected(path: &[GridCoord]) -> bool {
        path.windows(2).all(|w| Edge::between(w[0], w[1]).is_some())
    }

    #[test]
    fn straight_run_stays_on_preferred_layer() {
        let grid = hv_grid(8, 4, 4);
        let path = AStar::new()
            .route(&grid, &[GridCoord::new(0, 1, 0)], GridCoord::new(6, 1, 0), &params(2))
            .unwrap();
        assert_eq!(path.len(), 7);
        assert!(path.iter().all(|c| c.z == 0 && c.y == 1));
    }

    #[test]
    fn turns_use_the_vertical_layer() {
        let grid = hv_grid(8, 8, 4);
        let path = AStar::new()
            .route(&grid, &[GridCoord::new(0, 0, 0)], GridCoord::new(5, 5, 0), &params(2))
            .unwrap();
        assert!(is_connected(&path));
        // vertical travel happens on z=1, two vias total
        let vias = path.windows(2).filter(|w| w[0].z != w[1].z).count();
        assert_eq!(vias, 2);
        assert!(
            path.windows(2)
                .filter(|w| w[0].y != w[1].y)
                .all(|w| w[0].z == 1)
        );
    }

    #[test]
    fn congested_edge_is_avoided() {
        let mut grid = DenseGrid::uniform(3, 3, vec![LayerDirection::Unknown], 1);
        let hot = Edge::new(0, 1, 0, EdgeDir::Horizontal);
        grid.add_usage(hot);
        grid.set_penalty(10.0);
        let path = AStar::new()
            .route(&grid, &[GridCoord::new(0, 1, 0)], GridCoord::new(2, 1, 0), &params(1))
            .unwrap();
        assert!(is_connected(&path));
        assert!(path.windows(2).all(|w| Edge::between(w[0], w[1]) != Some(hot)));
    }

    #[test]
    fn multi_source_picks_nearest_tree_tile() {
        let grid = hv_grid(10, 3, 4);
        let starts = [GridCoord::new(0, 0, 0), GridCoord::new(7, 0, 0)];
        let path = AStar::new()
            .route(&grid, &starts, GridCoord::new(9, 0, 0), &params(2))
            .unwrap();
        assert_eq!(path.first(), Some(&GridCoord::new(7, 0, 0)));
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn planar_moves_respect_layer_range() {
        let grid = DenseGrid::uniform(
            6,
            2,
            vec![
                LayerDirection::Horizontal,
                LayerDirection::Vertical,
                LayerDirection::Horizontal,
            ],
            4,
        );
        let p = SearchParams {
            range: LayerRange::new(2, 2),
            ..params(3)
        };
        let path = AStar::new()
            .route(&grid, &[GridCoord::new(0, 0, 0)], GridCoord::new(5, 0, 0), &p)
            .unwrap();
        assert!(
            path.windows(2)
                .filter(|w| w[0].z == w[1].z)
                .all(|w| w[0].z == 2)
        );
    }
}
