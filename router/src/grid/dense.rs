use super::{Edge, EdgeDir, RoutingGrid};
use vroute_common::db::core::LayerDirection;

const DIRS: [EdgeDir; 3] = [EdgeDir::Horizontal, EdgeDir::Vertical, EdgeDir::Via];

/// Cost of every unit of demand past capacity, relative to a full edge.
const OVERFLOW_WEIGHT: f64 = 8.0;

// Packed per-edge record (12 bytes)
#[derive(Clone, Copy, Default)]
struct EdgeNode {
    capacity: u32,
    usage: u32,
    history: f32,
}

/// Tile graph stored as three edge slots per tile (east, north, up).
/// Slots that would leave the grid stay at capacity 0 and are never handed out.
#[derive(Clone)]
pub struct DenseGrid {
    width: u32,
    height: u32,
    layers: u8,
    directions: Vec<LayerDirection>,
    nodes: Vec<EdgeNode>,
    penalty: f64,
    limit_vias: bool,
}

impl DenseGrid {
    pub fn new(width: u32, height: u32, directions: Vec<LayerDirection>) -> Self {
        let layers = directions.len() as u8;
        let size = (width as usize) * (height as usize) * (layers as usize) * DIRS.len();

        if size > 500_000_000 {
            log::warn!(
                "Allocating large DenseGrid: {} edges. Ensure sufficient RAM.",
                size
            );
        }

        Self {
            width,
            height,
            layers,
            directions,
            nodes: vec![EdgeNode::default(); size],
            penalty: 1.0,
            limit_vias: false,
        }
    }

    /// Grid with every in-bounds edge at `capacity`, handy for experiments.
    pub fn uniform(width: u32, height: u32, directions: Vec<LayerDirection>, capacity: u32) -> Self {
        let mut grid = Self::new(width, height, directions);
        for e in grid.edges().collect::<Vec<_>>() {
            grid.set_capacity(e, capacity);
        }
        grid
    }

    pub fn set_limit_vias(&mut self, limit: bool) {
        self.limit_vias = limit;
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn history(&self, edge: Edge) -> f64 {
        self.nodes[self.index(edge)].history as f64
    }

    #[inline(always)]
    fn index(&self, e: Edge) -> usize {
        let tile = (e.z as usize) * (self.width as usize) * (self.height as usize)
            + (e.y as usize) * (self.width as usize)
            + (e.x as usize);
        tile * DIRS.len() + e.dir as usize
    }

    /// Every edge whose both ends lie inside the grid.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.layers).flat_map(move |z| {
            (0..self.height).flat_map(move |y| {
                (0..self.width).flat_map(move |x| {
                    DIRS.iter()
                        .map(move |&dir| Edge::new(x, y, z, dir))
                        .filter(|e| self.contains(*e))
                })
            })
        })
    }

    /// Planar edges of one layer.
    pub fn layer_edges(&self, z: u8) -> impl Iterator<Item = Edge> + '_ {
        (0..self.height).flat_map(move |y| {
            (0..self.width).flat_map(move |x| {
                [EdgeDir::Horizontal, EdgeDir::Vertical]
                    .into_iter()
                    .map(move |dir| Edge::new(x, y, z, dir))
                    .filter(|e| self.contains(*e))
            })
        })
    }

    /// `(usage, capacity)` of every capacity-limited edge.
    pub fn usage_snapshot(&self) -> Vec<(u32, u32)> {
        self.edges()
            .filter(|e| self.limit_vias || !e.is_via())
            .map(|e| {
                let n = self.nodes[self.index(e)];
                (n.usage, n.capacity)
            })
            .collect()
    }

    /// Total capacity of the planar edges on layer `z`.
    pub fn layer_capacity(&self, z: u8) -> u64 {
        self.layer_edges(z).map(|e| self.capacity(e) as u64).sum()
    }

    fn counts_overflow(&self, edge: Edge) -> bool {
        self.limit_vias || !edge.is_via()
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn layers(&self) -> u8 {
        self.layers
    }
    fn direction(&self, z: u8) -> LayerDirection {
        self.directions
            .get(z as usize)
            .copied()
            .unwrap_or(LayerDirection::Unknown)
    }

    fn capacity(&self, edge: Edge) -> u32 {
        self.nodes[self.index(edge)].capacity
    }

    fn set_capacity(&mut self, edge: Edge, capacity: u32) {
        if self.contains(edge) {
            let idx = self.index(edge);
            self.nodes[idx].capacity = capacity;
        }
    }

    fn usage(&self, edge: Edge) -> u32 {
        self.nodes[self.index(edge)].usage
    }

    fn add_usage(&mut self, edge: Edge) {
        let idx = self.index(edge);
        self.nodes[idx].usage += 1;
    }

    fn remove_usage(&mut self, edge: Edge) {
        let idx = self.index(edge);
        let node = &mut self.nodes[idx];
        node.usage = node.usage.saturating_sub(1);
    }

    #[inline(always)]
    fn congestion_cost(&self, edge: Edge) -> f64 {
        let node = self.nodes[self.index(edge)];
        let history = node.history as f64;
        if !self.counts_overflow(edge) {
            return history;
        }
        let cap = node.capacity as f64;
        let demand = node.usage as f64 + 1.0;
        let present = if demand <= cap {
            (demand / cap).powi(2)
        } else {
            1.0 + (demand - cap) * OVERFLOW_WEIGHT
        };
        present * self.penalty + history
    }

    fn update_history(&mut self, history_increment: f64) {
        let limit_vias = self.limit_vias;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if !limit_vias && i % DIRS.len() == EdgeDir::Via as usize {
                continue;
            }
            if node.usage > node.capacity {
                let overflow = (node.usage - node.capacity) as f64;
                node.history += (overflow * history_increment) as f32;
            }
        }
    }

    fn set_penalty(&mut self, penalty: f64) {
        self.penalty = penalty;
    }

    fn is_overflowed(&self, edge: Edge, slack: u32) -> bool {
        if !self.counts_overflow(edge) {
            return false;
        }
        let node = self.nodes[self.index(edge)];
        node.usage > node.capacity.saturating_add(slack)
    }

    fn overflowed_edges(&self, slack: u32) -> Vec<Edge> {
        self.edges()
            .filter(|&e| self.is_overflowed(e, slack))
            .collect()
    }

    fn total_overflow(&self) -> u64 {
        self.edges()
            .filter(|&e| self.counts_overflow(e))
            .map(|e| {
                let n = self.nodes[self.index(e)];
                n.usage.saturating_sub(n.capacity) as u64
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> DenseGrid {
        DenseGrid::uniform(
            4,
            3,
            vec![LayerDirection::Horizontal, LayerDirection::Vertical],
            2,
        )
    }

    #[test]
    fn boundary_edges_are_not_in_the_grid() {
        let g = grid();
        assert!(g.contains(Edge::new(2, 0, 0, EdgeDir::Horizontal)));
        assert!(!g.contains(Edge::new(3, 0, 0, EdgeDir::Horizontal)));
        assert!(!g.contains(Edge::new(0, 2, 0, EdgeDir::Vertical)));
        assert!(!g.contains(Edge::new(0, 0, 1, EdgeDir::Via)));
        // 3*3 + 4*2 planar per layer, 12 vias
        assert_eq!(g.edges().count(), 2 * 17 + 12);
    }

    #[test]
    fn congestion_grows_faster_than_usage() {
        let mut g = grid();
        let e = Edge::new(0, 0, 0, EdgeDir::Horizontal);
        let empty = g.congestion_cost(e);
        g.add_usage(e);
        let half = g.congestion_cost(e);
        g.add_usage(e);
        let full = g.congestion_cost(e);
        assert!(empty < half && half < full);
        assert!(full - half > half - empty);
        assert!(!g.is_overflowed(e, 0));
        g.add_usage(e);
        assert!(g.is_overflowed(e, 0));
        assert!(!g.is_overflowed(e, 1));
        assert_eq!(g.total_overflow(), 1);
    }

    #[test]
    fn vias_do_not_overflow_unless_limited() {
        let mut g = grid();
        let v = Edge::new(1, 1, 0, EdgeDir::Via);
        for _ in 0..5 {
            g.add_usage(v);
        }
        assert!(g.overflowed_edges(0).is_empty());
        g.set_limit_vias(true);
        assert_eq!(g.overflowed_edges(0), vec![v]);
    }

    #[test]
    fn history_accumulates_on_overflowed_edges() {
        let mut g = grid();
        let e = Edge::new(1, 1, 1, EdgeDir::Vertical);
        for _ in 0..4 {
            g.add_usage(e);
        }
        g.update_history(0.5);
        assert_eq!(g.history(e), 1.0);
        assert_eq!(g.history(Edge::new(0, 0, 0, EdgeDir::Horizontal)), 0.0);
    }
}
