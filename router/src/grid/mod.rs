pub mod adjust;
pub mod dense;

pub use dense::DenseGrid;

use vroute_common::db::core::LayerDirection;
use vroute_common::geom::coord::GridCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeDir {
    /// Towards `x + 1`.
    Horizontal,
    /// Towards `y + 1`.
    Vertical,
    /// Towards `z + 1`.
    Via,
}

/// Boundary between a tile and its neighbour in `dir`. Stored at the lower tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub x: u32,
    pub y: u32,
    pub z: u8,
    pub dir: EdgeDir,
}

impl Edge {
    pub fn new(x: u32, y: u32, z: u8, dir: EdgeDir) -> Self {
        Self { x, y, z, dir }
    }

    /// Edge joining two adjacent tiles, `None` if they are not neighbours.
    pub fn between(a: GridCoord, b: GridCoord) -> Option<Edge> {
        if a.differing_axes(b) != 1 {
            return None;
        }
        if a.z != b.z {
            if a.z.abs_diff(b.z) != 1 {
                return None;
            }
            Some(Edge::new(a.x, a.y, a.z.min(b.z), EdgeDir::Via))
        } else if a.x != b.x {
            if a.x.abs_diff(b.x) != 1 {
                return None;
            }
            Some(Edge::new(a.x.min(b.x), a.y, a.z, EdgeDir::Horizontal))
        } else {
            if a.y.abs_diff(b.y) != 1 {
                return None;
            }
            Some(Edge::new(a.x, a.y.min(b.y), a.z, EdgeDir::Vertical))
        }
    }

    pub fn lower(&self) -> GridCoord {
        GridCoord::new(self.x, self.y, self.z)
    }

    pub fn upper(&self) -> GridCoord {
        match self.dir {
            EdgeDir::Horizontal => GridCoord::new(self.x + 1, self.y, self.z),
            EdgeDir::Vertical => GridCoord::new(self.x, self.y + 1, self.z),
            EdgeDir::Via => GridCoord::new(self.x, self.y, self.z + 1),
        }
    }

    pub fn is_via(&self) -> bool {
        self.dir == EdgeDir::Via
    }

    /// True when the edge runs against the preferred direction of its layer.
    pub fn is_wrong_way(&self, direction: LayerDirection) -> bool {
        matches!(
            (self.dir, direction),
            (EdgeDir::Horizontal, LayerDirection::Vertical)
                | (EdgeDir::Vertical, LayerDirection::Horizontal)
        )
    }
}

/// Supply and demand of routing resources on the tile graph.
pub trait RoutingGrid: Sync + Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layers(&self) -> u8;
    fn direction(&self, z: u8) -> LayerDirection;

    fn contains(&self, edge: Edge) -> bool {
        let up = edge.upper();
        up.x < self.width() && up.y < self.height() && up.z < self.layers()
    }

    fn capacity(&self, edge: Edge) -> u32;
    fn set_capacity(&mut self, edge: Edge, capacity: u32);
    fn usage(&self, edge: Edge) -> u32;

    fn add_usage(&mut self, edge: Edge);
    fn remove_usage(&mut self, edge: Edge);

    /// Present congestion and history cost of one more wire on `edge`.
    fn congestion_cost(&self, edge: Edge) -> f64;
    fn update_history(&mut self, history_increment: f64);
    fn set_penalty(&mut self, penalty: f64);

    /// `usage > capacity + slack`; via edges only when via capacity is limited.
    fn is_overflowed(&self, edge: Edge, slack: u32) -> bool;
    fn overflowed_edges(&self, slack: u32) -> Vec<Edge>;
    fn total_overflow(&self) -> u64;
}
