use crate::db::indices::NetId;
use crate::geom::coord::GridCoord;

/// One straight hop run in the tile grid: a wire along x or y, or a via stack along z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GSegment {
    pub from: GridCoord,
    pub to: GridCoord,
}

impl GSegment {
    pub fn new(from: GridCoord, to: GridCoord) -> Self {
        Self { from, to }
    }

    pub fn is_via(&self) -> bool {
        self.from.x == self.to.x && self.from.y == self.to.y && self.from.z != self.to.z
    }

    /// Changes exactly one axis.
    pub fn is_manhattan(&self) -> bool {
        self.from.differing_axes(self.to) == 1
    }

    pub fn len(&self) -> u32 {
        self.from.planar_distance(self.to) + self.from.z.abs_diff(self.to.z) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Every tile the segment covers, endpoints included.
    pub fn tiles(&self) -> Vec<GridCoord> {
        let (a, b) = (self.from, self.to);
        let mut out = Vec::with_capacity(self.len() as usize + 1);
        for x in a.x.min(b.x)..=a.x.max(b.x) {
            for y in a.y.min(b.y)..=a.y.max(b.y) {
                for z in a.z.min(b.z)..=a.z.max(b.z) {
                    out.push(GridCoord::new(x, y, z));
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetStatus {
    Pending,
    Routed,
    /// All pins in one tile; only local connections, no grid usage.
    Local,
    /// Routed, but still crossing an overflowed edge when the run stopped.
    Overflowed,
    /// Some pin could not be reached at all.
    Unroutable,
    /// Fewer than two pins.
    Skipped,
}

impl NetStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, NetStatus::Overflowed | NetStatus::Unroutable)
    }
}

#[derive(Clone, Debug)]
pub struct GRoute {
    pub net: NetId,
    pub segments: Vec<GSegment>,
    pub status: NetStatus,
}

impl GRoute {
    pub fn new(net: NetId) -> Self {
        Self {
            net,
            segments: Vec::new(),
            status: NetStatus::Pending,
        }
    }

    pub fn wirelength(&self) -> u32 {
        self.segments
            .iter()
            .filter(|s| !s.is_via())
            .map(|s| s.len())
            .sum()
    }

    pub fn via_count(&self) -> u32 {
        self.segments
            .iter()
            .filter(|s| s.is_via())
            .map(|s| s.len())
            .sum()
    }
}
