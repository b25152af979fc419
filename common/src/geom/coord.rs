use serde::{Deserialize, Serialize};

/// A tile position: `x`, `y` in tiles, `z` the routing layer index (0 = lowest routing layer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl GridCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn planar_distance(&self, other: GridCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Number of axes (x, y, z) on which the two coordinates differ.
    pub fn differing_axes(&self, other: GridCoord) -> usize {
        (self.x != other.x) as usize + (self.y != other.y) as usize + (self.z != other.z) as usize
    }

    pub fn with_layer(self, z: u8) -> Self {
        Self { z, ..self }
    }
}
