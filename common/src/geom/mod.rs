pub mod coord;
pub mod point;
pub mod rect;
pub mod rtree;

/// Database units. All geometry is integer and already on the manufacturing grid.
pub type Coord = i64;
