pub mod design;
pub mod geometry;
pub mod guide;
