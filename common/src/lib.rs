pub mod db;
pub mod geom;
pub mod util;
