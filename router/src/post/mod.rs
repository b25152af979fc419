pub mod merge_split;

pub use merge_split::{MergeSplitStats, merge_split, merge_split_nets};
