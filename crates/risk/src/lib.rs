pub mod sizing;

pub use sizing::{position_size, SizingConfig};
