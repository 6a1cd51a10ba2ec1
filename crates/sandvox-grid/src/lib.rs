//! Pure coordinate math for the chunked voxel grid: linear index ↔ local
//! position conversion, bounds checks, and cross-chunk offset resolution.

pub mod coord;
pub mod side;
pub mod volume;

pub use coord::ChunkCoord;
pub use side::Side;
pub use volume::{
    apply_offset, clamp_to_bounds, index_to_position, out_of_bounds, position_to_index, volume,
};
