//! Terrain classification and background chunk generation.
//!
//! The core treats the classifier as an opaque collaborator: anything that
//! can fill a column of blocks for a chunk. [`NoiseTerrain`] is the stock
//! Perlin-based implementation; [`ChunkGenerator`] runs classification on a
//! background task per freshly streamed chunk.

pub mod generator;
pub mod noise_terrain;

use glam::Vec3;
use sandvox_block::Block;

pub use generator::ChunkGenerator;
pub use noise_terrain::{NoiseTerrain, NoiseTerrainParams};

/// Fills one vertical column of a chunk's block buffer.
///
/// `column` has one slot per Y layer, bottom to top. Implementations must be
/// thread-safe: generation runs on background tasks.
pub trait TerrainClassifier: Send + Sync {
    /// Writes a block per Y layer for the column at chunk-local `(x, z)`.
    fn fill_column(&self, chunk_origin: Vec3, local_x: i32, local_z: i32, column: &mut [Block]);
}
