//! Perlin-noise terrain: grass surface over dirt over a stone band, with
//! still water filling the space up to a configurable level.

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use sandvox_block::Block;

use crate::TerrainClassifier;

/// Tunables for [`NoiseTerrain`].
#[derive(Clone, Debug)]
pub struct NoiseTerrainParams {
    /// Horizontal noise frequency for the surface height.
    pub scale: f64,
    /// Surface height range, lerped by the noise value.
    pub min_terrain_height: f32,
    pub max_terrain_height: f32,
    /// Horizontal noise frequency for the stone band.
    pub stone_scale: f64,
    /// Stone band height range.
    pub min_stone_height: f32,
    pub max_stone_height: f32,
    /// Water level as a fraction of the chunk height, `0.0..=1.0`.
    pub relative_water_level: f32,
}

impl Default for NoiseTerrainParams {
    fn default() -> Self {
        Self {
            scale: 0.01,
            min_terrain_height: 5.0,
            max_terrain_height: 10.0,
            stone_scale: 0.005,
            min_stone_height: 5.0,
            max_stone_height: 5.0,
            relative_water_level: 0.5,
        }
    }
}

/// The stock terrain classifier.
pub struct NoiseTerrain {
    params: NoiseTerrainParams,
    grass: Block,
    dirt: Block,
    stone: Block,
    water_source: Block,
    perlin: Perlin,
}

impl NoiseTerrain {
    /// Creates a classifier emitting the given block values.
    ///
    /// `water_source` should be a full-level liquid source (see
    /// [`BlockRegistry::make_block`](sandvox_block::BlockRegistry::make_block)).
    pub fn new(
        params: NoiseTerrainParams,
        seed: u32,
        grass: Block,
        dirt: Block,
        stone: Block,
        water_source: Block,
    ) -> Self {
        Self {
            params,
            grass,
            dirt,
            stone,
            water_source,
            perlin: Perlin::new(seed),
        }
    }

    fn noise_at(&self, world_x: f64, world_z: f64, scale: f64) -> f32 {
        self.perlin.get([world_x * scale, world_z * scale]) as f32
    }

    fn lerp_rounded(min: f32, max: f32, t: f32) -> i32 {
        (min + (max - min) * t).ceil() as i32
    }
}

impl TerrainClassifier for NoiseTerrain {
    fn fill_column(&self, chunk_origin: Vec3, local_x: i32, local_z: i32, column: &mut [Block]) {
        let p = &self.params;
        let size_y = column.len() as i32;
        let world_x = (chunk_origin.x + local_x as f32) as f64;
        let world_z = (chunk_origin.z + local_z as f32) as f64;
        let water_level = (p.relative_water_level * size_y as f32).round() as i32;

        let height_noise = self.noise_at(world_x, world_z, p.scale);
        let surface_y = Self::lerp_rounded(p.min_terrain_height, p.max_terrain_height, height_noise)
            .min(size_y - 1);

        let stone_noise = self.noise_at(world_x, world_z, p.stone_scale);
        let stone_y = Self::lerp_rounded(p.min_stone_height, p.max_stone_height, stone_noise)
            .min(surface_y);

        for y in 0..size_y {
            column[y as usize] = if y <= surface_y {
                if y <= stone_y {
                    self.stone
                } else if y < surface_y {
                    self.dirt
                } else {
                    self.grass
                }
            } else if y <= water_level {
                self.water_source
            } else {
                Block::EMPTY
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
