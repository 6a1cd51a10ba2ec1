//! Per-chunk light storage and the derived attenuation volume.

use glam::{IVec3, Vec2};
use sandvox_grid::{ChunkCoord, index_to_position, out_of_bounds, position_to_index, volume};
use sandvox_world::Neighborhood;

use crate::light::attenuation;

/// The attenuation volume extends one cell beyond the chunk in X and Z
/// (not Y) so the sampler can blend into neighbor chunks.
pub const LIGHTMAP_PADDING: IVec3 = IVec3::new(1, 0, 1);

/// Light data owned by one chunk: the packed per-cell values plus the
/// padded attenuation volume recomputed whenever the values settle.
pub struct LightChunk {
    values: Vec<u8>,
    attenuation: Vec<Vec2>,
    extent: IVec3,
}

impl LightChunk {
    /// Creates an all-dark light chunk for the given extent.
    pub fn new(extent: IVec3) -> Self {
        let padded = extent + LIGHTMAP_PADDING * 2;
        Self {
            values: vec![0; volume(extent)],
            attenuation: vec![Vec2::ZERO; volume(padded)],
            extent,
        }
    }

    /// The chunk extent this light data covers.
    pub fn extent(&self) -> IVec3 {
        self.extent
    }

    /// The attenuation volume's dimensions.
    pub fn padded_extent(&self) -> IVec3 {
        self.extent + LIGHTMAP_PADDING * 2
    }

    /// The packed light values, indexed like the block buffer.
    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Mutable access for write-back after a lighting job completes.
    pub fn values_mut(&mut self) -> &mut [u8] {
        &mut self.values
    }

    /// The derived attenuation volume, indexed over
    /// [`padded_extent`](Self::padded_extent).
    pub fn attenuation(&self) -> &[Vec2] {
        &self.attenuation
    }

    /// Rebuilds the attenuation volume from a lightmap neighborhood.
    ///
    /// In-bounds cells sample the center lightmap; the one-cell X/Z padding
    /// ring samples the matching neighbor, falling back to darkness where a
    /// neighbor is absent.
    pub fn recompute_attenuation(&mut self, lightmaps: &Neighborhood<u8>, center: ChunkCoord) {
        let extent = self.extent;
        let padded = self.padded_extent();

        for i in 0..self.attenuation.len() {
            let position = index_to_position(i, padded) - LIGHTMAP_PADDING;

            let value = if out_of_bounds(position, extent) {
                neighbor_value(lightmaps, center, position, extent).unwrap_or(0)
            } else {
                let index = position_to_index(position, extent);
                lightmaps
                    .try_center()
                    .map(|values| values[index])
                    .unwrap_or(0)
            };

            self.attenuation[i] = attenuation(value);
        }
    }
}

/// Resolves a one-out-of-bounds X/Z position into the matching neighbor
/// lightmap. Vertical overflow has no neighbor and reads as dark.
fn neighbor_value(
    lightmaps: &Neighborhood<u8>,
    center: ChunkCoord,
    position: IVec3,
    extent: IVec3,
) -> Option<u8> {
    if position.y < 0 || position.y >= extent.y {
        return None;
    }

    let mut local = position;
    let mut dx = 0;
    let mut dz = 0;
    if local.x < 0 {
        dx = -1;
        local.x += extent.x;
    } else if local.x >= extent.x {
        dx = 1;
        local.x -= extent.x;
    }
    if local.z < 0 {
        dz = -1;
        local.z += extent.z;
    } else if local.z >= extent.z {
        dz = 1;
        local.z -= extent.z;
    }
    debug_assert!(!out_of_bounds(local, extent));

    let buffer = lightmaps.try_get_buffer(center, center.offset(dx, dz))?;
    Some(buffer[position_to_index(local, extent)])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
