//! The greedy box-merging mesh extractor.
//!
//! Cells are scanned in buffer order; each unvisited cell seeds an
//! axis-aligned box that grows horizontally to a fixpoint and then
//! vertically, absorbing cells with the identical block id. Transparent
//! blocks never merge, which keeps per-cell face visibility exact for
//! glass-like blocks and lets liquids render their own fill level. Each box
//! then emits a quad per face that is not fully buried in occluding
//! neighbors.

use glam::{IVec3, Vec2, Vec3};
use sandvox_block::{Block, BlockUv, MAX_LIQUID_LEVEL};
use sandvox_grid::{Side, index_to_position, out_of_bounds, position_to_index};

use crate::buffers::MeshBuffers;

/// Extracts the mesh for one mesh group of a chunk.
///
/// `blocks` is a snapshot of the chunk's buffer, `uvs` the registry's face-UV
/// table indexed by block id, `visited` a scratch bitmap of chunk volume.
/// Output lands in `out`, which is cleared first.
pub fn extract_mesh(
    blocks: &[Block],
    extent: IVec3,
    uvs: &[BlockUv],
    mesh_group: u8,
    visited: &mut [bool],
    out: &mut MeshBuffers,
) {
    let mut extraction = Extraction {
        blocks,
        extent,
        uvs,
        mesh_group,
        visited,
        out,
    };
    extraction.run();
}

struct Extraction<'a> {
    blocks: &'a [Block],
    extent: IVec3,
    uvs: &'a [BlockUv],
    mesh_group: u8,
    visited: &'a mut [bool],
    out: &'a mut MeshBuffers,
}

impl Extraction<'_> {
    fn run(&mut self) {
        self.out.clear();
        self.visited.fill(false);

        for index in 0..self.blocks.len() {
            if self.visited[index] {
                continue;
            }
            let block = self.blocks[index];
            if !block.exists() || block.mesh_group != self.mesh_group {
                continue;
            }

            let mut min = index_to_position(index, self.extent);
            let mut max = min;
            if !block.is_transparent() {
                self.expand(&mut min, &mut max, block);
            }

            self.mark_visited(min, max);
            self.draw_box(block, min, max - min + IVec3::ONE);
        }
    }

    fn index(&self, position: IVec3) -> usize {
        position_to_index(position, self.extent)
    }

    /// Grows the box horizontally until no side can advance, then vertically.
    fn expand(&mut self, min: &mut IVec3, max: &mut IVec3, block: Block) {
        while self.try_expand_east(min, max, block)
            || self.try_expand_west(min, max, block)
            || self.try_expand_north(min, max, block)
            || self.try_expand_south(min, max, block)
        {}

        while self.try_expand_up(min, max, block) || self.try_expand_down(min, max, block) {}
    }

    fn try_expand_east(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if max.x >= self.extent.x - 1 {
            return false;
        }
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                if !self.can_absorb(IVec3::new(max.x + 1, y, z), block) {
                    return false;
                }
            }
        }
        max.x += 1;
        true
    }

    fn try_expand_west(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if min.x <= 0 {
            return false;
        }
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                if !self.can_absorb(IVec3::new(min.x - 1, y, z), block) {
                    return false;
                }
            }
        }
        min.x -= 1;
        true
    }

    fn try_expand_north(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if max.z >= self.extent.z - 1 {
            return false;
        }
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if !self.can_absorb(IVec3::new(x, y, max.z + 1), block) {
                    return false;
                }
            }
        }
        max.z += 1;
        true
    }

    fn try_expand_south(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if min.z <= 0 {
            return false;
        }
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if !self.can_absorb(IVec3::new(x, y, min.z - 1), block) {
                    return false;
                }
            }
        }
        min.z -= 1;
        true
    }

    fn try_expand_up(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if max.y >= self.extent.y - 1 {
            return false;
        }
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                if !self.can_absorb(IVec3::new(x, max.y + 1, z), block) {
                    return false;
                }
            }
        }
        max.y += 1;
        true
    }

    fn try_expand_down(&self, min: &mut IVec3, max: &mut IVec3, block: Block) -> bool {
        if min.y <= 0 {
            return false;
        }
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                if !self.can_absorb(IVec3::new(x, min.y - 1, z), block) {
                    return false;
                }
            }
        }
        min.y -= 1;
        true
    }

    fn can_absorb(&self, position: IVec3, block: Block) -> bool {
        let index = self.index(position);
        !self.visited[index] && self.blocks[index].id == block.id
    }

    fn mark_visited(&mut self, min: IVec3, max: IVec3) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let index = position_to_index(IVec3::new(x, y, z), self.extent);
                    self.visited[index] = true;
                }
            }
        }
    }

    fn draw_box(&mut self, block: Block, position: IVec3, size: IVec3) {
        for side in Side::ALL {
            self.draw_side_if_free(block, position, size, side);
        }
    }

    fn draw_side_if_free(&mut self, block: Block, position: IVec3, size: IVec3, side: Side) {
        let (neighbor_min, neighbor_max) = neighbor_layer(position, size, side);

        let liquid_top = block.is_liquid() && side == Side::Up;
        if self.is_occluded(block, neighbor_min, neighbor_max, liquid_top) {
            return;
        }

        let mut size_f = size.as_vec3();
        if block.is_liquid() {
            // A partially drained cell renders a correspondingly lower box.
            size_f.y *= block.liquid_level() as f32 / MAX_LIQUID_LEVEL as f32;
        }

        self.draw_side(block, side, size_f, position.as_vec3());
    }

    /// Scans the full layer of cells just outside a face. The face is hidden
    /// only when every cell in the layer occludes it.
    fn is_occluded(&self, block: Block, min: IVec3, max: IVec3, liquid_top: bool) -> bool {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let Some(neighbor) = self.try_block_at(IVec3::new(x, y, z)) else {
                        return false;
                    };

                    if liquid_top {
                        if liquid_face_visible(block, neighbor) {
                            return false;
                        }
                    } else if neighbor.is_transparent() {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn try_block_at(&self, position: IVec3) -> Option<Block> {
        if out_of_bounds(position, self.extent) {
            return None;
        }
        let block = self.blocks[self.index(position)];
        block.exists().then_some(block)
    }

    fn draw_side(&mut self, block: Block, side: Side, size: Vec3, origin: Vec3) {
        let template = side_vertices(side);
        let corners = template.map(|v| v * size + origin);
        let normal = side.normal();
        let uv = self.uvs[block.id as usize].face(side).min;
        self.out
            .push_quad(corners, normal, uv, block.material_index as usize);
    }
}

/// The liquid-top visibility rule: a transparent neighbor hides the face
/// only when it is the same liquid with identical metadata; any different
/// liquid id or fill level shows a dividing surface. Opaque neighbors
/// occlude as usual.
fn liquid_face_visible(block: Block, neighbor: Block) -> bool {
    if !neighbor.is_transparent() {
        return false;
    }
    if neighbor != block {
        return true;
    }
    neighbor.metadata != block.metadata
}

/// Bounds of the one-cell-thick neighbor layer outside the given face.
fn neighbor_layer(origin: IVec3, size: IVec3, side: Side) -> (IVec3, IVec3) {
    let vector = side.to_ivec();
    let region_min = origin;
    let region_max = origin + size - IVec3::ONE;

    if side.is_negative() {
        (region_min + vector, region_max + size * vector)
    } else {
        (region_min + size * vector, region_max + vector)
    }
}

/// Unit-cube corner template per side, wound counter-clockwise seen from
/// outside. Left/right is −/+X, bottom/top −/+Y, near/far −/+Z.
fn side_vertices(side: Side) -> [Vec3; 4] {
    const BLN: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    const BRN: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    const BLF: Vec3 = Vec3::new(0.0, 0.0, 1.0);
    const BRF: Vec3 = Vec3::new(1.0, 0.0, 1.0);
    const TLN: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    const TRN: Vec3 = Vec3::new(1.0, 1.0, 0.0);
    const TLF: Vec3 = Vec3::new(0.0, 1.0, 1.0);
    const TRF: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    match side {
        Side::North => [BRF, TRF, TLF, BLF],
        Side::South => [BLN, TLN, TRN, BRN],
        Side::East => [BRN, TRN, TRF, BRF],
        Side::West => [BLF, TLF, TLN, BLN],
        Side::Up => [TLN, TLF, TRF, TRN],
        Side::Down => [BLF, BLN, BRN, BRF],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
