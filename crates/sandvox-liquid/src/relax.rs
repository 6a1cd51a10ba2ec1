//! The per-chunk liquid relaxation pass.
//!
//! Every cell is evaluated against the same pre-tick snapshot, so results
//! never depend on the order cells are visited within a pass. Rules, in
//! priority order: sources never change; a liquid directly above refills the
//! cell to full level; otherwise the strongest qualifying horizontal
//! neighbor spreads in at its level minus its decay; with no inflow at all
//! the cell drains empty.

use glam::IVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use sandvox_block::{Block, MAX_LIQUID_LEVEL};
use sandvox_grid::{ChunkCoord, apply_offset, index_to_position, position_to_index};
use sandvox_world::{ChunkBlockPosition, Neighborhood};

const RIGHT: IVec3 = IVec3::new(1, 0, 0);
const LEFT: IVec3 = IVec3::new(-1, 0, 0);
const UP: IVec3 = IVec3::new(0, 1, 0);
const DOWN: IVec3 = IVec3::new(0, -1, 0);
const FORWARD: IVec3 = IVec3::new(0, 0, 1);
const BACK: IVec3 = IVec3::new(0, 0, -1);

/// Neighbor expansion order for the modified set.
const EXPANSION_OFFSETS: [IVec3; 6] = [RIGHT, LEFT, DOWN, FORWARD, BACK, UP];

/// Horizontal scan order; ties go to the first direction scanned.
const HORIZONTAL_OFFSETS: [IVec3; 4] = [RIGHT, LEFT, FORWARD, BACK];

/// Relaxes `positions` against the `blocks` snapshot centered on `center`.
///
/// The position list is first expanded by every cell's 6 face neighbors,
/// since an edit can change a neighbor's flow eligibility. Cells whose
/// computed state differs only lands in `results`; unchanged cells are
/// filtered by the caller against the live buffer at apply time.
pub fn relax(
    extent: IVec3,
    center: ChunkCoord,
    blocks: &Neighborhood<Block>,
    positions: &mut Vec<ChunkBlockPosition>,
    results: &mut FxHashMap<ChunkBlockPosition, Block>,
) {
    expand_with_face_neighbors(extent, positions);

    for index in 0..positions.len() {
        let position = positions[index];
        let Some(buffer) = blocks.try_get_buffer(center, position.coord) else {
            continue;
        };
        let current = buffer[position.block_index];
        if current.exists() && !current.is_liquid() {
            continue;
        }
        if let Some(resulting) = resulting_block(extent, center, blocks, current, position) {
            results.insert(position, resulting);
        }
    }
}

fn expand_with_face_neighbors(extent: IVec3, positions: &mut Vec<ChunkBlockPosition>) {
    let mut seen: FxHashSet<ChunkBlockPosition> = positions.iter().copied().collect();

    for index in 0..positions.len() {
        let position = positions[index];
        for offset in EXPANSION_OFFSETS {
            let local = index_to_position(position.block_index, extent);
            let Some((neighbor_coord, neighbor_local)) =
                apply_offset(position.coord, local, offset, extent)
            else {
                continue;
            };
            let neighbor = ChunkBlockPosition::new(
                neighbor_coord,
                position_to_index(neighbor_local, extent),
            );
            if seen.insert(neighbor) {
                positions.push(neighbor);
            }
        }
    }
}

/// Computes the post-relaxation block for one cell, or `None` when the cell
/// must not change (it is an immutable source).
fn resulting_block(
    extent: IVec3,
    center: ChunkCoord,
    blocks: &Neighborhood<Block>,
    current: Block,
    position: ChunkBlockPosition,
) -> Option<Block> {
    if current.exists() && current.is_liquid() && current.is_liquid_source() {
        return None;
    }

    // Falling liquid wins over horizontal spread.
    if let Some(above) = neighbor_block(extent, center, blocks, position, UP)
        && above.is_liquid()
    {
        let mut resulting = above;
        resulting.set_liquid_source(false);
        resulting.set_liquid_level(MAX_LIQUID_LEVEL);
        return Some(resulting);
    }

    if let Some(max_neighbor) = neighbor_with_max_level(extent, center, blocks, position) {
        let new_level = max_neighbor.liquid_level() as i32 - max_neighbor.liquid_decay() as i32;
        if new_level > 0 {
            let mut resulting = max_neighbor;
            resulting.set_liquid_source(false);
            resulting.set_liquid_level(new_level as u8);
            return Some(resulting);
        }
        return Some(Block::EMPTY);
    }

    Some(Block::EMPTY)
}

/// The strongest horizontal liquid neighbor allowed to spread here: it must
/// stand on an existing non-liquid cell, so flow hugs solid ground instead
/// of feeding sideways off a ledge into another falling column.
fn neighbor_with_max_level(
    extent: IVec3,
    center: ChunkCoord,
    blocks: &Neighborhood<Block>,
    position: ChunkBlockPosition,
) -> Option<Block> {
    let mut max_level: i32 = -1;
    let mut max_neighbor = None;

    for offset in HORIZONTAL_OFFSETS {
        let Some(neighbor) = neighbor_block(extent, center, blocks, position, offset) else {
            continue;
        };
        if !neighbor.is_liquid() {
            continue;
        }
        let Some(below) = neighbor_block(extent, center, blocks, position, offset + DOWN) else {
            continue;
        };
        if !below.exists() || below.is_liquid() {
            continue;
        }
        let level = neighbor.liquid_level() as i32;
        if level <= max_level {
            continue;
        }
        max_level = level;
        max_neighbor = Some(neighbor);
    }

    max_neighbor
}

fn neighbor_block(
    extent: IVec3,
    center: ChunkCoord,
    blocks: &Neighborhood<Block>,
    position: ChunkBlockPosition,
    offset: IVec3,
) -> Option<Block> {
    let local = index_to_position(position.block_index, extent);
    let (neighbor_coord, neighbor_local) = apply_offset(position.coord, local, offset, extent)?;
    let buffer = blocks.try_get_buffer(center, neighbor_coord)?;
    Some(buffer[position_to_index(neighbor_local, extent)])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
