//! Flood-fill light propagation and removal.
//!
//! Both channels share one BFS shape: dequeue a node, stop when its level
//! cannot improve a neighbor, otherwise write the decayed level into any
//! dimmer passing neighbor and enqueue it. The single asymmetry is
//! sunlight's straight-down rule — at full intensity it propagates downward
//! without decay, so open sky lights a column all the way to the first
//! blocker. Removal walks the dimmer-than-removed frontier zeroing values
//! and collects brighter cells as refill sources for a follow-up
//! propagation pass.

use std::collections::VecDeque;

use glam::IVec3;
use rustc_hash::FxHashSet;
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, apply_offset, index_to_position, position_to_index};
use sandvox_world::Neighborhood;

use crate::light::{LightChannel, MAX_LIGHT};

/// The six face directions light steps through.
const LIGHT_DIRECTIONS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

const DOWN: IVec3 = IVec3::new(0, -1, 0);

/// A cell queued for propagation.
#[derive(Clone, Copy, Debug)]
pub struct FloodFillNode {
    pub coord: ChunkCoord,
    pub block_index: usize,
}

/// A cell queued for removal, remembering the level it held.
#[derive(Clone, Copy, Debug)]
pub struct RemovalNode {
    pub coord: ChunkCoord,
    pub block_index: usize,
    pub light_level: u8,
}

/// Everything a lighting pass reads and writes: snapshots of the 3×3 block
/// and lightmap neighborhoods plus the set of chunks whose light changed.
pub struct LightingContext {
    pub extent: IVec3,
    pub center: ChunkCoord,
    pub blocks: Neighborhood<Block>,
    pub lightmaps: Neighborhood<u8>,
    pub modified: FxHashSet<ChunkCoord>,
}

impl LightingContext {
    /// Creates a context over the given snapshots.
    pub fn new(
        extent: IVec3,
        center: ChunkCoord,
        blocks: Neighborhood<Block>,
        lightmaps: Neighborhood<u8>,
    ) -> Self {
        Self {
            extent,
            center,
            blocks,
            lightmaps,
            modified: FxHashSet::default(),
        }
    }

    /// Resolves a face neighbor of `(coord, block_index)`, requiring both
    /// its block buffer and lightmap to be present.
    fn try_neighbor(
        &self,
        coord: ChunkCoord,
        block_index: usize,
        offset: IVec3,
    ) -> Option<(ChunkCoord, usize)> {
        let local = index_to_position(block_index, self.extent);
        let (neighbor_coord, neighbor_local) = apply_offset(coord, local, offset, self.extent)?;
        self.blocks.try_get_buffer(self.center, neighbor_coord)?;
        self.lightmaps.try_get_buffer(self.center, neighbor_coord)?;
        Some((neighbor_coord, position_to_index(neighbor_local, self.extent)))
    }

    fn block(&self, coord: ChunkCoord, index: usize) -> Option<Block> {
        self.blocks
            .try_get_buffer(self.center, coord)
            .map(|buffer| buffer[index])
    }

    fn light(&self, coord: ChunkCoord, index: usize, channel: LightChannel) -> Option<u8> {
        self.lightmaps
            .try_get_buffer(self.center, coord)
            .map(|buffer| channel.get(buffer[index]))
    }

    fn set_light(&mut self, coord: ChunkCoord, index: usize, channel: LightChannel, level: u8) {
        if let Some(buffer) = self.lightmaps.try_get_buffer_mut(self.center, coord) {
            channel.set(&mut buffer[index], level);
        }
    }
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

/// Drains the BFS queue, spreading the channel's light to completion.
pub fn propagate(
    ctx: &mut LightingContext,
    queue: &mut VecDeque<FloodFillNode>,
    channel: LightChannel,
) {
    while let Some(node) = queue.pop_front() {
        let Some(level) = ctx.light(node.coord, node.block_index, channel) else {
            continue;
        };
        // A value of 1 would propagate as 0; nothing useful remains.
        if level <= 1 {
            continue;
        }

        for offset in LIGHT_DIRECTIONS {
            propagate_to_neighbor(ctx, queue, node, offset, level, channel);
        }
    }
}

fn propagate_to_neighbor(
    ctx: &mut LightingContext,
    queue: &mut VecDeque<FloodFillNode>,
    node: FloodFillNode,
    offset: IVec3,
    level: u8,
    channel: LightChannel,
) {
    let Some((neighbor_coord, neighbor_index)) =
        ctx.try_neighbor(node.coord, node.block_index, offset)
    else {
        return;
    };
    let neighbor_block = ctx
        .block(neighbor_coord, neighbor_index)
        .expect("neighbor resolution checked the buffer");
    if !neighbor_block.passes_light() {
        return;
    }

    // Sunlight at full intensity keeps it going straight down; everything
    // else loses one level per step.
    let decay = match channel {
        LightChannel::Sun if offset == DOWN && level == MAX_LIGHT => 0,
        _ => 1,
    };
    let propagated = level - decay;

    let neighbor_level = ctx
        .light(neighbor_coord, neighbor_index, channel)
        .expect("neighbor resolution checked the lightmap");
    if neighbor_level >= propagated {
        return;
    }

    ctx.set_light(neighbor_coord, neighbor_index, channel, propagated);
    queue.push_back(FloodFillNode {
        coord: neighbor_coord,
        block_index: neighbor_index,
    });
    ctx.modified.insert(neighbor_coord);
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Drains the removal queue, zeroing light that flowed from the removed
/// source and collecting brighter frontier cells into `refill_queue`.
pub fn remove(
    ctx: &mut LightingContext,
    removal_queue: &mut VecDeque<RemovalNode>,
    refill_queue: &mut VecDeque<FloodFillNode>,
    channel: LightChannel,
) {
    while let Some(node) = removal_queue.pop_front() {
        for offset in LIGHT_DIRECTIONS {
            remove_in_neighbor(ctx, removal_queue, refill_queue, node, offset, channel);
        }
    }
}

fn remove_in_neighbor(
    ctx: &mut LightingContext,
    removal_queue: &mut VecDeque<RemovalNode>,
    refill_queue: &mut VecDeque<FloodFillNode>,
    node: RemovalNode,
    offset: IVec3,
    channel: LightChannel,
) {
    let Some((neighbor_coord, neighbor_index)) =
        ctx.try_neighbor(node.coord, node.block_index, offset)
    else {
        return;
    };
    let level = node.light_level;
    let neighbor_level = ctx
        .light(neighbor_coord, neighbor_index, channel)
        .expect("neighbor resolution checked the lightmap");

    // Full-intensity sunlight propagated downward without decay, so the
    // downward walk must also clear equal-level cells.
    let clears_straight_down =
        channel == LightChannel::Sun && offset == DOWN && level == MAX_LIGHT;

    if (neighbor_level != 0 && neighbor_level < level) || clears_straight_down {
        ctx.set_light(neighbor_coord, neighbor_index, channel, 0);
        removal_queue.push_back(RemovalNode {
            coord: neighbor_coord,
            block_index: neighbor_index,
            light_level: neighbor_level,
        });
        ctx.modified.insert(neighbor_coord);
    } else if neighbor_level >= level {
        // Lit from elsewhere; a valid source to re-flood the gap from.
        refill_queue.push_back(FloodFillNode {
            coord: neighbor_coord,
            block_index: neighbor_index,
        });
    }
}

// ---------------------------------------------------------------------------
// Entry operations
// ---------------------------------------------------------------------------

/// Seeds sunlight from the sky after a chunk generates: every light-passing
/// cell of the top layer becomes a max-level source, then propagation runs.
pub fn seed_skylight(ctx: &mut LightingContext, queue: &mut VecDeque<FloodFillNode>) {
    let Some(blocks) = ctx.blocks.try_center() else {
        return;
    };
    if ctx.lightmaps.try_center().is_none() {
        return;
    }

    let top_y = ctx.extent.y - 1;
    let mut sources = Vec::new();
    for x in 0..ctx.extent.x {
        for z in 0..ctx.extent.z {
            let index = position_to_index(IVec3::new(x, top_y, z), ctx.extent);
            if blocks[index].passes_light() {
                sources.push(index);
            }
        }
    }

    let center = ctx.center;
    ctx.modified.insert(center);
    let values = ctx
        .lightmaps
        .try_center_mut()
        .expect("center lightmap checked above");
    for index in sources {
        crate::light::set_sunlight(&mut values[index], MAX_LIGHT);
        queue.push_back(FloodFillNode {
            coord: center,
            block_index: index,
        });
    }

    propagate(ctx, queue, LightChannel::Sun);
}

/// Re-floods light into a cell whose blocker was removed: the six face
/// neighbors that already hold light become propagation seeds.
pub fn seed_from_neighbors(
    ctx: &mut LightingContext,
    queue: &mut VecDeque<FloodFillNode>,
    coord: ChunkCoord,
    block_index: usize,
    channel: LightChannel,
) {
    for offset in LIGHT_DIRECTIONS {
        enqueue_lit_neighbor(ctx, queue, coord, block_index, offset, channel);
    }
    propagate(ctx, queue, channel);
}

fn enqueue_lit_neighbor(
    ctx: &mut LightingContext,
    queue: &mut VecDeque<FloodFillNode>,
    coord: ChunkCoord,
    block_index: usize,
    offset: IVec3,
    channel: LightChannel,
) {
    let Some((neighbor_coord, neighbor_index)) = ctx.try_neighbor(coord, block_index, offset)
    else {
        return;
    };
    let block = ctx
        .block(neighbor_coord, neighbor_index)
        .expect("neighbor resolution checked the buffer");
    let level = ctx
        .light(neighbor_coord, neighbor_index, channel)
        .expect("neighbor resolution checked the lightmap");

    match channel {
        LightChannel::Sun => {
            if !block.passes_light() || level == 0 {
                return;
            }
        }
        LightChannel::Torch => {
            // An emitting blocker is still a useful seed even though light
            // does not pass through it.
            if !block.passes_light() && !block.emits_light() {
                return;
            }
            if !block.emits_light() && level == 0 {
                return;
            }
        }
    }

    queue.push_back(FloodFillNode {
        coord: neighbor_coord,
        block_index: neighbor_index,
    });
    ctx.modified.insert(neighbor_coord);
}

/// Seeds a placed torch's emission and propagates it.
pub fn place_torch(
    ctx: &mut LightingContext,
    queue: &mut VecDeque<FloodFillNode>,
    block_index: usize,
    emission: u8,
) {
    if ctx.lightmaps.try_center().is_none() {
        return;
    }
    let center = ctx.center;
    ctx.set_light(center, block_index, LightChannel::Torch, emission);
    queue.push_back(FloodFillNode {
        coord: center,
        block_index,
    });
    ctx.modified.insert(center);
    propagate(ctx, queue, LightChannel::Torch);
}

/// Removes a torch: zero the cell, walk the removal BFS outward, then
/// re-propagate from the brighter frontier it found.
pub fn remove_torch(
    ctx: &mut LightingContext,
    removal_queue: &mut VecDeque<RemovalNode>,
    refill_queue: &mut VecDeque<FloodFillNode>,
    block_index: usize,
    emission: u8,
) {
    if ctx.lightmaps.try_center().is_none() {
        return;
    }
    let center = ctx.center;
    ctx.set_light(center, block_index, LightChannel::Torch, 0);
    removal_queue.push_back(RemovalNode {
        coord: center,
        block_index,
        light_level: emission,
    });
    ctx.modified.insert(center);

    remove(ctx, removal_queue, refill_queue, LightChannel::Torch);
    propagate(ctx, refill_queue, LightChannel::Torch);
}

/// Handles an opaque block placed into sunlight: zero the cell, remove the
/// sunlight that flowed through it (straight down clears unconditionally at
/// max level), then re-flood from still-lit frontier cells.
pub fn block_sunlight(
    ctx: &mut LightingContext,
    removal_queue: &mut VecDeque<RemovalNode>,
    refill_queue: &mut VecDeque<FloodFillNode>,
    block_index: usize,
    sunlight_value: u8,
) {
    if ctx.lightmaps.try_center().is_none() {
        return;
    }
    let center = ctx.center;
    ctx.set_light(center, block_index, LightChannel::Sun, 0);
    removal_queue.push_back(RemovalNode {
        coord: center,
        block_index,
        light_level: sunlight_value,
    });
    ctx.modified.insert(center);

    remove(ctx, removal_queue, refill_queue, LightChannel::Sun);
    propagate(ctx, refill_queue, LightChannel::Sun);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
