//! Records describing block mutations.

use glam::IVec3;
use sandvox_block::Block;
use sandvox_grid::ChunkCoord;

/// Emitted after a block cell changed; carries the pre-edit value so
/// consumers can diff against the new state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockChanged {
    /// The chunk containing the modified cell.
    pub coord: ChunkCoord,
    /// Local position within the chunk.
    pub local_pos: IVec3,
    /// The cell value before the edit.
    pub old_block: Block,
    /// The cell value after the edit.
    pub new_block: Block,
}

/// A deferred block mutation, produced by the liquid simulation and applied
/// through the normal edit path so every engine observes it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetBlockCommand {
    pub coord: ChunkCoord,
    pub local_pos: IVec3,
    pub block: Block,
}

/// Identifies a single cell by chunk coordinate and linear buffer index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkBlockPosition {
    pub coord: ChunkCoord,
    pub block_index: usize,
}

impl ChunkBlockPosition {
    pub fn new(coord: ChunkCoord, block_index: usize) -> Self {
        Self { coord, block_index }
    }
}
