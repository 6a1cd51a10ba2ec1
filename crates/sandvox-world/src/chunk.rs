//! A single chunk: a lazily-allocated dense block buffer with advisory
//! lock accounting, a validity flag, and a mutation version counter.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashSet;
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, out_of_bounds, position_to_index, volume};

/// Identifies which subsystem holds an advisory lock on a chunk.
///
/// Lock ownership has set semantics: locking twice from the same owner is a
/// no-op, and a single release clears it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockOwner {
    /// Terrain generation filling the initial buffer.
    Terrain,
    /// Mesh extraction reading a snapshot of the buffer.
    Mesh,
    /// The lighting engine's flood-fill job.
    Lighting,
    /// The liquid simulation pass.
    Liquid,
    /// An external collaborator identified by an opaque handle.
    External(u16),
}

/// One streamed chunk of the voxel world.
///
/// The block buffer materializes on first write and is released on despawn;
/// a chunk is `valid` once terrain generation (or a first edit) has filled it.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    origin: Vec3,
    extent: IVec3,
    blocks: Option<Vec<Block>>,
    locks: FxHashSet<LockOwner>,
    valid: bool,
    version: u64,
}

impl Chunk {
    /// Creates an empty, invalid chunk at the given grid coordinate.
    pub fn new(coord: ChunkCoord, origin: Vec3, extent: IVec3) -> Self {
        Self {
            coord,
            origin,
            extent,
            blocks: None,
            locks: FxHashSet::default(),
            valid: false,
            version: 0,
        }
    }

    /// The chunk's grid coordinate.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The chunk's world-space origin (minimum corner).
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// The chunk's cell dimensions.
    pub fn extent(&self) -> IVec3 {
        self.extent
    }

    /// Total number of cells.
    pub fn volume(&self) -> usize {
        volume(self.extent)
    }

    /// Monotonically increasing mutation counter, used by background work to
    /// detect stale snapshots.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` once the buffer has been generated or edited.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns the block buffer if the chunk holds valid data.
    pub fn valid_blocks(&self) -> Option<&[Block]> {
        if !self.valid {
            return None;
        }
        self.blocks.as_deref()
    }

    /// Returns the block buffer, materializing it on first access.
    pub fn blocks_mut(&mut self) -> &mut [Block] {
        self.blocks
            .get_or_insert_with(|| vec![Block::EMPTY; volume(self.extent)])
    }

    /// Reads the cell at `local`.
    ///
    /// A chunk whose buffer has not materialized yet reads as all-empty.
    ///
    /// # Panics
    ///
    /// Panics if `local` is outside the chunk bounds. Callers deriving
    /// positions from cross-chunk offsets must bounds-check through the grid
    /// helpers first.
    pub fn block_at(&self, local: IVec3) -> Block {
        assert!(
            !out_of_bounds(local, self.extent),
            "local position {local} outside chunk extent {}",
            self.extent
        );
        match &self.blocks {
            Some(blocks) => blocks[position_to_index(local, self.extent)],
            None => Block::EMPTY,
        }
    }

    /// Writes the cell at `local` and returns the previous value.
    ///
    /// Marks the chunk valid and bumps the version counter. All gameplay
    /// edits must go through the owning facade so that dependent engines are
    /// notified before and after the write.
    ///
    /// # Panics
    ///
    /// Panics if `local` is outside the chunk bounds.
    pub fn set_block_at(&mut self, local: IVec3, block: Block) -> Block {
        assert!(
            !out_of_bounds(local, self.extent),
            "local position {local} outside chunk extent {}",
            self.extent
        );
        let extent = self.extent;
        let index = position_to_index(local, extent);
        let blocks = self.blocks_mut();
        let old = blocks[index];
        blocks[index] = block;
        self.valid = true;
        self.version += 1;
        old
    }

    /// Marks the chunk as generated after its buffer has been filled.
    pub fn mark_generated(&mut self) {
        self.valid = true;
        self.version += 1;
    }

    /// Returns `true` if the cell at `local` is occupied.
    pub fn is_busy_at(&self, local: IVec3) -> bool {
        self.block_at(local).exists()
    }

    /// Converts a world position to a local cell position, if it lies inside
    /// this chunk.
    pub fn try_local_position(&self, world_position: Vec3) -> Option<IVec3> {
        let offset = world_position - self.origin;
        let local = offset.floor().as_ivec3();
        if out_of_bounds(local, self.extent) {
            return None;
        }
        Some(local)
    }

    /// World-space center of the cell at `local`.
    pub fn block_world_center(&self, local: IVec3) -> Vec3 {
        self.origin + local.as_vec3() + Vec3::splat(0.5)
    }

    /// Takes an advisory lock for `owner`. Idempotent per owner.
    pub fn request_lock(&mut self, owner: LockOwner) {
        self.locks.insert(owner);
    }

    /// Releases `owner`'s advisory lock. A release without a prior request
    /// is a no-op.
    pub fn release_lock(&mut self, owner: LockOwner) {
        self.locks.remove(&owner);
    }

    /// Returns `true` while any owner holds a lock.
    pub fn is_locked(&self) -> bool {
        !self.locks.is_empty()
    }

    /// Frees the block buffer and invalidates the chunk.
    ///
    /// Safe to call repeatedly or before the buffer ever materialized.
    pub fn release_blocks(&mut self) {
        if !self.locks.is_empty() {
            tracing::warn!(coord = ?self.coord, "releasing block buffer of a locked chunk");
            self.locks.clear();
        }
        self.blocks = None;
        self.valid = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
