//! Tick orchestration for the liquid relaxation.
//!
//! Modified cells accumulate between ticks; each tick force-completes the
//! previous job, turns its results into deferred block commands for the
//! owning facade to apply, and schedules one new job per distinct center
//! chunk over a fresh snapshot. Applying the commands through the normal
//! edit path re-marks cells modified, which is how a liquid front advances
//! one step per tick.

use glam::IVec3;
use rustc_hash::{FxHashMap, FxHashSet};
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, index_to_position, position_to_index, volume};
use sandvox_world::{
    BlockChanged, ChunkBlockPosition, LockOwner, Neighborhood, SetBlockCommand, TaskHandle, World,
};

use crate::relax::relax;

type RelaxResults = FxHashMap<ChunkBlockPosition, Block>;

/// Drives per-tick liquid spreading over the world.
pub struct LiquidSimulation {
    modified: FxHashSet<ChunkBlockPosition>,
    pending: RelaxResults,
    active: Option<TaskHandle<RelaxResults>>,
    locked: Vec<ChunkCoord>,
    schedule_after_apply: bool,
}

impl LiquidSimulation {
    pub fn new() -> Self {
        Self {
            modified: FxHashSet::default(),
            pending: RelaxResults::default(),
            active: None,
            locked: Vec::new(),
            schedule_after_apply: false,
        }
    }

    /// Returns `true` while a job runs or results await application.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.pending.is_empty() || !self.modified.is_empty()
    }

    /// Records an edited cell for the next tick's relaxation.
    pub fn on_block_changed(&mut self, extent: IVec3, change: &BlockChanged) {
        self.modified.insert(ChunkBlockPosition::new(
            change.coord,
            position_to_index(change.local_pos, extent),
        ));
    }

    /// Marks every liquid cell of a freshly generated chunk modified, so
    /// standing water starts simulating immediately.
    pub fn on_chunk_generated(&mut self, world: &World, coord: ChunkCoord) {
        let Some(chunk) = world.chunk_at(coord) else {
            return;
        };
        let Some(blocks) = chunk.valid_blocks() else {
            return;
        };
        for index in 0..volume(world.extent()) {
            if blocks[index].is_liquid() {
                self.modified.insert(ChunkBlockPosition::new(coord, index));
            }
        }
    }

    /// Force-completes the running job before an edit mutates the world.
    ///
    /// The finished results stay pending and are applied on the next tick.
    pub fn on_chunk_changing(&mut self, world: &mut World) {
        self.force_complete(world);
    }

    /// Drops bookkeeping for a despawned chunk.
    pub fn forget(&mut self, world: &mut World, coord: ChunkCoord) {
        if self.locked.contains(&coord) {
            self.force_complete(world);
        }
        self.modified.retain(|position| position.coord != coord);
        self.pending.retain(|position, _| position.coord != coord);
    }

    /// Runs the first half of a simulation tick.
    ///
    /// Returns the block mutations the previous relaxation produced; the
    /// caller must apply them through its normal edit path (so every engine
    /// observes them) and then call [`finish_tick`](Self::finish_tick),
    /// which snapshots the post-application world for the next relaxation.
    pub fn tick(&mut self, world: &mut World) -> Vec<SetBlockCommand> {
        if self.modified.is_empty() {
            // Nothing new: just drain a finished job, if any.
            if self.active.as_ref().is_some_and(|task| task.is_done()) {
                self.force_complete(world);
            }
            if self.active.is_some() {
                return Vec::new();
            }
            return self.drain_pending(world);
        }

        self.schedule_after_apply = true;
        self.force_complete(world);
        self.drain_pending(world)
    }

    /// Runs the second half of a tick, after the returned commands were
    /// applied: relaxation is scheduled over the updated world, covering
    /// both the pre-tick modifications and the cells the application just
    /// touched.
    pub fn finish_tick(&mut self, world: &mut World) {
        if self.schedule_after_apply {
            self.schedule_after_apply = false;
            self.schedule(world);
        }
    }

    fn force_complete(&mut self, world: &mut World) {
        if let Some(task) = self.active.take() {
            let results = task.complete();
            self.pending.extend(results);
            world.release_locks(&self.locked, LockOwner::Liquid);
            self.locked.clear();
        }
    }

    /// Converts pending results into commands, dropping no-ops where the
    /// live cell already matches by id and metadata.
    fn drain_pending(&mut self, world: &World) -> Vec<SetBlockCommand> {
        let extent = world.extent();
        let mut commands = Vec::new();
        for (position, block) in self.pending.drain() {
            let Some(chunk) = world.chunk_at(position.coord) else {
                tracing::debug!(coord = ?position.coord, "dropping liquid result for unloaded chunk");
                continue;
            };
            let local_pos = index_to_position(position.block_index, extent);
            let current = chunk.block_at(local_pos);
            if current == block && current.metadata == block.metadata {
                continue;
            }
            commands.push(SetBlockCommand {
                coord: position.coord,
                local_pos,
                block,
            });
        }
        commands
    }

    /// Groups the modified set by center chunk and spawns one background
    /// task relaxing every group against its own neighborhood snapshot.
    fn schedule(&mut self, world: &mut World) {
        if self.modified.is_empty() {
            return;
        }
        let mut groups: FxHashMap<ChunkCoord, Vec<ChunkBlockPosition>> = FxHashMap::default();
        for position in self.modified.drain() {
            groups.entry(position.coord).or_default().push(position);
        }

        let mut jobs: Vec<(ChunkCoord, Neighborhood<Block>, Vec<ChunkBlockPosition>)> = Vec::new();
        let mut locked: FxHashSet<ChunkCoord> = FxHashSet::default();
        for (center, positions) in groups {
            let blocks = world.block_neighborhood(center);
            for coord in blocks.present_coords(center) {
                locked.insert(coord);
            }
            world.request_locks_in_neighborhood(&blocks, center, LockOwner::Liquid);
            jobs.push((center, blocks, positions));
        }
        self.locked = locked.into_iter().collect();

        let extent = world.extent();
        self.active = Some(TaskHandle::spawn(move || {
            let mut results = RelaxResults::default();
            for (center, blocks, mut positions) in jobs {
                relax(extent, center, &blocks, &mut positions, &mut results);
            }
            results
        }));
    }
}

impl Default for LiquidSimulation {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
