//! The lighting engine: classifies block edits into flood-fill operations,
//! runs them as background jobs over 3×3 neighborhood snapshots, and pushes
//! recomputed attenuation volumes once everything settles.
//!
//! At most one job runs at a time. Every entry point force-completes the
//! running job first, so lightmap reads always observe settled values and a
//! new job never races an old one on the same data.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, position_to_index};
use sandvox_world::{BlockChanged, LockOwner, Neighborhood, TaskHandle, World};

use crate::chunk_light::LightChunk;
use crate::flood::{self, LightingContext};
use crate::light::{LightChannel, sunlight, torchlight};

/// Receives settled attenuation volumes; the render side of the boundary.
pub trait AttenuationSink {
    fn upload_attenuation(&mut self, coord: ChunkCoord, light: &LightChunk);
}

/// One flood-fill operation to run against a neighborhood snapshot.
#[derive(Clone, Copy, Debug)]
enum LightingOp {
    SeedSkylight,
    BlockerRemoved {
        block_index: usize,
        sunlight: bool,
        torchlight: bool,
    },
    SunlightBlocked { block_index: usize, sunlight_value: u8 },
    TorchPlaced { block_index: usize, emission: u8 },
    TorchRemoved { block_index: usize, emission: u8 },
}

struct ActiveJob {
    locked: Vec<ChunkCoord>,
    task: TaskHandle<LightingContext>,
}

/// Owns every chunk's lightmap and drives incremental relighting.
pub struct LightingEngine {
    sunlight_enabled: bool,
    torchlight_enabled: bool,
    light_chunks: FxHashMap<ChunkCoord, LightChunk>,
    generation_queue: VecDeque<ChunkCoord>,
    modified: FxHashSet<ChunkCoord>,
    active: Option<ActiveJob>,
}

impl LightingEngine {
    /// Creates an engine with the given channel toggles.
    pub fn new(sunlight_enabled: bool, torchlight_enabled: bool) -> Self {
        Self {
            sunlight_enabled,
            torchlight_enabled,
            light_chunks: FxHashMap::default(),
            generation_queue: VecDeque::new(),
            modified: FxHashSet::default(),
            active: None,
        }
    }

    /// The lightmap of a chunk, if the engine tracks one.
    pub fn light_chunk(&self, coord: ChunkCoord) -> Option<&LightChunk> {
        self.light_chunks.get(&coord)
    }

    /// Returns `true` while a job runs or work is still queued.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.generation_queue.is_empty() || !self.modified.is_empty()
    }

    /// Queues a freshly generated chunk for skylight seeding.
    ///
    /// Seeding runs one chunk per update pass, after the previous job's
    /// results have been applied.
    pub fn on_chunk_generated(&mut self, coord: ChunkCoord) {
        if self.sunlight_enabled {
            self.generation_queue.push_back(coord);
        }
    }

    /// Force-completes the running job when it involves `coord`.
    ///
    /// Called before an edit mutates the chunk, so the job's write-back
    /// cannot race the edit.
    pub fn on_chunk_changing(&mut self, world: &mut World, coord: ChunkCoord) {
        let involves_coord = self
            .active
            .as_ref()
            .is_some_and(|active| active.locked.contains(&coord));
        if involves_coord {
            tracing::debug!(?coord, "edit forced a lighting job to completion");
            self.complete_active(world);
        }
    }

    /// Classifies a block edit and schedules the matching relight operations.
    pub fn on_block_changed(&mut self, world: &mut World, change: &BlockChanged) {
        let old = change.old_block;
        let new = change.new_block;
        if have_same_lighting_properties(old, new) {
            return;
        }
        let Some(chunk) = world.chunk_at(change.coord) else {
            return;
        };
        if chunk.valid_blocks().is_none() {
            return;
        }

        // Settle any in-flight job so the lightmap reads below are current.
        self.complete_active(world);

        let extent = world.extent();
        let block_index = position_to_index(change.local_pos, extent);
        let coord = change.coord;
        self.add_orthogonal_neighbors_to_modified(coord);

        if new.passes_light() {
            if self.sunlight_enabled || self.torchlight_enabled {
                self.schedule(
                    world,
                    coord,
                    LightingOp::BlockerRemoved {
                        block_index,
                        sunlight: self.sunlight_enabled,
                        torchlight: self.torchlight_enabled,
                    },
                );
            }
        } else {
            let value = self
                .light_chunks
                .get(&coord)
                .map(|light| light.values()[block_index])
                .unwrap_or(0);

            if !new.emits_light() && self.torchlight_enabled {
                let torchlight_value = torchlight(value);
                if torchlight_value > 0 {
                    self.schedule(
                        world,
                        coord,
                        LightingOp::TorchRemoved {
                            block_index,
                            emission: torchlight_value,
                        },
                    );
                }
            }

            let sunlight_value = sunlight(value);
            if sunlight_value > 0 && self.sunlight_enabled {
                self.schedule(
                    world,
                    coord,
                    LightingOp::SunlightBlocked {
                        block_index,
                        sunlight_value,
                    },
                );
            }
        }

        if self.torchlight_enabled {
            if old.emits_light() {
                self.schedule(
                    world,
                    coord,
                    LightingOp::TorchRemoved {
                        block_index,
                        emission: old.emission,
                    },
                );
            }
            if new.emits_light() {
                self.schedule(
                    world,
                    coord,
                    LightingOp::TorchPlaced {
                        block_index,
                        emission: new.emission,
                    },
                );
            }
        }
    }

    /// Drops all lighting state for a despawned chunk.
    pub fn forget(&mut self, world: &mut World, coord: ChunkCoord) {
        let involves_coord = self
            .active
            .as_ref()
            .is_some_and(|active| active.locked.contains(&coord));
        if involves_coord {
            self.complete_active(world);
        }
        self.light_chunks.remove(&coord);
        self.generation_queue.retain(|c| *c != coord);
        self.modified.remove(&coord);
    }

    /// Polls the running job, recomputes attenuation once settled, and
    /// starts the next queued skylight seeding.
    pub fn update(&mut self, world: &mut World, sink: &mut dyn AttenuationSink) {
        let done = self.active.as_ref().is_some_and(|a| a.task.is_done());
        if done {
            self.complete_active(world);
        }
        if self.active.is_some() {
            return;
        }

        if !self.modified.is_empty() {
            self.recompute_modified_attenuation(world, sink);
            self.modified.clear();
        }

        if self.sunlight_enabled
            && let Some(coord) = self.generation_queue.pop_front()
        {
            self.add_orthogonal_neighbors_to_modified(coord);
            self.schedule(world, coord, LightingOp::SeedSkylight);
        }
    }

    /// Finishes every outstanding job and settle step synchronously.
    pub fn complete_all(&mut self, world: &mut World, sink: &mut dyn AttenuationSink) {
        while self.is_busy() {
            self.complete_active(world);
            self.update(world, sink);
        }
    }

    fn add_orthogonal_neighbors_to_modified(&mut self, coord: ChunkCoord) {
        // Added unconditionally so border attenuation refreshes even where
        // no light value changed.
        self.modified.insert(coord);
        for neighbor in coord.orthogonal_neighbors() {
            self.modified.insert(neighbor);
        }
    }

    /// Snapshots the 3×3 lightmap neighborhood around `center`.
    ///
    /// Every loaded chunk with valid block data contributes a lightmap,
    /// materialized dark on first contact, so light can flow into a
    /// neighbor before that neighbor's own skylight seeding has run.
    fn lightmap_neighborhood(&mut self, world: &World, center: ChunkCoord) -> Neighborhood<u8> {
        let extent = world.extent();
        let mut neighborhood = Neighborhood::absent();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let coord = center.offset(dx, dz);
                let has_blocks = world
                    .chunk_at(coord)
                    .is_some_and(|chunk| chunk.valid_blocks().is_some());
                let buffer = if has_blocks {
                    self.light_chunks
                        .entry(coord)
                        .or_insert_with(|| LightChunk::new(extent))
                        .values()
                        .to_vec()
                } else {
                    Vec::new()
                };
                neighborhood.set_buffer(center, coord, buffer);
            }
        }
        neighborhood
    }

    fn schedule(&mut self, world: &mut World, center: ChunkCoord, op: LightingOp) {
        self.complete_active(world);

        let blocks = world.block_neighborhood(center);
        let lightmaps = self.lightmap_neighborhood(world, center);
        let locked = lightmaps.present_coords(center);
        world.request_locks_in_neighborhood(&lightmaps, center, LockOwner::Lighting);

        let extent = world.extent();
        let task = TaskHandle::spawn(move || {
            let mut ctx = LightingContext::new(extent, center, blocks, lightmaps);
            run_op(&mut ctx, op);
            ctx
        });

        self.active = Some(ActiveJob { locked, task });
    }

    /// Joins the running job, writes its lightmaps back, and merges the
    /// chunks it touched into the modified set.
    fn complete_active(&mut self, world: &mut World) {
        let Some(active) = self.active.take() else {
            return;
        };
        let ctx = active.task.complete();
        world.release_locks(&active.locked, LockOwner::Lighting);

        for coord in ctx.lightmaps.present_coords(ctx.center) {
            let Some(buffer) = ctx.lightmaps.try_get_buffer(ctx.center, coord) else {
                continue;
            };
            if let Some(light) = self.light_chunks.get_mut(&coord) {
                light.values_mut().copy_from_slice(buffer);
            }
        }
        self.modified.extend(ctx.modified);
    }

    fn recompute_modified_attenuation(&mut self, world: &World, sink: &mut dyn AttenuationSink) {
        let coords: Vec<ChunkCoord> = self.modified.iter().copied().collect();
        for coord in coords {
            if world.chunk_at(coord).is_none() || !self.light_chunks.contains_key(&coord) {
                continue;
            }
            let lightmaps = self.lightmap_neighborhood(world, coord);
            let light = self
                .light_chunks
                .get_mut(&coord)
                .expect("presence checked above");
            light.recompute_attenuation(&lightmaps, coord);
            sink.upload_attenuation(coord, light);
        }
    }
}

fn run_op(ctx: &mut LightingContext, op: LightingOp) {
    let mut queue = VecDeque::new();
    match op {
        LightingOp::SeedSkylight => flood::seed_skylight(ctx, &mut queue),
        LightingOp::BlockerRemoved {
            block_index,
            sunlight,
            torchlight,
        } => {
            let center = ctx.center;
            if sunlight {
                flood::seed_from_neighbors(ctx, &mut queue, center, block_index, LightChannel::Sun);
            }
            if torchlight {
                let mut torch_queue = VecDeque::new();
                flood::seed_from_neighbors(
                    ctx,
                    &mut torch_queue,
                    center,
                    block_index,
                    LightChannel::Torch,
                );
            }
        }
        LightingOp::SunlightBlocked {
            block_index,
            sunlight_value,
        } => {
            let mut removal = VecDeque::new();
            flood::block_sunlight(ctx, &mut removal, &mut queue, block_index, sunlight_value);
        }
        LightingOp::TorchPlaced {
            block_index,
            emission,
        } => flood::place_torch(ctx, &mut queue, block_index, emission),
        LightingOp::TorchRemoved {
            block_index,
            emission,
        } => {
            let mut removal = VecDeque::new();
            flood::remove_torch(ctx, &mut removal, &mut queue, block_index, emission);
        }
    }
}

/// Edits between blocks with identical lighting behavior need no relight.
fn have_same_lighting_properties(a: Block, b: Block) -> bool {
    a.passes_light() == b.passes_light() && a.emission == b.emission
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec3, Vec3};
    use sandvox_block::BlockFlags;
    use sandvox_grid::position_to_index;

    use crate::light::MAX_LIGHT;

    const EXTENT: IVec3 = IVec3::new(8, 8, 8);

    struct CollectingSink {
        uploads: Vec<ChunkCoord>,
    }

    impl AttenuationSink for CollectingSink {
        fn upload_attenuation(&mut self, coord: ChunkCoord, _light: &LightChunk) {
            self.uploads.push(coord);
        }
    }

    fn opaque() -> Block {
        Block::new(1, 0, 0, 0, BlockFlags::empty())
    }

    fn torch_block(emission: u8) -> Block {
        Block::new(2, 0, 0, emission, BlockFlags::TRANSPARENT)
    }

    /// A streamed world whose center chunk is generated empty.
    fn world_with_generated_center() -> (World, ChunkCoord) {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(Vec3::ZERO);
        let coord = ChunkCoord::new(0, 0);
        let chunk = world.chunk_at_mut(coord).unwrap();
        chunk.blocks_mut();
        chunk.mark_generated();
        (world, coord)
    }

    fn settle(engine: &mut LightingEngine, world: &mut World, sink: &mut CollectingSink) {
        let start = std::time::Instant::now();
        while engine.is_busy() {
            engine.update(world, sink);
            assert!(start.elapsed().as_secs() < 10, "lighting never settled");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    fn sun_at(engine: &LightingEngine, coord: ChunkCoord, local: IVec3) -> u8 {
        let light = engine.light_chunk(coord).expect("light chunk exists");
        sunlight(light.values()[position_to_index(local, EXTENT)])
    }

    fn torch_at(engine: &LightingEngine, coord: ChunkCoord, local: IVec3) -> u8 {
        let light = engine.light_chunk(coord).expect("light chunk exists");
        torchlight(light.values()[position_to_index(local, EXTENT)])
    }

    #[test]
    fn test_generated_chunk_seeds_skylight() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };

        engine.on_chunk_generated(coord);
        settle(&mut engine, &mut world, &mut sink);

        // Open sky: the whole column reads max sunlight.
        assert_eq!(sun_at(&engine, coord, IVec3::new(3, 0, 3)), MAX_LIGHT);
        assert_eq!(sun_at(&engine, coord, IVec3::new(3, EXTENT.y - 1, 3)), MAX_LIGHT);
        assert!(sink.uploads.contains(&coord), "attenuation pushed on settle");
        assert!(
            !world.chunk_at(coord).unwrap().is_locked(),
            "lighting lock released"
        );
    }

    #[test]
    fn test_attenuation_refresh_includes_orthogonal_neighbors() {
        let (mut world, coord) = world_with_generated_center();
        // Generate the east neighbor too so it has a lightmap to refresh.
        let east = coord.offset(1, 0);
        let chunk = world.chunk_at_mut(east).unwrap();
        chunk.blocks_mut();
        chunk.mark_generated();

        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };
        engine.on_chunk_generated(east);
        engine.on_chunk_generated(coord);
        engine.complete_all(&mut world, &mut sink);

        assert!(!engine.is_busy());
        assert!(sink.uploads.contains(&coord));
        assert!(sink.uploads.contains(&east));
    }

    #[test]
    fn test_torch_edit_lights_neighbors() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };
        engine.on_chunk_generated(coord);
        settle(&mut engine, &mut world, &mut sink);

        let local = IVec3::new(4, 4, 4);
        let old = world.chunk_at_mut(coord).unwrap().set_block_at(local, torch_block(10));
        engine.on_block_changed(
            &mut world,
            &BlockChanged {
                coord,
                local_pos: local,
                old_block: old,
                new_block: torch_block(10),
            },
        );
        settle(&mut engine, &mut world, &mut sink);

        assert_eq!(torch_at(&engine, coord, local), 10);
        assert_eq!(torch_at(&engine, coord, IVec3::new(5, 4, 4)), 9);
    }

    #[test]
    fn test_torch_removal_darkens() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };
        engine.on_chunk_generated(coord);
        settle(&mut engine, &mut world, &mut sink);

        let local = IVec3::new(4, 4, 4);
        let torch = torch_block(10);
        let old = world.chunk_at_mut(coord).unwrap().set_block_at(local, torch);
        engine.on_block_changed(
            &mut world,
            &BlockChanged {
                coord,
                local_pos: local,
                old_block: old,
                new_block: torch,
            },
        );
        settle(&mut engine, &mut world, &mut sink);

        let old = world.chunk_at_mut(coord).unwrap().set_block_at(local, Block::EMPTY);
        engine.on_block_changed(
            &mut world,
            &BlockChanged {
                coord,
                local_pos: local,
                old_block: old,
                new_block: Block::EMPTY,
            },
        );
        settle(&mut engine, &mut world, &mut sink);

        assert_eq!(torch_at(&engine, coord, local), 0);
        assert_eq!(torch_at(&engine, coord, IVec3::new(5, 4, 4)), 0);
    }

    #[test]
    fn test_placing_blocker_in_sunlit_column_zeroes_below() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };
        engine.on_chunk_generated(coord);
        settle(&mut engine, &mut world, &mut sink);

        // Cap the entire top layer so no side path survives.
        for x in 0..EXTENT.x {
            for z in 0..EXTENT.z {
                let local = IVec3::new(x, EXTENT.y - 1, z);
                let old = world.chunk_at_mut(coord).unwrap().set_block_at(local, opaque());
                engine.on_block_changed(
                    &mut world,
                    &BlockChanged {
                        coord,
                        local_pos: local,
                        old_block: old,
                        new_block: opaque(),
                    },
                );
                settle(&mut engine, &mut world, &mut sink);
            }
        }

        assert_eq!(sun_at(&engine, coord, IVec3::new(3, 0, 3)), 0);
        assert_eq!(sun_at(&engine, coord, IVec3::new(3, EXTENT.y - 2, 3)), 0);
    }

    #[test]
    fn test_disabled_sunlight_skips_seeding() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(false, true);
        let mut sink = CollectingSink { uploads: vec![] };

        engine.on_chunk_generated(coord);
        for _ in 0..3 {
            engine.update(&mut world, &mut sink);
        }
        assert!(engine.light_chunk(coord).is_none());
        assert!(sink.uploads.is_empty());
    }

    #[test]
    fn test_same_lighting_properties_edit_is_ignored() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);

        // Swapping one opaque block for another never relights.
        let mut other = opaque();
        other.id = 7;
        engine.on_block_changed(
            &mut world,
            &BlockChanged {
                coord,
                local_pos: IVec3::new(1, 1, 1),
                old_block: opaque(),
                new_block: other,
            },
        );
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_forget_drops_state() {
        let (mut world, coord) = world_with_generated_center();
        let mut engine = LightingEngine::new(true, true);
        let mut sink = CollectingSink { uploads: vec![] };
        engine.on_chunk_generated(coord);
        settle(&mut engine, &mut world, &mut sink);

        engine.forget(&mut world, coord);
        assert!(engine.light_chunk(coord).is_none());
        assert!(!engine.is_busy());
    }
}
