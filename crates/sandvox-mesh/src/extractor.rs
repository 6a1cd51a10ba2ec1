//! Background mesh extraction per dirty chunk.
//!
//! The extractor keeps a dirty set, runs at most one extraction task at a
//! time on a snapshot of the chunk's block buffer, and holds the chunk's
//! advisory lock for the task's duration. A result whose source chunk
//! changed mid-flight is discarded and the chunk immediately re-queued;
//! stale geometry is never uploaded.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use sandvox_block::{BlockRegistry, BlockUv};
use sandvox_grid::ChunkCoord;
use sandvox_world::{LockOwner, TaskHandle, World};

use crate::buffers::MeshBuffers;
use crate::greedy::extract_mesh;

/// Receives finished chunk meshes; the render side of the boundary.
pub trait MeshSink {
    fn upload_mesh(&mut self, coord: ChunkCoord, mesh: &MeshBuffers);
}

struct ActiveExtraction {
    coord: ChunkCoord,
    version: u64,
    task: TaskHandle<(MeshBuffers, Vec<bool>)>,
}

/// Schedules greedy extraction for chunks whose blocks changed.
pub struct MeshExtractor {
    mesh_group: u8,
    submesh_count: usize,
    uvs: Arc<Vec<BlockUv>>,
    dirty: FxHashSet<ChunkCoord>,
    active: Option<ActiveExtraction>,
    // Buffers from the previous task, reused to avoid reallocation.
    spare: Option<(MeshBuffers, Vec<bool>)>,
}

impl MeshExtractor {
    /// Creates an extractor for one mesh group, sized by the registry's
    /// material count.
    pub fn new(mesh_group: u8, registry: &BlockRegistry) -> Self {
        Self {
            mesh_group,
            submesh_count: registry.material_count().max(1),
            uvs: Arc::new(registry.uv_table().to_vec()),
            dirty: FxHashSet::default(),
            active: None,
            spare: None,
        }
    }

    /// The mesh group this extractor emits.
    pub fn mesh_group(&self) -> u8 {
        self.mesh_group
    }

    /// Queues a chunk for (re-)extraction.
    pub fn mark_dirty(&mut self, coord: ChunkCoord) {
        self.dirty.insert(coord);
    }

    /// Returns `true` while any extraction work is queued or running.
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.dirty.is_empty()
    }

    /// Force-completes the running task if it targets `coord`.
    ///
    /// Called before an edit mutates the chunk; the in-flight result is
    /// discarded (it is stale by definition) and the chunk re-queued.
    pub fn on_chunk_changing(&mut self, world: &mut World, coord: ChunkCoord) {
        let targets_coord = self
            .active
            .as_ref()
            .is_some_and(|active| active.coord == coord);
        if !targets_coord {
            return;
        }
        self.discard_active(world);
        self.dirty.insert(coord);
    }

    /// Drops all bookkeeping for a despawned chunk.
    pub fn forget(&mut self, world: &mut World, coord: ChunkCoord) {
        self.dirty.remove(&coord);
        let targets_coord = self
            .active
            .as_ref()
            .is_some_and(|active| active.coord == coord);
        if targets_coord {
            self.discard_active(world);
        }
    }

    fn discard_active(&mut self, world: &mut World) {
        if let Some(active) = self.active.take() {
            let buffers = active.task.complete();
            self.spare = Some(buffers);
            world.release_locks(&[active.coord], LockOwner::Mesh);
        }
    }

    /// Polls the running task and schedules the next dirty chunk.
    ///
    /// Finished meshes whose chunk is unchanged are pushed to `sink`; stale
    /// ones are discarded and rescheduled.
    pub fn update(&mut self, world: &mut World, sink: &mut dyn MeshSink) {
        self.finish_active_if_done(world, sink);
        if self.active.is_none() {
            self.schedule_next(world);
        }
    }

    fn finish_active_if_done(&mut self, world: &mut World, sink: &mut dyn MeshSink) {
        let done = self.active.as_ref().is_some_and(|a| a.task.is_done());
        if !done {
            return;
        }
        let active = self.active.take().expect("checked above");
        let (buffers, visited) = active.task.complete();
        world.release_locks(&[active.coord], LockOwner::Mesh);

        match world.chunk_at(active.coord) {
            Some(chunk) if chunk.version() == active.version => {
                sink.upload_mesh(active.coord, &buffers);
            }
            Some(_) => {
                // The chunk changed while the task ran; never apply stale
                // geometry, extract again instead.
                tracing::debug!(coord = ?active.coord, "discarding stale mesh");
                self.dirty.insert(active.coord);
            }
            None => {}
        }
        self.spare = Some((buffers, visited));
    }

    fn schedule_next(&mut self, world: &mut World) {
        let Some(coord) = self.next_ready_coord(world) else {
            return;
        };
        self.dirty.remove(&coord);

        let Some(chunk) = world.chunk_at_mut(coord) else {
            return;
        };
        let Some(blocks) = chunk.valid_blocks() else {
            return;
        };

        let snapshot = blocks.to_vec();
        let extent = chunk.extent();
        let version = chunk.version();
        let volume = chunk.volume();
        chunk.request_lock(LockOwner::Mesh);

        let (mut buffers, mut visited) = self
            .spare
            .take()
            .unwrap_or_else(|| (MeshBuffers::new(volume, self.submesh_count), vec![false; volume]));

        let uvs = Arc::clone(&self.uvs);
        let mesh_group = self.mesh_group;
        let task = TaskHandle::spawn(move || {
            extract_mesh(&snapshot, extent, &uvs, mesh_group, &mut visited, &mut buffers);
            (buffers, visited)
        });

        self.active = Some(ActiveExtraction {
            coord,
            version,
            task,
        });
    }

    fn next_ready_coord(&self, world: &World) -> Option<ChunkCoord> {
        self.dirty
            .iter()
            .copied()
            .find(|coord| {
                world
                    .chunk_at(*coord)
                    .is_some_and(|chunk| chunk.valid_blocks().is_some())
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use sandvox_block::{Block, BlockDef, BlockFlags};

    const EXTENT: IVec3 = IVec3::new(8, 8, 8);

    fn registry() -> BlockRegistry {
        let mut reg = BlockRegistry::new();
        reg.register(
            BlockDef {
                name: "stone".to_string(),
                mesh_group: 0,
                material_index: 0,
                flags: BlockFlags::empty(),
                emission: 0,
                liquid_decay: 1,
            },
            BlockUv::default(),
        )
        .unwrap();
        reg
    }

    struct CollectingSink {
        uploads: Vec<(ChunkCoord, usize)>,
    }

    impl MeshSink for CollectingSink {
        fn upload_mesh(&mut self, coord: ChunkCoord, mesh: &MeshBuffers) {
            self.uploads.push((coord, mesh.vertex_count()));
        }
    }

    fn world_with_block() -> (World, ChunkCoord) {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(glam::Vec3::ZERO);
        let coord = ChunkCoord::new(0, 0);
        let stone = Block::new(0, 0, 0, 0, BlockFlags::empty());
        world
            .chunk_at_mut(coord)
            .unwrap()
            .set_block_at(IVec3::new(2, 2, 2), stone);
        (world, coord)
    }

    fn drive(extractor: &mut MeshExtractor, world: &mut World, sink: &mut CollectingSink) {
        let start = std::time::Instant::now();
        while extractor.is_busy() {
            extractor.update(world, sink);
            assert!(start.elapsed().as_secs() < 10, "extraction never settled");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_dirty_chunk_gets_extracted_and_uploaded() {
        let (mut world, coord) = world_with_block();
        let reg = registry();
        let mut extractor = MeshExtractor::new(0, &reg);
        let mut sink = CollectingSink { uploads: vec![] };

        extractor.mark_dirty(coord);
        drive(&mut extractor, &mut world, &mut sink);

        assert_eq!(sink.uploads.len(), 1);
        assert_eq!(sink.uploads[0].0, coord);
        assert_eq!(sink.uploads[0].1, 24, "one cube of visible faces");
        assert!(
            !world.chunk_at(coord).unwrap().is_locked(),
            "lock released after completion"
        );
    }

    #[test]
    fn test_stale_result_discarded_and_rescheduled() {
        let (mut world, coord) = world_with_block();
        let reg = registry();
        let mut extractor = MeshExtractor::new(0, &reg);
        let mut sink = CollectingSink { uploads: vec![] };

        extractor.mark_dirty(coord);
        // Start the task, then edit the chunk while it may still be running.
        extractor.update(&mut world, &mut sink);
        let stone = Block::new(0, 0, 0, 0, BlockFlags::empty());
        world
            .chunk_at_mut(coord)
            .unwrap()
            .set_block_at(IVec3::new(5, 5, 5), stone);

        drive(&mut extractor, &mut world, &mut sink);

        // The final upload reflects the post-edit chunk (two cubes).
        let last = sink.uploads.last().expect("an upload");
        assert_eq!(last.1, 48);
    }

    #[test]
    fn test_changing_discards_inflight_and_requeues() {
        let (mut world, coord) = world_with_block();
        let reg = registry();
        let mut extractor = MeshExtractor::new(0, &reg);
        let mut sink = CollectingSink { uploads: vec![] };

        extractor.mark_dirty(coord);
        extractor.update(&mut world, &mut sink);
        extractor.on_chunk_changing(&mut world, coord);

        assert!(
            !world.chunk_at(coord).unwrap().is_locked(),
            "force-completed task released its lock"
        );
        assert!(extractor.is_busy(), "chunk requeued after discard");

        drive(&mut extractor, &mut world, &mut sink);
        assert_eq!(sink.uploads.len(), 1);
    }

    #[test]
    fn test_invalid_chunks_are_not_extracted() {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(glam::Vec3::ZERO);
        let reg = registry();
        let mut extractor = MeshExtractor::new(0, &reg);
        let mut sink = CollectingSink { uploads: vec![] };

        extractor.mark_dirty(ChunkCoord::new(0, 0));
        extractor.update(&mut world, &mut sink);
        assert!(extractor.active.is_none());
        assert!(sink.uploads.is_empty());
    }

    #[test]
    fn test_forget_clears_bookkeeping() {
        let (mut world, coord) = world_with_block();
        let reg = registry();
        let mut extractor = MeshExtractor::new(0, &reg);

        extractor.mark_dirty(coord);
        extractor.forget(&mut world, coord);
        assert!(!extractor.is_busy());
    }
}
