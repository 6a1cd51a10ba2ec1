//! Background chunk generation.
//!
//! Each freshly streamed chunk is filled by one background task running the
//! classifier column by column. The chunk stays locked for the duration so
//! streaming cannot despawn it, and the finished buffer is copied in on the
//! main thread before the chunk is reported as generated.

use std::sync::Arc;

use glam::IVec3;
use rustc_hash::FxHashMap;
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, position_to_index, volume};
use sandvox_world::{LockOwner, TaskHandle, World};

use crate::TerrainClassifier;

/// Runs terrain classification for invalid chunks on background tasks.
pub struct ChunkGenerator {
    classifier: Arc<dyn TerrainClassifier>,
    active: FxHashMap<ChunkCoord, TaskHandle<Vec<Block>>>,
    max_concurrent: usize,
}

impl ChunkGenerator {
    /// Creates a generator running at most `max_concurrent` tasks at a time.
    pub fn new(classifier: Arc<dyn TerrainClassifier>, max_concurrent: usize) -> Self {
        Self {
            classifier,
            active: FxHashMap::default(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Number of generation tasks currently in flight.
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }

    /// Collects finished tasks and schedules new ones for invalid chunks.
    ///
    /// Returns the coordinates of chunks that finished generating this pass,
    /// in no particular order.
    pub fn update(&mut self, world: &mut World) -> Vec<ChunkCoord> {
        let mut generated = self.collect_finished(world);
        self.schedule_pending(world);
        generated.sort();
        generated
    }

    fn collect_finished(&mut self, world: &mut World) -> Vec<ChunkCoord> {
        let done: Vec<ChunkCoord> = self
            .active
            .iter()
            .filter(|(_, task)| task.is_done())
            .map(|(coord, _)| *coord)
            .collect();

        let mut generated = Vec::new();
        for coord in done {
            let task = self.active.remove(&coord).expect("coord came from the map");
            let blocks = task.complete();

            let Some(chunk) = world.chunk_at_mut(coord) else {
                // The lock should have pinned the chunk; nothing to release.
                tracing::warn!(?coord, "generated chunk disappeared mid-task");
                continue;
            };
            if chunk.is_valid() {
                // An edit beat the generator to it; keep the edited buffer.
                tracing::debug!(?coord, "skipping generation result for edited chunk");
            } else {
                chunk.blocks_mut().copy_from_slice(&blocks);
                chunk.mark_generated();
                generated.push(coord);
            }
            chunk.release_lock(LockOwner::Terrain);
        }
        generated
    }

    fn schedule_pending(&mut self, world: &mut World) {
        if self.active.len() >= self.max_concurrent {
            return;
        }

        let pending: Vec<ChunkCoord> = world
            .iter()
            .filter(|(coord, chunk)| !chunk.is_valid() && !self.active.contains_key(coord))
            .map(|(coord, _)| *coord)
            .collect();

        for coord in pending {
            if self.active.len() >= self.max_concurrent {
                break;
            }
            let Some(chunk) = world.chunk_at_mut(coord) else {
                continue;
            };
            chunk.request_lock(LockOwner::Terrain);
            let origin = chunk.origin();
            let extent = chunk.extent();
            let classifier = Arc::clone(&self.classifier);

            let task = TaskHandle::spawn(move || {
                let mut blocks = vec![Block::EMPTY; volume(extent)];
                let mut column = vec![Block::EMPTY; extent.y as usize];
                for z in 0..extent.z {
                    for x in 0..extent.x {
                        classifier.fill_column(origin, x, z, &mut column);
                        for y in 0..extent.y {
                            blocks[position_to_index(IVec3::new(x, y, z), extent)] =
                                column[y as usize];
                        }
                    }
                }
                blocks
            });
            self.active.insert(coord, task);
        }
    }

    /// Finishes every in-flight task synchronously and applies the results.
    pub fn complete_all(&mut self, world: &mut World) -> Vec<ChunkCoord> {
        let coords: Vec<ChunkCoord> = self.active.keys().copied().collect();
        let mut generated = Vec::new();
        for coord in coords {
            let task = self.active.remove(&coord).expect("coord came from the map");
            let blocks = task.complete();
            if let Some(chunk) = world.chunk_at_mut(coord) {
                if !chunk.is_valid() {
                    chunk.blocks_mut().copy_from_slice(&blocks);
                    chunk.mark_generated();
                    generated.push(coord);
                }
                chunk.release_lock(LockOwner::Terrain);
            }
        }
        generated
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sandvox_block::BlockFlags;

    const EXTENT: IVec3 = IVec3::new(16, 50, 16);

    /// Fills everything below y = 4 with stone.
    struct FlatTerrain;

    impl TerrainClassifier for FlatTerrain {
        fn fill_column(&self, _origin: Vec3, _x: i32, _z: i32, column: &mut [Block]) {
            for (y, cell) in column.iter_mut().enumerate() {
                *cell = if y < 4 {
                    Block::new(1, 0, 0, 0, BlockFlags::empty())
                } else {
                    Block::EMPTY
                };
            }
        }
    }

    fn drive_until_generated(generator: &mut ChunkGenerator, world: &mut World) -> Vec<ChunkCoord> {
        let mut generated = Vec::new();
        let start = std::time::Instant::now();
        loop {
            generated.extend(generator.update(world));
            let any_invalid = world.iter().any(|(_, c)| !c.is_valid());
            if !any_invalid && generator.in_flight() == 0 {
                return generated;
            }
            assert!(start.elapsed().as_secs() < 10, "generation never settled");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_generates_all_spawned_chunks() {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(Vec3::ZERO);
        let spawned = world.loaded_count();

        let mut generator = ChunkGenerator::new(Arc::new(FlatTerrain), 2);
        let generated = drive_until_generated(&mut generator, &mut world);
        assert_eq!(generated.len(), spawned);

        let chunk = world.chunk_at(ChunkCoord::new(0, 0)).unwrap();
        assert!(chunk.is_valid());
        assert!(chunk.block_at(IVec3::new(0, 0, 0)).exists());
        assert!(!chunk.block_at(IVec3::new(0, 10, 0)).exists());
        assert!(!chunk.is_locked(), "terrain lock released after generation");
    }

    #[test]
    fn test_complete_all_is_synchronous() {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(Vec3::ZERO);

        let mut generator = ChunkGenerator::new(Arc::new(FlatTerrain), 8);
        generator.update(&mut world); // schedule
        let generated = generator.complete_all(&mut world);
        assert!(!generated.is_empty());
        assert_eq!(generator.in_flight(), 0);
        for coord in generated {
            assert!(world.chunk_at(coord).unwrap().is_valid());
        }
    }

    #[test]
    fn test_edited_chunk_not_overwritten() {
        let mut world = World::new(EXTENT, 1, 1000);
        world.update_streaming(Vec3::ZERO);

        let coord = ChunkCoord::new(0, 0);
        let marker = Block::new(9, 0, 0, 0, BlockFlags::empty());
        world
            .chunk_at_mut(coord)
            .unwrap()
            .set_block_at(IVec3::new(0, 30, 0), marker);

        let mut generator = ChunkGenerator::new(Arc::new(FlatTerrain), 8);
        generator.update(&mut world);
        generator.complete_all(&mut world);

        // The edit marked the chunk valid, so the generator left it alone.
        assert_eq!(
            world.chunk_at(coord).unwrap().block_at(IVec3::new(0, 30, 0)),
            marker
        );
    }
}
