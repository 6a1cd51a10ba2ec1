//! The world index: owns all streamed chunks, keyed by grid coordinate.
//!
//! Chunks spawn within a Euclidean X/Z radius around a reference position
//! (capped per update to amortize cost) and despawn beyond it, unless an
//! advisory lock defers the despawn to a later pass.

use glam::{IVec3, Vec3};
use rustc_hash::FxHashMap;
use sandvox_block::Block;
use sandvox_grid::{ChunkCoord, volume};
use thiserror::Error;

use crate::chunk::{Chunk, LockOwner};
use crate::neighborhood::Neighborhood;

/// Errors surfaced by world-level block access.
#[derive(Debug, Error)]
pub enum WorldError {
    /// No chunk is loaded at the given coordinate.
    #[error("no chunk at {0:?}")]
    ChunkNotFound(ChunkCoord),
    /// A local position was outside the chunk extent.
    #[error("local position {0} outside chunk extent")]
    OutOfBounds(IVec3),
}

/// Chunks spawned and despawned by one streaming pass.
#[derive(Debug, Default)]
pub struct StreamingReport {
    pub spawned: Vec<ChunkCoord>,
    pub despawned: Vec<ChunkCoord>,
}

/// Owns every loaded chunk and drives streaming.
pub struct World {
    chunks: FxHashMap<ChunkCoord, Chunk>,
    extent: IVec3,
    render_distance: i32,
    max_spawned_per_update: usize,
}

impl World {
    /// Creates an empty world.
    ///
    /// `extent` is the per-chunk cell dimensions, `render_distance` the
    /// streaming radius in chunks, `max_spawned_per_update` the spawn cap
    /// applied by each [`update_streaming`](Self::update_streaming) pass.
    pub fn new(extent: IVec3, render_distance: i32, max_spawned_per_update: usize) -> Self {
        Self {
            chunks: FxHashMap::default(),
            extent,
            render_distance: render_distance.max(1),
            max_spawned_per_update: max_spawned_per_update.max(1),
        }
    }

    /// The per-chunk cell dimensions.
    pub fn extent(&self) -> IVec3 {
        self.extent
    }

    /// Cells per chunk.
    pub fn chunk_volume(&self) -> usize {
        volume(self.extent)
    }

    /// The streaming radius in chunks.
    pub fn render_distance(&self) -> i32 {
        self.render_distance
    }

    /// Number of currently loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Converts a world position to the coordinate of the containing chunk.
    pub fn world_to_chunk_coord(&self, world_position: Vec3) -> ChunkCoord {
        let x = (world_position.x / self.extent.x as f32).floor() as i32;
        let z = (world_position.z / self.extent.z as f32).floor() as i32;
        ChunkCoord::new(x, z)
    }

    /// World-space origin of the chunk at `coord`.
    pub fn chunk_origin(&self, coord: ChunkCoord) -> Vec3 {
        Vec3::new(
            (coord.x * self.extent.x) as f32,
            0.0,
            (coord.z * self.extent.z) as f32,
        )
    }

    /// Returns the chunk at `coord`, if loaded.
    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    /// Mutable access to the chunk at `coord`, if loaded.
    pub fn chunk_at_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Returns the chunk containing `world_position`, if loaded.
    pub fn chunk_at_world(&self, world_position: Vec3) -> Option<&Chunk> {
        self.chunk_at(self.world_to_chunk_coord(world_position))
    }

    /// Iterates over all loaded chunks.
    pub fn iter(&self) -> impl Iterator<Item = (&ChunkCoord, &Chunk)> {
        self.chunks.iter()
    }

    /// Mutable iteration over all loaded chunks.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ChunkCoord, &mut Chunk)> {
        self.chunks.iter_mut()
    }

    /// Spawns chunks inside the render radius around `reference` and
    /// despawns unlocked chunks outside it.
    ///
    /// Spawning is capped per pass; despawning of locked chunks is silently
    /// deferred and retried on a later pass.
    pub fn update_streaming(&mut self, reference: Vec3) -> StreamingReport {
        let center = self.world_to_chunk_coord(reference);
        let mut report = StreamingReport::default();
        self.spawn_near(center, &mut report);
        self.despawn_far(center, &mut report);
        report
    }

    fn spawn_near(&mut self, center: ChunkCoord, report: &mut StreamingReport) {
        let radius = self.render_distance;
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                // Actual Euclidean distance, not a square: corners of the
                // scan window beyond the radius are skipped.
                let magnitude = ((dx * dx + dz * dz) as f32).sqrt();
                if magnitude > radius as f32 {
                    continue;
                }

                let coord = center.offset(dx, dz);
                if self.chunks.contains_key(&coord) {
                    continue;
                }

                let origin = self.chunk_origin(coord);
                self.chunks.insert(coord, Chunk::new(coord, origin, self.extent));
                report.spawned.push(coord);

                if report.spawned.len() >= self.max_spawned_per_update {
                    return;
                }
            }
        }
    }

    fn despawn_far(&mut self, center: ChunkCoord, report: &mut StreamingReport) {
        let radius = self.render_distance as f32;
        let mut to_remove = Vec::new();
        for (coord, chunk) in &self.chunks {
            let dx = (coord.x - center.x) as f32;
            let dz = (coord.z - center.z) as f32;
            if (dx * dx + dz * dz).sqrt() <= radius {
                continue;
            }
            if chunk.is_locked() {
                continue;
            }
            to_remove.push(*coord);
        }
        for coord in to_remove {
            if let Some(mut chunk) = self.chunks.remove(&coord) {
                chunk.release_blocks();
                report.despawned.push(coord);
            }
        }
    }

    /// Snapshots the 3×3 block-buffer neighborhood around `center`.
    ///
    /// Chunks that are missing or not yet generated contribute an absent
    /// (empty) buffer.
    pub fn block_neighborhood(&self, center: ChunkCoord) -> Neighborhood<Block> {
        let mut neighborhood = Neighborhood::absent();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let coord = center.offset(dx, dz);
                let buffer = self
                    .chunk_at(coord)
                    .and_then(|chunk| chunk.valid_blocks())
                    .map(|blocks| blocks.to_vec())
                    .unwrap_or_default();
                neighborhood.set_buffer(center, coord, buffer);
            }
        }
        neighborhood
    }

    /// Requests `owner`'s lock on every chunk of the 3×3 neighborhood that
    /// contributed a buffer to `neighborhood`.
    pub fn request_locks_in_neighborhood<T>(
        &mut self,
        neighborhood: &Neighborhood<T>,
        center: ChunkCoord,
        owner: LockOwner,
    ) {
        for coord in neighborhood.present_coords(center) {
            if let Some(chunk) = self.chunk_at_mut(coord) {
                chunk.request_lock(owner);
            }
        }
    }

    /// Releases `owner`'s lock on the given coordinates.
    pub fn release_locks(&mut self, coords: &[ChunkCoord], owner: LockOwner) {
        for coord in coords {
            if let Some(chunk) = self.chunk_at_mut(*coord) {
                chunk.release_lock(owner);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LockOwner;
    use sandvox_block::BlockFlags;

    const EXTENT: IVec3 = IVec3::new(16, 50, 16);

    fn world() -> World {
        World::new(EXTENT, 2, 1000)
    }

    #[test]
    fn test_world_to_chunk_coord_floors() {
        let w = world();
        assert_eq!(w.world_to_chunk_coord(Vec3::new(0.0, 0.0, 0.0)), ChunkCoord::new(0, 0));
        assert_eq!(w.world_to_chunk_coord(Vec3::new(15.9, 0.0, 0.0)), ChunkCoord::new(0, 0));
        assert_eq!(w.world_to_chunk_coord(Vec3::new(16.0, 0.0, 0.0)), ChunkCoord::new(1, 0));
        assert_eq!(
            w.world_to_chunk_coord(Vec3::new(-0.1, 0.0, -16.1)),
            ChunkCoord::new(-1, -2)
        );
    }

    #[test]
    fn test_streaming_spawns_within_euclidean_radius() {
        let mut w = world();
        let report = w.update_streaming(Vec3::ZERO);

        assert!(report.spawned.contains(&ChunkCoord::new(0, 0)));
        assert!(report.spawned.contains(&ChunkCoord::new(2, 0)));
        // (2, 2) has distance sqrt(8) > 2 and must not spawn.
        assert!(!report.spawned.contains(&ChunkCoord::new(2, 2)));
        assert!(w.chunk_at(ChunkCoord::new(2, 2)).is_none());
    }

    #[test]
    fn test_spawn_cap_limits_per_pass() {
        let mut w = World::new(EXTENT, 4, 3);
        let report = w.update_streaming(Vec3::ZERO);
        assert_eq!(report.spawned.len(), 3);

        // The next pass continues where the previous one stopped.
        let report = w.update_streaming(Vec3::ZERO);
        assert_eq!(report.spawned.len(), 3);
        assert_eq!(w.loaded_count(), 6);
    }

    #[test]
    fn test_streaming_despawns_far_chunks() {
        let mut w = world();
        w.update_streaming(Vec3::ZERO);
        assert!(w.chunk_at(ChunkCoord::new(0, 0)).is_some());

        // Move far away; the old chunks fall out of the radius.
        let far = Vec3::new(100.0 * EXTENT.x as f32, 0.0, 0.0);
        let report = w.update_streaming(far);
        assert!(report.despawned.contains(&ChunkCoord::new(0, 0)));
        assert!(w.chunk_at(ChunkCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_locked_chunk_despawn_deferred() {
        let mut w = world();
        w.update_streaming(Vec3::ZERO);
        w.chunk_at_mut(ChunkCoord::new(0, 0))
            .unwrap()
            .request_lock(LockOwner::Mesh);

        let far = Vec3::new(100.0 * EXTENT.x as f32, 0.0, 0.0);
        let report = w.update_streaming(far);
        assert!(!report.despawned.contains(&ChunkCoord::new(0, 0)));
        assert!(w.chunk_at(ChunkCoord::new(0, 0)).is_some());

        // After release the next pass removes it.
        w.chunk_at_mut(ChunkCoord::new(0, 0))
            .unwrap()
            .release_lock(LockOwner::Mesh);
        let report = w.update_streaming(far);
        assert!(report.despawned.contains(&ChunkCoord::new(0, 0)));
    }

    #[test]
    fn test_block_neighborhood_skips_invalid_chunks() {
        let mut w = world();
        w.update_streaming(Vec3::ZERO);

        let center = ChunkCoord::new(0, 0);
        // Only the east neighbor gets valid data.
        let east = ChunkCoord::new(1, 0);
        let block = Block::new(1, 0, 0, 0, BlockFlags::empty());
        w.chunk_at_mut(east).unwrap().set_block_at(IVec3::ZERO, block);

        let neighborhood = w.block_neighborhood(center);
        assert!(neighborhood.try_get_buffer(center, east).is_some());
        assert!(neighborhood.try_get_buffer(center, center).is_none());
        assert!(
            neighborhood
                .try_get_buffer(center, ChunkCoord::new(-1, 0))
                .is_none()
        );
    }

    #[test]
    fn test_neighborhood_locks_follow_present_buffers() {
        let mut w = world();
        w.update_streaming(Vec3::ZERO);
        let center = ChunkCoord::new(0, 0);
        let east = ChunkCoord::new(1, 0);
        let block = Block::new(1, 0, 0, 0, BlockFlags::empty());
        w.chunk_at_mut(east).unwrap().set_block_at(IVec3::ZERO, block);

        let neighborhood = w.block_neighborhood(center);
        w.request_locks_in_neighborhood(&neighborhood, center, LockOwner::Lighting);

        assert!(w.chunk_at(east).unwrap().is_locked());
        assert!(!w.chunk_at(center).unwrap().is_locked());

        w.release_locks(&[east], LockOwner::Lighting);
        assert!(!w.chunk_at(east).unwrap().is_locked());
    }

    #[test]
    fn test_chunk_at_world() {
        let mut w = world();
        w.update_streaming(Vec3::ZERO);
        let chunk = w.chunk_at_world(Vec3::new(17.0, 3.0, 2.0)).unwrap();
        assert_eq!(chunk.coord(), ChunkCoord::new(1, 0));
    }
}
