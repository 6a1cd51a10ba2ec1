//! The world simulation facade.

use std::sync::Arc;

use glam::{IVec3, Vec3};
use sandvox_block::{Block, BlockRegistry};
use sandvox_config::EngineConfig;
use sandvox_grid::{ChunkCoord, out_of_bounds};
use sandvox_lighting::{AttenuationSink, LightingEngine};
use sandvox_liquid::LiquidSimulation;
use sandvox_mesh::{MeshExtractor, MeshSink};
use sandvox_terrain::{ChunkGenerator, TerrainClassifier};
use sandvox_world::{BlockChanged, World, WorldError};

/// Owns the world and every engine that reacts to it.
///
/// Drive it once per frame with [`update`](Self::update); edit blocks only
/// through [`set_block`](Self::set_block) so the engines observe every
/// change.
pub struct WorldSimulation {
    world: World,
    generator: ChunkGenerator,
    extractors: Vec<MeshExtractor>,
    lighting: LightingEngine,
    liquid: LiquidSimulation,
    tick_period: f32,
    time_to_next_tick: f32,
}

impl WorldSimulation {
    /// Assembles a simulation from configuration, a block registry and a
    /// terrain classifier.
    pub fn new(
        config: &EngineConfig,
        registry: &BlockRegistry,
        classifier: Arc<dyn TerrainClassifier>,
    ) -> Self {
        let extent = IVec3::new(
            config.world.chunk_size_x,
            config.world.chunk_size_y,
            config.world.chunk_size_z,
        );
        let world = World::new(
            extent,
            config.world.render_distance,
            config.world.max_spawned_chunks_per_update,
        );
        let extractors = (0..registry.mesh_group_count())
            .map(|group| MeshExtractor::new(group as u8, registry))
            .collect();

        Self {
            world,
            generator: ChunkGenerator::new(
                classifier,
                config.simulation.max_concurrent_generations,
            ),
            extractors,
            lighting: LightingEngine::new(config.lighting.sunlight, config.lighting.torchlight),
            liquid: LiquidSimulation::new(),
            tick_period: 1.0 / config.simulation.ticks_per_second.max(1) as f32,
            time_to_next_tick: 0.0,
        }
    }

    /// Read access to the world index.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The lighting engine, for render-side lightmap queries.
    pub fn lighting(&self) -> &LightingEngine {
        &self.lighting
    }

    /// Returns `true` while background work is running or queued anywhere.
    pub fn is_busy(&self) -> bool {
        self.generator.in_flight() > 0
            || self.world.iter().any(|(_, chunk)| !chunk.is_valid())
            || self.extractors.iter().any(|extractor| extractor.is_busy())
            || self.lighting.is_busy()
            || self.liquid.is_busy()
    }

    /// Writes a block, notifying every engine before and after the write.
    ///
    /// # Errors
    ///
    /// Fails when no chunk is loaded at `coord` or `local_pos` is outside
    /// the chunk extent.
    pub fn set_block(
        &mut self,
        coord: ChunkCoord,
        local_pos: IVec3,
        block: Block,
    ) -> Result<(), WorldError> {
        if out_of_bounds(local_pos, self.world.extent()) {
            return Err(WorldError::OutOfBounds(local_pos));
        }
        if self.world.chunk_at(coord).is_none() {
            return Err(WorldError::ChunkNotFound(coord));
        }

        self.dispatch_changing(coord);

        let chunk = self.world.chunk_at_mut(coord).expect("presence checked above");
        let old_block = chunk.set_block_at(local_pos, block);
        let change = BlockChanged {
            coord,
            local_pos,
            old_block,
            new_block: block,
        };
        self.dispatch_changed(&change);
        Ok(())
    }

    /// Writes the block containing `world_position`.
    pub fn set_block_at_world(
        &mut self,
        world_position: Vec3,
        block: Block,
    ) -> Result<(), WorldError> {
        let coord = self.world.world_to_chunk_coord(world_position);
        let chunk = self
            .world
            .chunk_at(coord)
            .ok_or(WorldError::ChunkNotFound(coord))?;
        let local_pos = chunk
            .try_local_position(world_position)
            .ok_or(WorldError::OutOfBounds(world_position.floor().as_ivec3()))?;
        self.set_block(coord, local_pos, block)
    }

    /// Runs one frame: streaming, terrain generation, the fixed-rate tick,
    /// and a poll of every background engine.
    pub fn update(
        &mut self,
        dt: f32,
        reference: Vec3,
        mesh_sink: &mut dyn MeshSink,
        attenuation_sink: &mut dyn AttenuationSink,
    ) {
        let report = self.world.update_streaming(reference);
        for coord in report.despawned {
            for extractor in &mut self.extractors {
                extractor.forget(&mut self.world, coord);
            }
            self.lighting.forget(&mut self.world, coord);
            self.liquid.forget(&mut self.world, coord);
        }

        for coord in self.generator.update(&mut self.world) {
            self.on_chunk_generated(coord);
        }

        self.time_to_next_tick += dt;
        if self.time_to_next_tick >= self.tick_period {
            self.time_to_next_tick -= self.tick_period;
            self.tick();
        }

        for extractor in &mut self.extractors {
            extractor.update(&mut self.world, mesh_sink);
        }
        self.lighting.update(&mut self.world, attenuation_sink);
    }

    fn on_chunk_generated(&mut self, coord: ChunkCoord) {
        for extractor in &mut self.extractors {
            extractor.mark_dirty(coord);
        }
        self.lighting.on_chunk_generated(coord);
        self.liquid.on_chunk_generated(&self.world, coord);
    }

    /// One liquid tick: collect the previous pass's flow, apply it through
    /// the normal edit path so every engine observes it, then let the
    /// simulation snapshot the updated world for the next relaxation.
    fn tick(&mut self) {
        let commands = self.liquid.tick(&mut self.world);
        for command in commands {
            match self.set_block(command.coord, command.local_pos, command.block) {
                Ok(()) => {}
                Err(WorldError::ChunkNotFound(coord)) => {
                    tracing::debug!(?coord, "liquid flow into a despawned chunk dropped");
                }
                Err(error) => {
                    tracing::warn!(%error, "liquid command rejected");
                }
            }
        }
        self.liquid.finish_tick(&mut self.world);
    }

    fn dispatch_changing(&mut self, coord: ChunkCoord) {
        for extractor in &mut self.extractors {
            extractor.on_chunk_changing(&mut self.world, coord);
        }
        self.lighting.on_chunk_changing(&mut self.world, coord);
        self.liquid.on_chunk_changing(&mut self.world);
    }

    fn dispatch_changed(&mut self, change: &BlockChanged) {
        for extractor in &mut self.extractors {
            extractor.mark_dirty(change.coord);
        }
        self.lighting.on_block_changed(&mut self.world, change);
        self.liquid.on_block_changed(self.world.extent(), change);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use sandvox_block::{BlockDef, BlockFlags, BlockUv};
    use sandvox_grid::position_to_index;
    use sandvox_lighting::{LightChunk, sunlight};
    use sandvox_mesh::MeshBuffers;

    /// Fills everything below y = 2 with stone.
    struct FlatTerrain {
        stone: Block,
    }

    impl TerrainClassifier for FlatTerrain {
        fn fill_column(&self, _origin: Vec3, _x: i32, _z: i32, column: &mut [Block]) {
            for (y, cell) in column.iter_mut().enumerate() {
                *cell = if y < 2 { self.stone } else { Block::EMPTY };
            }
        }
    }

    #[derive(Default)]
    struct MeshCollector {
        meshes: Vec<(ChunkCoord, usize)>,
    }

    impl MeshSink for MeshCollector {
        fn upload_mesh(&mut self, coord: ChunkCoord, mesh: &MeshBuffers) {
            self.meshes.push((coord, mesh.vertex_count()));
        }
    }

    #[derive(Default)]
    struct AttenuationCollector {
        attenuations: Vec<ChunkCoord>,
    }

    impl AttenuationSink for AttenuationCollector {
        fn upload_attenuation(&mut self, coord: ChunkCoord, _light: &LightChunk) {
            self.attenuations.push(coord);
        }
    }

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
        reg.register(
            BlockDef {
                name: "torch".to_string(),
                mesh_group: 0,
                material_index: 0,
                flags: BlockFlags::TRANSPARENT,
                emission: 10,
                liquid_decay: 1,
            },
            BlockUv::default(),
        )
        .unwrap();
        reg.register(
            BlockDef {
                name: "water".to_string(),
                mesh_group: 1,
                material_index: 0,
                flags: BlockFlags::LIQUID | BlockFlags::TRANSPARENT,
                emission: 0,
                liquid_decay: 1,
            },
            BlockUv::default(),
        )
        .unwrap();
        reg
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.world.chunk_size_x = 8;
        config.world.chunk_size_y = 8;
        config.world.chunk_size_z = 8;
        config.world.render_distance = 1;
        config
    }

    fn simulation(reg: &BlockRegistry) -> WorldSimulation {
        let stone = reg.make_block(0);
        WorldSimulation::new(&config(), reg, Arc::new(FlatTerrain { stone }))
    }

    /// Runs update until every engine goes idle.
    fn settle(
        sim: &mut WorldSimulation,
        meshes: &mut MeshCollector,
        attenuations: &mut AttenuationCollector,
    ) {
        let start = std::time::Instant::now();
        loop {
            sim.update(1.0, Vec3::ZERO, meshes, attenuations);
            if !sim.is_busy() {
                return;
            }
            assert!(start.elapsed().as_secs() < 30, "simulation never settled");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_streamed_chunks_generate_mesh_and_light() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);

        let coord = ChunkCoord::new(0, 0);
        let chunk = sim.world().chunk_at(coord).unwrap();
        assert!(chunk.is_valid());
        assert!(chunk.block_at(IVec3::new(0, 0, 0)).exists());

        assert!(meshes.meshes.iter().any(|(c, count)| *c == coord && *count > 0));
        assert!(attenuations.attenuations.contains(&coord));

        // Skylight reached the generated surface.
        let light = sim.lighting().light_chunk(coord).unwrap();
        let surface = position_to_index(IVec3::new(4, 2, 4), sim.world().extent());
        assert_eq!(sunlight(light.values()[surface]), 15);
    }

    #[test]
    fn test_set_block_requires_loaded_chunk() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let missing = ChunkCoord::new(99, 99);
        let result = sim.set_block(missing, IVec3::ZERO, reg.make_block(0));
        assert!(matches!(result, Err(WorldError::ChunkNotFound(_))));
    }

    #[test]
    fn test_set_block_rejects_out_of_range_local() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);

        let result = sim.set_block(ChunkCoord::new(0, 0), IVec3::new(0, 99, 0), reg.make_block(0));
        assert!(matches!(result, Err(WorldError::OutOfBounds(_))));
    }

    #[test]
    fn test_edit_remeshes_and_relights() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);
        meshes.meshes.clear();

        let coord = ChunkCoord::new(0, 0);
        let local = IVec3::new(4, 4, 4);
        sim.set_block(coord, local, reg.make_block(1)).unwrap();
        settle(&mut sim, &mut meshes, &mut attenuations);

        assert!(meshes.meshes.iter().any(|(c, _)| *c == coord), "remeshed");
        let light = sim.lighting().light_chunk(coord).unwrap();
        let extent = sim.world().extent();
        let beside = position_to_index(IVec3::new(5, 4, 4), extent);
        assert_eq!(
            sandvox_lighting::torchlight(light.values()[beside]),
            9,
            "torch emission spread"
        );
    }

    #[test]
    fn test_liquid_edit_spreads_over_ticks() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);

        let coord = ChunkCoord::new(0, 0);
        // Water source resting on the generated stone surface.
        sim.set_block(coord, IVec3::new(4, 2, 4), reg.make_block(2)).unwrap();
        settle(&mut sim, &mut meshes, &mut attenuations);

        let side = sim.world().chunk_at(coord).unwrap().block_at(IVec3::new(5, 2, 4));
        assert!(side.is_liquid());
        assert_eq!(side.liquid_level(), 14);
        assert!(!side.is_liquid_source());
    }

    #[test]
    fn test_set_block_at_world_position() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);

        sim.set_block_at_world(Vec3::new(3.5, 4.2, 2.7), reg.make_block(0)).unwrap();
        let chunk = sim.world().chunk_at(ChunkCoord::new(0, 0)).unwrap();
        assert!(chunk.block_at(IVec3::new(3, 4, 2)).exists());
    }

    #[test]
    fn test_no_chunks_despawn_while_settling() {
        let reg = registry();
        let mut sim = simulation(&reg);
        let (mut meshes, mut attenuations) = (MeshCollector::default(), AttenuationCollector::default());
        settle(&mut sim, &mut meshes, &mut attenuations);
        let loaded = sim.world().loaded_count();

        // Same reference position: streaming keeps the set stable.
        sim.update(0.01, Vec3::ZERO, &mut meshes, &mut attenuations);
        assert_eq!(sim.world().loaded_count(), loaded);
    }
}
