//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Chunk dimensions and streaming.
    pub world: WorldConfig,
    /// Tick-driven simulation settings.
    pub simulation: SimulationConfig,
    /// Lighting settings.
    pub lighting: LightingConfig,
}

/// Chunk dimensions and streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    /// Chunk width in cells (X axis).
    pub chunk_size_x: i32,
    /// Chunk height in cells (Y axis).
    pub chunk_size_y: i32,
    /// Chunk depth in cells (Z axis).
    pub chunk_size_z: i32,
    /// Streaming radius in chunks around the reference position.
    pub render_distance: i32,
    /// Maximum chunks spawned per streaming pass.
    pub max_spawned_chunks_per_update: usize,
}

/// Tick-driven simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed tick rate for the liquid simulation (Hz).
    pub ticks_per_second: u32,
    /// Maximum concurrent terrain generation tasks.
    pub max_concurrent_generations: usize,
}

/// Lighting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    /// Enable skylight seeding and propagation.
    pub sunlight: bool,
    /// Enable torchlight propagation.
    pub torchlight: bool,
    /// Ambient floor applied by the renderer, `0.0..=1.0`.
    pub min_ambient_lighting: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_size_x: 16,
            chunk_size_y: 50,
            chunk_size_z: 16,
            render_distance: 8,
            max_spawned_chunks_per_update: 16,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 30,
            max_concurrent_generations: 4,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            sunlight: true,
            torchlight: true,
            min_ambient_lighting: 0.0,
        }
    }
}

const CONFIG_FILE: &str = "sandvox.ron";

impl EngineConfig {
    /// Loads the config from `config_dir`, or writes a default one there.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            let config: EngineConfig = ron::from_str(&contents).map_err(ConfigError::Parse)?;
            tracing::info!(path = %config_path.display(), "loaded config");
            Ok(config)
        } else {
            let config = EngineConfig::default();
            config.save(config_dir)?;
            tracing::info!(path = %config_path.display(), "created default config");
            Ok(config)
        }
    }

    /// Saves the config to `config_dir` as `sandvox.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::Write)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(config_dir.join(CONFIG_FILE), serialized).map_err(ConfigError::Write)?;
        Ok(())
    }

    /// Re-reads the file; returns `Some(new_config)` only when it changed.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
        let new_config: EngineConfig = ron::from_str(&contents).map_err(ConfigError::Parse)?;

        if &new_config != self {
            tracing::info!("config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
