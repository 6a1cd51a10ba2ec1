//! Engine configuration with RON persistence.

pub mod config;
pub mod error;

pub use config::{EngineConfig, LightingConfig, SimulationConfig, WorldConfig};
pub use error::ConfigError;
