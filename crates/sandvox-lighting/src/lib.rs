//! Dual-channel voxel lighting: one packed byte per cell (high nibble
//! sunlight, low nibble torchlight), incremental BFS flood-fill propagation
//! and removal across the 3×3 chunk neighborhood, and a padded per-chunk
//! attenuation volume derived for rendering.

pub mod chunk_light;
pub mod engine;
pub mod flood;
pub mod light;

pub use chunk_light::{LIGHTMAP_PADDING, LightChunk};
pub use engine::{AttenuationSink, LightingEngine};
pub use flood::{FloodFillNode, LightingContext, RemovalNode};
pub use light::{
    LightChannel, MAX_LIGHT, attenuation, set_sunlight, set_torchlight, sunlight, torchlight,
};
