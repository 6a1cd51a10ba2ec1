//! Block cells and the static block-type registry.
//!
//! A [`Block`] is the 8-byte value stored per grid cell; the
//! [`BlockRegistry`] maps block ids to their static definitions and per-face
//! texture rectangles, loaded once before the world starts.

pub mod block;
pub mod liquid;
pub mod registry;
pub mod uv;

pub use block::{Block, BlockFlags};
pub use liquid::{MAX_LIQUID_DECAY, MAX_LIQUID_LEVEL};
pub use registry::{BlockDef, BlockId, BlockRegistry, RegistryError};
pub use uv::{BlockUv, QuadUv};
