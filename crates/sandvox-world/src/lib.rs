//! Chunk storage and the world index: dense per-chunk block buffers with
//! advisory locking, radius-based chunk streaming, 3×3 neighborhood
//! snapshots, and the background-task handle used by every engine.

pub mod change;
pub mod chunk;
pub mod neighborhood;
pub mod task;
pub mod world;

pub use change::{BlockChanged, ChunkBlockPosition, SetBlockCommand};
pub use chunk::{Chunk, LockOwner};
pub use neighborhood::Neighborhood;
pub use task::TaskHandle;
pub use world::{StreamingReport, World, WorldError};
