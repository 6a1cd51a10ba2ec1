//! Greedy mesh extraction: merges runs of identical blocks into boxes and
//! emits only the visible faces into flat, render-ready buffers.

pub mod buffers;
pub mod extractor;
pub mod greedy;

pub use buffers::MeshBuffers;
pub use extractor::{MeshExtractor, MeshSink};
pub use greedy::extract_mesh;
