//! The main-loop facade wiring chunk streaming, terrain generation, mesh
//! extraction, lighting and the liquid simulation together.
//!
//! [`WorldSimulation`] is the single block-edit path: every mutation flows
//! changing → write → changed through it synchronously, so each engine can
//! force-complete in-flight work before the write and react to the result
//! after it, before the edit call returns.

pub mod simulation;

pub use simulation::WorldSimulation;
