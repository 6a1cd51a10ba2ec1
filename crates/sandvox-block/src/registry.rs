//! Block type registry: maps compact ids to static block definitions and UVs.
//!
//! The registry is built once at startup, before any chunk is generated.
//! Ids are assigned sequentially from 0 in registration order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::{Block, BlockFlags};
use crate::liquid::{MAX_LIQUID_DECAY, MAX_LIQUID_LEVEL};
use crate::uv::BlockUv;

/// A registered block id. The empty sentinel (−1) is never a valid id.
pub type BlockId = i16;

/// Static definition of one block type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    /// Human-readable name, unique within the registry.
    pub name: String,
    /// Which mesh this block is emitted into.
    pub mesh_group: u8,
    /// Sub-mesh (material) index within the mesh group.
    pub material_index: u8,
    /// Behavior flags.
    pub flags: BlockFlags,
    /// Torchlight emission, `0..=15`.
    pub emission: u8,
    /// Per-step spread decay for liquid types, `1..=4`.
    pub liquid_decay: u8,
}

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// All positive `i16` ids have been consumed.
    #[error("block registry is full")]
    RegistryFull,
    /// A definition carried an out-of-range field.
    #[error("invalid definition for {name}: {reason}")]
    InvalidDef { name: String, reason: String },
}

/// Read-only lookup table from [`BlockId`] to definition and face UVs.
pub struct BlockRegistry {
    defs: Vec<BlockDef>,
    uvs: Vec<BlockUv>,
}

impl BlockRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            defs: Vec::new(),
            uvs: Vec::new(),
        }
    }

    /// Registers a block type with its face UVs and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Fails on duplicate names, on a full id space, or when `emission` or
    /// `liquid_decay` are out of range.
    pub fn register(&mut self, def: BlockDef, uv: BlockUv) -> Result<BlockId, RegistryError> {
        if self.defs.iter().any(|d| d.name == def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.defs.len() > i16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }
        if def.emission > MAX_LIQUID_LEVEL {
            return Err(RegistryError::InvalidDef {
                name: def.name,
                reason: format!("emission {} exceeds 15", def.emission),
            });
        }
        if def.liquid_decay < 1 || def.liquid_decay > MAX_LIQUID_DECAY {
            return Err(RegistryError::InvalidDef {
                name: def.name,
                reason: format!("liquid decay {} outside 1..=4", def.liquid_decay),
            });
        }

        let id = self.defs.len() as BlockId;
        self.defs.push(def);
        self.uvs.push(uv);
        Ok(id)
    }

    /// Returns the definition for a given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this registry — ids only come from
    /// [`register`](Self::register), so an unknown id is a programming error.
    pub fn get(&self, id: BlockId) -> &BlockDef {
        &self.defs[id as usize]
    }

    /// Returns the definition for a given id, or `None` if unknown.
    pub fn try_get(&self, id: BlockId) -> Option<&BlockDef> {
        if id < 0 {
            return None;
        }
        self.defs.get(id as usize)
    }

    /// Returns the id registered under `name`, or `None`.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.defs
            .iter()
            .position(|d| d.name == name)
            .map(|i| i as BlockId)
    }

    /// The full face-UV table, indexed by block id.
    pub fn uv_table(&self) -> &[BlockUv] {
        &self.uvs
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// The number of distinct material indices across all mesh groups.
    ///
    /// Meshes are partitioned into this many sub-meshes.
    pub fn material_count(&self) -> usize {
        self.defs
            .iter()
            .map(|d| d.material_index as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// The number of distinct mesh groups; one extractor runs per group.
    pub fn mesh_group_count(&self) -> usize {
        self.defs
            .iter()
            .map(|d| d.mesh_group as usize + 1)
            .max()
            .unwrap_or(0)
    }

    /// Builds a placeable [`Block`] value for the given id.
    ///
    /// Liquid types start as full-level immutable sources with their
    /// configured decay, matching what a player or generator places.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id, like [`get`](Self::get).
    pub fn make_block(&self, id: BlockId) -> Block {
        let def = self.get(id);
        let mut block = Block::new(id, def.mesh_group, def.material_index, def.emission, def.flags);
        if def.flags.contains(BlockFlags::LIQUID) {
            block.set_liquid_level(MAX_LIQUID_LEVEL);
            block.set_liquid_decay(def.liquid_decay);
            block.set_liquid_source(true);
        }
        block
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
