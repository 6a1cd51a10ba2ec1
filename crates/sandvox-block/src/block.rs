//! The per-cell block value.

use bitflags::bitflags;

bitflags! {
    /// Static behavior flags of a block type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct BlockFlags: u8 {
        /// Does not occlude neighboring faces and lets light through.
        const TRANSPARENT = 1 << 1;
        /// Participates in the liquid simulation; metadata carries liquid state.
        const LIQUID = 1 << 2;
        /// Placing a block over this cell replaces it instead of failing.
        const CAN_PLACE_OVER = 1 << 3;
    }
}

/// One cell of a chunk's block buffer.
///
/// `id == -1` is the unique empty sentinel; any other id must resolve in the
/// [`BlockRegistry`](crate::BlockRegistry). `metadata` is the only mutable
/// field; for liquids it packs level, decay and the source flag (see
/// [`crate::liquid`]).
#[derive(Clone, Copy, Debug)]
pub struct Block {
    /// Registry id, or −1 for an empty cell.
    pub id: i16,
    /// Which mesh this block is emitted into (e.g. terrain vs. water).
    pub mesh_group: u8,
    /// Sub-mesh (material) index within its mesh group.
    pub material_index: u8,
    /// Torchlight emission, `0..=15`.
    pub emission: u8,
    /// Static behavior flags.
    pub flags: BlockFlags,
    /// Mutable per-cell state.
    pub metadata: u8,
}

impl Block {
    /// The empty cell sentinel.
    pub const EMPTY: Block = Block {
        id: -1,
        mesh_group: 0,
        material_index: 0,
        emission: 0,
        flags: BlockFlags::empty(),
        metadata: 0,
    };

    /// Creates a block with zeroed metadata.
    pub fn new(id: i16, mesh_group: u8, material_index: u8, emission: u8, flags: BlockFlags) -> Self {
        Self {
            id,
            mesh_group,
            material_index,
            emission,
            flags,
            metadata: 0,
        }
    }

    /// Returns `true` if this cell holds a block (`id >= 0`).
    pub fn exists(self) -> bool {
        self.id >= 0
    }

    /// Returns `true` if the block does not occlude faces behind it.
    pub fn is_transparent(self) -> bool {
        self.flags.contains(BlockFlags::TRANSPARENT)
    }

    /// Returns `true` if the block is a liquid.
    pub fn is_liquid(self) -> bool {
        self.flags.contains(BlockFlags::LIQUID)
    }

    /// Returns `true` if a new block may be placed into this cell.
    ///
    /// Empty cells can always be placed over.
    pub fn can_place_over(self) -> bool {
        !self.exists() || self.flags.contains(BlockFlags::CAN_PLACE_OVER)
    }

    /// Returns `true` if light can travel through this cell.
    pub fn passes_light(self) -> bool {
        !self.exists() || self.is_transparent()
    }

    /// Returns `true` if this cell is a torchlight source.
    pub fn emits_light(self) -> bool {
        self.exists() && self.emission > 0
    }
}

/// Two existing blocks compare equal when their ids match; two empty cells
/// are always equal regardless of the remaining fields.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        if self.exists() && other.exists() {
            return self.id == other.id;
        }
        !self.exists() && !other.exists()
    }
}

impl Eq for Block {}

impl std::hash::Hash for Block {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let key = if self.exists() { self.id } else { -1 };
        key.hash(state);
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::EMPTY
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
