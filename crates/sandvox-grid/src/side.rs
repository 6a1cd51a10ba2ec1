//! The six axis-aligned sides of a block.

use glam::{IVec3, Vec3};

/// One face direction of a block or box.
///
/// North is +Z, East is +X, Up is +Y.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// +Z
    North,
    /// −Z
    South,
    /// +X
    East,
    /// −X
    West,
    /// +Y
    Up,
    /// −Y
    Down,
}

impl Side {
    /// All six sides, in the order faces are emitted by the mesher.
    pub const ALL: [Side; 6] = [
        Side::North,
        Side::South,
        Side::East,
        Side::West,
        Side::Up,
        Side::Down,
    ];

    /// Returns the unit offset pointing out of this side.
    pub fn to_ivec(self) -> IVec3 {
        match self {
            Side::North => IVec3::new(0, 0, 1),
            Side::South => IVec3::new(0, 0, -1),
            Side::East => IVec3::new(1, 0, 0),
            Side::West => IVec3::new(-1, 0, 0),
            Side::Up => IVec3::new(0, 1, 0),
            Side::Down => IVec3::new(0, -1, 0),
        }
    }

    /// Returns the outward face normal.
    pub fn normal(self) -> Vec3 {
        self.to_ivec().as_vec3()
    }

    /// Returns `true` for the sides pointing toward negative axes.
    pub fn is_negative(self) -> bool {
        matches!(self, Side::South | Side::West | Side::Down)
    }

    /// Returns the opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::North => Side::South,
            Side::South => Side::North,
            Side::East => Side::West,
            Side::West => Side::East,
            Side::Up => Side::Down,
            Side::Down => Side::Up,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
