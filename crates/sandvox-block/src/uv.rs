//! Per-face texture rectangles for a block type.

use glam::Vec2;
use sandvox_grid::Side;

/// A UV rectangle on the block texture atlas.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadUv {
    /// Bottom-left corner in normalized texture coordinates.
    pub min: Vec2,
    /// Top-right corner in normalized texture coordinates.
    pub max: Vec2,
}

impl QuadUv {
    /// Creates a UV rectangle from normalized corners.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates a UV rectangle from a pixel rect on an atlas of the given size.
    pub fn from_pixel_rect(rect_min: Vec2, rect_max: Vec2, atlas_size: Vec2) -> Self {
        Self {
            min: rect_min / atlas_size,
            max: rect_max / atlas_size,
        }
    }
}

/// The six face rectangles of one block type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockUv {
    pub north: QuadUv,
    pub south: QuadUv,
    pub west: QuadUv,
    pub east: QuadUv,
    pub top: QuadUv,
    pub bottom: QuadUv,
}

impl BlockUv {
    /// Creates a block UV set using the same rectangle for all six faces.
    pub fn uniform(quad: QuadUv) -> Self {
        Self {
            north: quad,
            south: quad,
            west: quad,
            east: quad,
            top: quad,
            bottom: quad,
        }
    }

    /// Returns the rectangle for the given face.
    pub fn face(&self, side: Side) -> QuadUv {
        match side {
            Side::North => self.north,
            Side::South => self.south,
            Side::East => self.east,
            Side::West => self.west,
            Side::Up => self.top,
            Side::Down => self.bottom,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
