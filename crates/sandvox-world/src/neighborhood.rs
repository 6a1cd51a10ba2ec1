//! 3×3 chunk neighborhood snapshots.
//!
//! A [`Neighborhood`] bundles owned copies of the center chunk's buffer and
//! its 8 compass neighbors' buffers, so background jobs can read (and, for
//! lightmaps, write) across chunk boundaries without holding references into
//! the world. A zero-length buffer means "neighbor absent"; every consumer
//! must short-circuit on it instead of indexing.

use sandvox_grid::ChunkCoord;

/// Owned snapshot of up to 9 chunk buffers of one element type.
#[derive(Clone, Debug, Default)]
pub struct Neighborhood<T> {
    pub center: Vec<T>,
    pub north: Vec<T>,
    pub south: Vec<T>,
    pub west: Vec<T>,
    pub east: Vec<T>,
    pub north_west: Vec<T>,
    pub north_east: Vec<T>,
    pub south_west: Vec<T>,
    pub south_east: Vec<T>,
}

impl<T> Neighborhood<T> {
    /// Creates a neighborhood with every slot absent.
    pub fn absent() -> Self {
        Self {
            center: Vec::new(),
            north: Vec::new(),
            south: Vec::new(),
            west: Vec::new(),
            east: Vec::new(),
            north_west: Vec::new(),
            north_east: Vec::new(),
            south_west: Vec::new(),
            south_east: Vec::new(),
        }
    }

    /// Creates a neighborhood holding only the center buffer.
    pub fn from_center(center: Vec<T>) -> Self {
        let mut n = Self::absent();
        n.center = center;
        n
    }

    fn slot(&self, dx: i32, dz: i32) -> Option<&Vec<T>> {
        match (dx, dz) {
            (-1, -1) => Some(&self.south_west),
            (-1, 0) => Some(&self.west),
            (-1, 1) => Some(&self.north_west),
            (0, -1) => Some(&self.south),
            (0, 0) => Some(&self.center),
            (0, 1) => Some(&self.north),
            (1, -1) => Some(&self.south_east),
            (1, 0) => Some(&self.east),
            (1, 1) => Some(&self.north_east),
            _ => None,
        }
    }

    fn slot_mut(&mut self, dx: i32, dz: i32) -> Option<&mut Vec<T>> {
        match (dx, dz) {
            (-1, -1) => Some(&mut self.south_west),
            (-1, 0) => Some(&mut self.west),
            (-1, 1) => Some(&mut self.north_west),
            (0, -1) => Some(&mut self.south),
            (0, 0) => Some(&mut self.center),
            (0, 1) => Some(&mut self.north),
            (1, -1) => Some(&mut self.south_east),
            (1, 0) => Some(&mut self.east),
            (1, 1) => Some(&mut self.north_east),
            _ => None,
        }
    }

    /// Stores a buffer in the slot for `target` relative to `center`.
    pub fn set_buffer(&mut self, center: ChunkCoord, target: ChunkCoord, buffer: Vec<T>) {
        if let Some(slot) = self.slot_mut(target.x - center.x, target.z - center.z) {
            *slot = buffer;
        }
    }

    /// Returns the buffer for `target` relative to `center`.
    ///
    /// `None` when `target` is outside the 3×3 neighborhood or its slot is
    /// absent (empty).
    pub fn try_get_buffer(&self, center: ChunkCoord, target: ChunkCoord) -> Option<&[T]> {
        let buffer = self.slot(target.x - center.x, target.z - center.z)?;
        if buffer.is_empty() {
            return None;
        }
        Some(buffer)
    }

    /// Mutable variant of [`try_get_buffer`](Self::try_get_buffer).
    pub fn try_get_buffer_mut(
        &mut self,
        center: ChunkCoord,
        target: ChunkCoord,
    ) -> Option<&mut [T]> {
        let buffer = self.slot_mut(target.x - center.x, target.z - center.z)?;
        if buffer.is_empty() {
            return None;
        }
        Some(buffer)
    }

    /// Returns the center buffer unless absent.
    pub fn try_center(&self) -> Option<&[T]> {
        if self.center.is_empty() {
            return None;
        }
        Some(&self.center)
    }

    /// Mutable variant of [`try_center`](Self::try_center).
    pub fn try_center_mut(&mut self) -> Option<&mut [T]> {
        if self.center.is_empty() {
            return None;
        }
        Some(&mut self.center)
    }

    /// Coordinates of every present (non-empty) slot, center included.
    pub fn present_coords(&self, center: ChunkCoord) -> Vec<ChunkCoord> {
        let mut coords = Vec::new();
        for dx in -1..=1 {
            for dz in -1..=1 {
                let slot = self.slot(dx, dz).expect("offsets are in range");
                if !slot.is_empty() {
                    coords.push(center.offset(dx, dz));
                }
            }
        }
        coords
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
