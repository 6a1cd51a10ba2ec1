//! Index math for a dense chunk volume and cross-chunk offset resolution.
//!
//! Block buffers are row-major with X varying fastest, then Y, then Z:
//! `index = x + y * size_x + z * size_x * size_y`.

use glam::IVec3;

use crate::coord::ChunkCoord;

/// Converts a linear buffer index to a local position within the chunk.
///
/// Inverse of [`position_to_index`] for all in-range positions.
pub fn index_to_position(index: usize, extent: IVec3) -> IVec3 {
    let index = index as i32;
    let area = extent.x * extent.y;
    let z = index / area;
    let x = index % area % extent.x;
    let y = index % area / extent.x;
    IVec3::new(x, y, z)
}

/// Converts a local position to its linear buffer index.
pub fn position_to_index(position: IVec3, extent: IVec3) -> usize {
    (position.x + position.y * extent.x + position.z * extent.x * extent.y) as usize
}

/// Returns `true` if any axis of `position` lies outside `[0, extent)`.
pub fn out_of_bounds(position: IVec3, extent: IVec3) -> bool {
    position.x < 0
        || position.y < 0
        || position.z < 0
        || position.x >= extent.x
        || position.y >= extent.y
        || position.z >= extent.z
}

/// Clamps each axis of `position` into `[0, extent)`.
pub fn clamp_to_bounds(position: IVec3, extent: IVec3) -> IVec3 {
    position.clamp(IVec3::ZERO, extent - IVec3::ONE)
}

/// Total number of cells in a chunk of the given extent.
pub fn volume(extent: IVec3) -> usize {
    (extent.x * extent.y * extent.z) as usize
}

/// Adds a cell offset to a local position, wrapping into a neighbor chunk
/// where the result leaves the chunk in X or Z.
///
/// Returns the neighbor chunk coordinate (shifted by ±1 on each overflowed
/// axis) together with the rebased local position, or `None` when the offset
/// leaves the chunk vertically — there are no vertical chunk neighbors.
///
/// This is the single mechanism by which cross-chunk algorithms step over a
/// chunk boundary; diagonal X+Z overflow resolves to the diagonal neighbor.
pub fn apply_offset(
    chunk: ChunkCoord,
    local: IVec3,
    offset: IVec3,
    extent: IVec3,
) -> Option<(ChunkCoord, IVec3)> {
    let mut neighbor = chunk;
    let mut position = local + offset;

    if position.y < 0 || position.y >= extent.y {
        return None;
    }

    if position.x < 0 {
        neighbor.x -= 1;
        position.x += extent.x;
    }
    if position.x >= extent.x {
        neighbor.x += 1;
        position.x -= extent.x;
    }
    if position.z < 0 {
        neighbor.z -= 1;
        position.z += extent.z;
    }
    if position.z >= extent.z {
        neighbor.z += 1;
        position.z -= extent.z;
    }

    Some((neighbor, position))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::Side;

    const EXTENT: IVec3 = IVec3::new(16, 50, 16);

    #[test]
    fn test_index_position_roundtrip() {
        for z in 0..EXTENT.z {
            for y in 0..EXTENT.y {
                for x in 0..EXTENT.x {
                    let p = IVec3::new(x, y, z);
                    let index = position_to_index(p, EXTENT);
                    assert_eq!(index_to_position(index, EXTENT), p);
                }
            }
        }
    }

    #[test]
    fn test_index_is_x_fastest() {
        assert_eq!(position_to_index(IVec3::new(0, 0, 0), EXTENT), 0);
        assert_eq!(position_to_index(IVec3::new(1, 0, 0), EXTENT), 1);
        assert_eq!(
            position_to_index(IVec3::new(0, 1, 0), EXTENT),
            EXTENT.x as usize
        );
        assert_eq!(
            position_to_index(IVec3::new(0, 0, 1), EXTENT),
            (EXTENT.x * EXTENT.y) as usize
        );
    }

    #[test]
    fn test_out_of_bounds_edges() {
        assert!(!out_of_bounds(IVec3::new(0, 0, 0), EXTENT));
        assert!(!out_of_bounds(EXTENT - IVec3::ONE, EXTENT));
        assert!(out_of_bounds(IVec3::new(-1, 0, 0), EXTENT));
        assert!(out_of_bounds(IVec3::new(0, -1, 0), EXTENT));
        assert!(out_of_bounds(IVec3::new(0, 0, -1), EXTENT));
        assert!(out_of_bounds(IVec3::new(EXTENT.x, 0, 0), EXTENT));
        assert!(out_of_bounds(IVec3::new(0, EXTENT.y, 0), EXTENT));
        assert!(out_of_bounds(IVec3::new(0, 0, EXTENT.z), EXTENT));
    }

    #[test]
    fn test_clamp_to_bounds() {
        assert_eq!(
            clamp_to_bounds(IVec3::new(-3, 100, 7), EXTENT),
            IVec3::new(0, EXTENT.y - 1, 7)
        );
        let inside = IVec3::new(5, 5, 5);
        assert_eq!(clamp_to_bounds(inside, EXTENT), inside);
    }

    #[test]
    fn test_apply_offset_interior_stays_in_chunk() {
        let chunk = ChunkCoord::new(2, 3);
        let (coord, pos) =
            apply_offset(chunk, IVec3::new(5, 5, 5), IVec3::new(1, 0, 0), EXTENT).unwrap();
        assert_eq!(coord, chunk);
        assert_eq!(pos, IVec3::new(6, 5, 5));
    }

    #[test]
    fn test_apply_offset_wraps_single_axes() {
        let chunk = ChunkCoord::new(0, 0);

        let (coord, pos) =
            apply_offset(chunk, IVec3::new(EXTENT.x - 1, 0, 0), IVec3::new(1, 0, 0), EXTENT)
                .unwrap();
        assert_eq!(coord, ChunkCoord::new(1, 0));
        assert_eq!(pos, IVec3::new(0, 0, 0));

        let (coord, pos) =
            apply_offset(chunk, IVec3::new(0, 0, 0), IVec3::new(-1, 0, 0), EXTENT).unwrap();
        assert_eq!(coord, ChunkCoord::new(-1, 0));
        assert_eq!(pos, IVec3::new(EXTENT.x - 1, 0, 0));

        let (coord, pos) =
            apply_offset(chunk, IVec3::new(0, 0, EXTENT.z - 1), IVec3::new(0, 0, 1), EXTENT)
                .unwrap();
        assert_eq!(coord, ChunkCoord::new(0, 1));
        assert_eq!(pos, IVec3::new(0, 0, 0));

        let (coord, pos) =
            apply_offset(chunk, IVec3::new(0, 0, 0), IVec3::new(0, 0, -1), EXTENT).unwrap();
        assert_eq!(coord, ChunkCoord::new(0, -1));
        assert_eq!(pos, IVec3::new(0, 0, EXTENT.z - 1));
    }

    #[test]
    fn test_apply_offset_wraps_diagonals() {
        let chunk = ChunkCoord::new(0, 0);
        // Simultaneous X and Z overflow lands in the diagonal neighbor.
        let (coord, pos) = apply_offset(
            chunk,
            IVec3::new(EXTENT.x - 1, 10, EXTENT.z - 1),
            IVec3::new(1, 0, 1),
            EXTENT,
        )
        .unwrap();
        assert_eq!(coord, ChunkCoord::new(1, 1));
        assert_eq!(pos, IVec3::new(0, 10, 0));

        let (coord, pos) =
            apply_offset(chunk, IVec3::new(0, 10, 0), IVec3::new(-1, 0, -1), EXTENT).unwrap();
        assert_eq!(coord, ChunkCoord::new(-1, -1));
        assert_eq!(pos, IVec3::new(EXTENT.x - 1, 10, EXTENT.z - 1));
    }

    #[test]
    fn test_apply_offset_fails_vertically() {
        let chunk = ChunkCoord::new(0, 0);
        assert!(apply_offset(chunk, IVec3::new(0, 0, 0), IVec3::new(0, -1, 0), EXTENT).is_none());
        assert!(
            apply_offset(
                chunk,
                IVec3::new(0, EXTENT.y - 1, 0),
                IVec3::new(0, 1, 0),
                EXTENT
            )
            .is_none()
        );
    }

    #[test]
    fn test_apply_offset_unit_steps_stay_in_range() {
        let chunk = ChunkCoord::new(0, 0);
        for z in 0..EXTENT.z {
            for y in 0..EXTENT.y {
                for x in 0..EXTENT.x {
                    let local = IVec3::new(x, y, z);
                    for side in Side::ALL {
                        let Some((coord, pos)) = apply_offset(chunk, local, side.to_ivec(), EXTENT)
                        else {
                            continue;
                        };
                        assert!(!out_of_bounds(pos, EXTENT), "{local} + {side:?}");
                        let shifted = (coord.x - chunk.x).abs() + (coord.z - chunk.z).abs();
                        assert!(shifted <= 1);
                    }
                }
            }
        }
    }
}
