//! Preallocated output buffers for mesh extraction.
//!
//! All buffers are sized for the worst case (every cell emitting all six
//! faces) once, so the extraction inner loops never allocate. Triangle
//! indices live in one flat buffer partitioned into fixed-capacity regions,
//! one region per sub-mesh (material).

use glam::{Vec2, Vec3};

const VERTICES_PER_SIDE: usize = 4;
const INDICES_PER_SIDE: usize = 6;
const SIDES_PER_BLOCK: usize = 6;

/// Flat vertex and index storage for one chunk mesh.
pub struct MeshBuffers {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    triangles: Vec<u32>,
    triangle_index_counts: Vec<usize>,
    vertex_count: usize,
    submesh_capacity: usize,
}

impl MeshBuffers {
    /// Allocates buffers for a chunk of `volume` cells split into
    /// `submesh_count` materials.
    pub fn new(volume: usize, submesh_count: usize) -> Self {
        let submesh_count = submesh_count.max(1);
        let vertex_capacity = volume * SIDES_PER_BLOCK * VERTICES_PER_SIDE;
        let submesh_capacity = volume * SIDES_PER_BLOCK * INDICES_PER_SIDE;
        Self {
            positions: vec![Vec3::ZERO; vertex_capacity],
            uvs: vec![Vec2::ZERO; vertex_capacity],
            normals: vec![Vec3::ZERO; vertex_capacity],
            triangles: vec![0; submesh_count * submesh_capacity],
            triangle_index_counts: vec![0; submesh_count],
            vertex_count: 0,
            submesh_capacity,
        }
    }

    /// Resets the fill counters without touching the allocations.
    pub fn clear(&mut self) {
        self.vertex_count = 0;
        self.triangle_index_counts.fill(0);
    }

    /// Number of sub-meshes this buffer is partitioned into.
    pub fn submesh_count(&self) -> usize {
        self.triangle_index_counts.len()
    }

    /// Total number of emitted vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Emitted vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions[..self.vertex_count]
    }

    /// Emitted vertex UVs.
    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs[..self.vertex_count]
    }

    /// Emitted vertex normals.
    pub fn normals(&self) -> &[Vec3] {
        &self.normals[..self.vertex_count]
    }

    /// Triangle indices emitted for one sub-mesh.
    pub fn triangles_for(&self, submesh: usize) -> &[u32] {
        let start = submesh * self.submesh_capacity;
        &self.triangles[start..start + self.triangle_index_counts[submesh]]
    }

    /// Number of triangles emitted for one sub-mesh.
    pub fn triangle_count(&self, submesh: usize) -> usize {
        self.triangle_index_counts[submesh] / 3
    }

    /// Total number of triangles across all sub-meshes.
    pub fn total_triangle_count(&self) -> usize {
        self.triangle_index_counts.iter().sum::<usize>() / 3
    }

    /// Appends one quad: four vertices sharing `normal` and `uv`, split into
    /// the fixed two-triangle fan (0,1,2) and (0,2,3), bucketed by `submesh`.
    pub fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3, uv: Vec2, submesh: usize) {
        let base = self.vertex_count;
        for (slot, corner) in corners.iter().enumerate() {
            self.positions[base + slot] = *corner;
            self.uvs[base + slot] = uv;
            self.normals[base + slot] = normal;
        }
        self.vertex_count += VERTICES_PER_SIDE;

        self.push_triangle(base, 0, 1, 2, submesh);
        self.push_triangle(base, 0, 2, 3, submesh);
    }

    fn push_triangle(&mut self, base: usize, a: u32, b: u32, c: u32, submesh: usize) {
        let offset = submesh * self.submesh_capacity + self.triangle_index_counts[submesh];
        self.triangles[offset] = base as u32 + a;
        self.triangles[offset + 1] = base as u32 + b;
        self.triangles[offset + 2] = base as u32 + c;
        self.triangle_index_counts[submesh] += 3;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
