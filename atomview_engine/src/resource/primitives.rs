//! Procedural geometry for the particle view: a UV sphere drawn once per
//! particle and the wireframe of the simulation box.
//!
//! Vertices use `VertexLayout::position_normal()`; indices are `u32`.

use std::sync::{Arc, Mutex};
use glam::Vec3;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, IndexType, VertexLayout};
use crate::resource::mesh::{MeshCollection, MeshCollectionDesc, SubmeshDesc};

/// CPU-side geometry before upload
#[derive(Debug, Clone, Default)]
pub struct PrimitiveGeometry {
    /// (position, normal) per vertex
    pub vertices: Vec<[Vec3; 2]>,
    pub indices: Vec<u32>,
}

impl PrimitiveGeometry {
    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    fn vertex_bytes(&self) -> Vec<u8> {
        let floats: Vec<f32> = self
            .vertices
            .iter()
            .flat_map(|[p, n]| [p.x, p.y, p.z, n.x, n.y, n.z])
            .collect();
        bytemuck::cast_slice(&floats).to_vec()
    }
}

/// Unit sphere triangulated by latitude (`stacks`) and longitude (`slices`)
///
/// `stacks` is clamped to at least 2 and `slices` to at least 3.
pub fn uv_sphere(stacks: u32, slices: u32) -> PrimitiveGeometry {
    let stacks = stacks.max(2);
    let slices = slices.max(3);
    let mut geometry = PrimitiveGeometry::default();

    for stack in 0..=stacks {
        let phi = std::f32::consts::PI * stack as f32 / stacks as f32;
        for slice in 0..=slices {
            let theta = std::f32::consts::TAU * slice as f32 / slices as f32;
            let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            geometry.vertices.push([normal, normal]);
        }
    }

    let ring = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * ring + slice;
            let b = a + ring;
            if stack != 0 {
                geometry.indices.extend_from_slice(&[a, b, a + 1]);
            }
            if stack != stacks - 1 {
                geometry.indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }
    geometry
}

/// The 12 edges of an axis-aligned box centered on the origin, as a line list
pub fn box_edges(half_extent: Vec3) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::default();
    for i in 0..8u32 {
        let corner = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        geometry.vertices.push([corner * half_extent, corner.normalize()]);
    }
    // Corners differing in exactly one bit share an edge
    for a in 0..8u32 {
        for bit in [1u32, 2, 4] {
            let b = a | bit;
            if b != a {
                geometry.indices.extend_from_slice(&[a, b]);
            }
        }
    }
    geometry
}

/// Upload several primitives into one collection, one submesh each
pub fn build_collection(
    name: &str,
    device: Arc<Mutex<dyn GraphicsDevice>>,
    parts: &[(&str, &PrimitiveGeometry)],
) -> Result<MeshCollection> {
    let mut vertex_data = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut submeshes = Vec::with_capacity(parts.len());
    let mut base_vertex = 0u32;

    for (part_name, geometry) in parts {
        submeshes.push(SubmeshDesc {
            name: part_name.to_string(),
            base_vertex: base_vertex as i32,
            vertex_count: geometry.vertex_count(),
            first_index: indices.len() as u32,
            index_count: geometry.index_count(),
        });
        vertex_data.extend_from_slice(&geometry.vertex_bytes());
        indices.extend_from_slice(&geometry.indices);
        base_vertex += geometry.vertex_count();
    }

    MeshCollection::new(MeshCollectionDesc {
        name: name.to_string(),
        device,
        vertex_data,
        vertex_layout: VertexLayout::position_normal(),
        index_data: Some(bytemuck::cast_slice(&indices).to_vec()),
        index_type: IndexType::U32,
        submeshes,
    })
}

#[cfg(test)]
#[path = "primitives_tests.rs"]
mod tests;
