//! Mesh collections.
//!
//! A `MeshCollection` owns one vertex buffer and an optional index buffer
//! and describes named submeshes inside them. Collections are immutable
//! after creation and shared through `Arc` by every layer that draws them.
//!
//! ```text
//! MeshCollection "primitives"
//! ├── vertex_buffer (shared)
//! ├── index_buffer (shared, optional)
//! └── submeshes
//!     ├── 0: "sphere"  → index range [0, 960)
//!     └── 1: "box"     → index range [960, 984), base vertex 482
//! ```

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use crate::error::Result;
use crate::graphics_device::{self, Buffer, GraphicsDevice, IndexType, VertexLayout};
use crate::{engine_bail, engine_err};

// ============================================================================
// SUBMESH
// ============================================================================

/// Parameters of one submesh inside a `MeshCollectionDesc`
#[derive(Debug, Clone)]
pub struct SubmeshDesc {
    pub name: String,
    /// Added to every index before fetching a vertex
    pub base_vertex: i32,
    pub vertex_count: u32,
    /// First index in the index buffer (ignored for non-indexed collections)
    pub first_index: u32,
    /// Number of indices (ignored for non-indexed collections)
    pub index_count: u32,
}

/// A drawable range of the shared buffers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submesh {
    name: String,
    base_vertex: i32,
    vertex_count: u32,
    first_index: u32,
    index_count: u32,
}

impl Submesh {
    pub fn name(&self) -> &str { &self.name }
    pub fn base_vertex(&self) -> i32 { self.base_vertex }
    pub fn vertex_count(&self) -> u32 { self.vertex_count }
    pub fn first_index(&self) -> u32 { self.first_index }
    pub fn index_count(&self) -> u32 { self.index_count }
}

// ============================================================================
// MESH COLLECTION
// ============================================================================

/// Creation parameters of a `MeshCollection`
pub struct MeshCollectionDesc {
    pub name: String,
    pub device: Arc<Mutex<dyn GraphicsDevice>>,
    /// Interleaved vertex data matching `vertex_layout`
    pub vertex_data: Vec<u8>,
    pub vertex_layout: VertexLayout,
    /// Index data, `None` for non-indexed collections
    pub index_data: Option<Vec<u8>>,
    pub index_type: IndexType,
    pub submeshes: Vec<SubmeshDesc>,
}

/// Shared vertex/index buffers plus named submeshes
pub struct MeshCollection {
    name: String,
    vertex_buffer: Arc<dyn Buffer>,
    index_buffer: Option<Arc<dyn Buffer>>,
    vertex_layout: VertexLayout,
    index_type: IndexType,
    vertex_count: u32,
    index_count: u32,
    submeshes: Vec<Submesh>,
    submesh_names: FxHashMap<String, usize>,
}

impl MeshCollection {
    /// Upload the buffers and validate every submesh range
    pub fn new(desc: MeshCollectionDesc) -> Result<Self> {
        let stride = desc.vertex_layout.vertex_stride() as usize;
        if stride == 0 {
            engine_bail!("atomview::MeshCollection", "'{}': vertex layout has no binding 0 or stride is 0", desc.name);
        }
        if desc.vertex_data.is_empty() || desc.vertex_data.len() % stride != 0 {
            engine_bail!(
                "atomview::MeshCollection",
                "'{}': vertex data size {} is not a non-zero multiple of stride {}",
                desc.name, desc.vertex_data.len(), stride
            );
        }
        let vertex_count = (desc.vertex_data.len() / stride) as u32;

        let index_count = match &desc.index_data {
            Some(data) => {
                let index_size = desc.index_type.size_bytes() as usize;
                if data.is_empty() || data.len() % index_size != 0 {
                    engine_bail!(
                        "atomview::MeshCollection",
                        "'{}': index data size {} is not a non-zero multiple of {}",
                        desc.name, data.len(), index_size
                    );
                }
                (data.len() / index_size) as u32
            }
            None => 0,
        };

        let mut submeshes = Vec::with_capacity(desc.submeshes.len());
        let mut submesh_names = FxHashMap::default();
        for sub in desc.submeshes {
            if submesh_names.contains_key(&sub.name) {
                engine_bail!("atomview::MeshCollection", "'{}': duplicate submesh '{}'", desc.name, sub.name);
            }
            Self::validate_submesh(&desc.name, &sub, vertex_count, desc.index_data.is_some(), index_count)?;
            submesh_names.insert(sub.name.clone(), submeshes.len());
            submeshes.push(Submesh {
                name: sub.name,
                base_vertex: sub.base_vertex,
                vertex_count: sub.vertex_count,
                first_index: sub.first_index,
                index_count: sub.index_count,
            });
        }

        let (vertex_buffer, index_buffer) = {
            let mut device = desc
                .device
                .lock()
                .map_err(|_| engine_err!("atomview::MeshCollection", "GraphicsDevice lock poisoned"))?;

            let vertex_buffer = device.create_buffer(graphics_device::BufferDesc {
                name: format!("{}.vertices", desc.name),
                size: desc.vertex_data.len() as u64,
                usage: graphics_device::BufferUsage::Vertex,
            })?;
            vertex_buffer.update(0, &desc.vertex_data)?;

            let index_buffer = match &desc.index_data {
                Some(data) => {
                    let buffer = device.create_buffer(graphics_device::BufferDesc {
                        name: format!("{}.indices", desc.name),
                        size: data.len() as u64,
                        usage: graphics_device::BufferUsage::Index,
                    })?;
                    buffer.update(0, data)?;
                    Some(buffer)
                }
                None => None,
            };
            (vertex_buffer, index_buffer)
        };

        crate::engine_debug!(
            "atomview::MeshCollection",
            "'{}': {} vertices, {} indices, {} submeshes",
            desc.name, vertex_count, index_count, submeshes.len()
        );

        Ok(Self {
            name: desc.name,
            vertex_buffer,
            index_buffer,
            vertex_layout: desc.vertex_layout,
            index_type: desc.index_type,
            vertex_count,
            index_count,
            submeshes,
            submesh_names,
        })
    }

    fn validate_submesh(
        collection: &str,
        sub: &SubmeshDesc,
        vertex_count: u32,
        indexed: bool,
        index_count: u32,
    ) -> Result<()> {
        if indexed {
            if sub.index_count == 0 || sub.first_index as u64 + sub.index_count as u64 > index_count as u64 {
                engine_bail!(
                    "atomview::MeshCollection",
                    "'{}': submesh '{}' index range {}+{} outside {} indices",
                    collection, sub.name, sub.first_index, sub.index_count, index_count
                );
            }
            if sub.base_vertex < 0 || sub.base_vertex as u32 >= vertex_count {
                engine_bail!(
                    "atomview::MeshCollection",
                    "'{}': submesh '{}' base vertex {} outside {} vertices",
                    collection, sub.name, sub.base_vertex, vertex_count
                );
            }
        } else if sub.base_vertex < 0
            || sub.vertex_count == 0
            || sub.base_vertex as u64 + sub.vertex_count as u64 > vertex_count as u64
        {
            engine_bail!(
                "atomview::MeshCollection",
                "'{}': submesh '{}' vertex range {}+{} outside {} vertices",
                collection, sub.name, sub.base_vertex, sub.vertex_count, vertex_count
            );
        }
        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str { &self.name }

    pub fn vertex_buffer(&self) -> &Arc<dyn Buffer> { &self.vertex_buffer }

    pub fn index_buffer(&self) -> Option<&Arc<dyn Buffer>> { self.index_buffer.as_ref() }

    pub fn is_indexed(&self) -> bool { self.index_buffer.is_some() }

    pub fn vertex_layout(&self) -> &VertexLayout { &self.vertex_layout }

    pub fn index_type(&self) -> IndexType { self.index_type }

    pub fn vertex_count(&self) -> u32 { self.vertex_count }

    pub fn index_count(&self) -> u32 { self.index_count }

    pub fn submesh_count(&self) -> usize { self.submeshes.len() }

    /// Submesh by index
    pub fn submesh(&self, index: usize) -> Option<&Submesh> {
        self.submeshes.get(index)
    }

    /// Submesh index by name
    pub fn submesh_index(&self, name: &str) -> Option<usize> {
        self.submesh_names.get(name).copied()
    }

    /// Bind the shared buffers on a command list
    pub fn bind(&self, cmd: &mut dyn graphics_device::CommandList) -> Result<()> {
        cmd.bind_vertex_buffer(&self.vertex_buffer, 0)?;
        if let Some(index_buffer) = &self.index_buffer {
            cmd.bind_index_buffer(index_buffer, 0, self.index_type)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
