//! Engine-level GPU resources built on top of the graphics device

pub mod constant_buffer;
pub mod mesh;
pub mod primitives;

pub use constant_buffer::*;
pub use mesh::*;
pub use primitives::{box_edges, build_collection, uv_sphere, PrimitiveGeometry};
