/// Buffer trait, buffer descriptor and buffer views

use std::sync::Arc;
use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer
    Vertex,
    /// Index buffer
    Index,
    /// Uniform/constant buffer (bound at a `Constants` slot)
    Uniform,
    /// Storage buffer (bound at a `Storage` slot)
    Storage,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Vertex attribute data format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,
    R32_UINT,
    R32G32_UINT,
    R32G32B32A32_UINT,
    R8G8B8A8_UNORM,
}

impl BufferFormat {
    /// Size in bytes of one element of this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_UINT | BufferFormat::R8G8B8A8_UNORM => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_UINT => 16,
        }
    }
}

/// Buffer resource trait
///
/// Implemented by backend buffers. All buffers created through
/// `GraphicsDevice::create_buffer` are host-visible and persistently mapped;
/// the buffer is destroyed when the last `Arc` is dropped.
pub trait Buffer: Send + Sync {
    /// Copy `data` into the buffer at `offset` bytes
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Size in bytes
    fn size(&self) -> u64;

    /// Usage the buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Raw pointer to persistently mapped memory, `None` for device-local buffers
    fn mapped_ptr(&self) -> Option<*mut u8>;
}

/// A byte range of a buffer as seen by one bind call
#[derive(Clone)]
pub struct BufferView {
    pub buffer: Arc<dyn Buffer>,
    pub offset: u64,
    pub size: u64,
}

impl BufferView {
    /// View covering the whole buffer
    pub fn whole(buffer: Arc<dyn Buffer>) -> Self {
        let size = buffer.size();
        Self { buffer, offset: 0, size }
    }

    /// Exclusive end offset
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

impl std::fmt::Debug for BufferView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferView")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
