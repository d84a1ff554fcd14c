/// Buffer - Vulkan implementation of the Buffer trait
///
/// Every buffer is a persistently mapped `CpuToGpu` allocation, so updates
/// are plain memcpys into the mapping.

use atomview_engine::atomview::{Result, Error};
use atomview_engine::atomview::device::{Buffer as GraphicsBuffer, BufferUsage};
use atomview_engine::{engine_bail, engine_error};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
pub struct Buffer {
    /// Shared GPU context (device, allocator)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    pub(crate) allocation: Option<Allocation>,
    /// Buffer size
    pub(crate) size: u64,
    usage: BufferUsage,
}

impl Buffer {
    pub fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        usage: BufferUsage,
    ) -> Self {
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        }
    }
}

impl GraphicsBuffer for Buffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.size {
            engine_bail!(
                "atomview::vulkan",
                "Buffer write of {} bytes at offset {} overflows buffer of {} bytes",
                data.len(), offset, self.size
            );
        }

        let mapped_ptr = self.mapped_ptr().ok_or_else(|| {
            engine_error!("atomview::vulkan", "Buffer update failed: buffer is not CPU-accessible");
            Error::BackendError("Buffer is not CPU-accessible".to_string())
        })?;

        // SAFETY: the range was checked against the allocation size above and
        // the mapping stays valid for the lifetime of the allocation
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.as_ptr() as *mut u8)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
