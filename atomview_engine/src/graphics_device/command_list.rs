/// CommandList trait - for recording GPU commands

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferView, BindingLayout, BindPoint, IndexType, Pipeline, PrimitiveTopology, Swapchain,
};

/// Command list for recording commands
///
/// One command list exists per frame slot. The frame synchronizer resets it
/// only after the GPU has retired the slot's previous submission.
pub trait CommandList: Send + Sync {
    /// Reset the command allocator backing this list
    ///
    /// Discards a partially recorded frame. Must not be called while a submission that used this list may still execute.
    fn reset(&mut self) -> Result<()>;

    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Begin rendering into a swapchain image and its depth-stencil attachment
    ///
    /// `clear_values[0]` clears color, `clear_values[1]` clears depth-stencil.
    fn begin_rendering(
        &mut self,
        swapchain: &dyn Swapchain,
        image_index: u32,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// End the current rendering scope and transition the image for presentation
    fn end_rendering(&mut self) -> Result<()>;

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Select the binding layout subsequent `bind_constants`/`bind_storage` calls target
    fn bind_binding_layout(&mut self, layout: &Arc<dyn BindingLayout>, bind_point: BindPoint) -> Result<()>;

    /// Bind a graphics or compute pipeline
    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()>;

    /// Bind a constant region to a `Constants` slot of the current layout
    fn bind_constants(&mut self, slot: u32, view: &BufferView) -> Result<()>;

    /// Bind a storage range to a `Storage` slot of the current layout
    fn bind_storage(&mut self, slot: u32, view: &BufferView) -> Result<()>;

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()>;

    fn set_stencil_reference(&mut self, reference: u32) -> Result<()>;

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()>;

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()>;

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()>;

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;
}

/// Viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-target viewport with depth range [0, 1]
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0.0, y: 0.0, width: width as f32, height: height as f32, min_depth: 0.0, max_depth: 1.0 }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}
