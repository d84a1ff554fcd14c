/// GraphicsDevice trait - the GPU boundary the render core consumes

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, Shader, ShaderDesc, Pipeline, PipelineDesc, ComputePipelineDesc,
    BindingLayout, BindingLayoutDesc, CommandList, Swapchain,
};

/// Monotonic 64-bit completion counter value
///
/// The device's completed value only ever grows. Value 0 means "nothing
/// submitted yet" and is always complete.
pub type FenceValue = u64;

/// GPU device
///
/// Resource creation plus a single submission queue with a monotonic
/// completion fence. All work is submitted from one thread; the device is
/// shared as `Arc<Mutex<dyn GraphicsDevice>>` so the renderer, the frame
/// synchronizer and resource factories can reach it.
pub trait GraphicsDevice: Send + Sync {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>>;

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>>;

    fn create_binding_layout(&mut self, desc: BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>>;

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>>;

    fn create_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<Arc<dyn Pipeline>>;

    /// Create a command list with its own command allocator
    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// Submit recorded commands and signal `signal_value` on the fence when they retire
    fn submit(&self, commands: &dyn CommandList, signal_value: FenceValue) -> Result<()>;

    /// Like `submit`, additionally waiting for the swapchain image to be
    /// acquired and signaling the image's present semaphore
    fn submit_with_swapchain(
        &self,
        commands: &dyn CommandList,
        swapchain: &dyn Swapchain,
        image_index: u32,
        signal_value: FenceValue,
    ) -> Result<()>;

    /// Highest fence value the GPU has reached
    fn completed_fence_value(&self) -> Result<FenceValue>;

    /// Block the calling thread until the fence reaches `value`
    fn wait_for_fence(&self, value: FenceValue) -> Result<()>;

    /// Block until all submitted work has retired
    fn wait_idle(&self) -> Result<()>;
}
