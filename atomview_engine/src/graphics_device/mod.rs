/// Graphics device module - the GPU boundary traits and descriptors

pub mod graphics_device;
pub mod buffer;
pub mod shader;
pub mod pipeline;
pub mod binding_layout;
pub mod command_list;
pub mod swapchain;

pub use graphics_device::*;
pub use buffer::*;
pub use shader::*;
pub use pipeline::*;
pub use binding_layout::*;
pub use command_list::*;
pub use swapchain::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
