/*!
# AtomView - Vulkan Backend

Vulkan implementation of the `atomview_engine` graphics device.

Built on Ash for the Vulkan bindings and gpu-allocator for memory. The
device targets Vulkan 1.3 (dynamic rendering, synchronization2, timeline
semaphores) and binds constant regions through VK_KHR_push_descriptor.

```no_run
use std::sync::{Arc, Mutex};
use atomview_engine::atomview::{Renderer, config::RendererConfig};
use atomview_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> atomview_engine::atomview::Result<()> {
let config = RendererConfig::default();
let device = VulkanGraphicsDevice::new(window, &config)?;
let mut swapchain = device.create_swapchain(window)?;
let mut renderer = Renderer::new(Arc::new(Mutex::new(device)), config)?;
# let _ = (&mut renderer, &mut swapchain);
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_command_list;
mod vulkan_swapchain;
mod debug;

pub use vulkan::VulkanGraphicsDevice;
pub use vulkan_swapchain::Swapchain as VulkanSwapchain;

// Validation layer reporting
pub use debug::{get_validation_stats, print_validation_stats_report};
