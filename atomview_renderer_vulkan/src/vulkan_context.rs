/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything a resource needs after creation:
/// - Device for Vulkan API calls
/// - Allocator for memory management
/// - Push descriptor loader used by command lists

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

/// Shared GPU context for all Vulkan resources.
///
/// Shared (via `Arc`) by buffers, pipelines, command lists and swapchains so
/// each of them can destroy its own handles on drop.
///
/// Note: Device and instance destruction is handled by VulkanGraphicsDevice::drop()
/// so the allocator can be released between the two.
pub struct GpuContext {
    /// Vulkan logical device
    pub device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is dropped BEFORE the device is destroyed
    pub allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,

    /// Graphics queue, also used for compute and present
    pub graphics_queue: vk::Queue,

    pub graphics_queue_family: u32,

    /// VK_KHR_push_descriptor entry points
    pub push_descriptor: ash::khr::push_descriptor::Device,

    /// Whether `wideLines` was enabled on the device
    pub wide_lines: bool,

    /// Vulkan instance (destroyed by VulkanGraphicsDevice)
    pub(crate) instance: ash::Instance,

    /// Debug utils loader (for validation layers)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    /// Lock the allocator, mapping poisoning to a backend error
    pub fn allocator(&self) -> atomview_engine::atomview::Result<std::sync::MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| atomview_engine::engine_err!("atomview::vulkan", "GPU allocator lock poisoned"))
    }
}
