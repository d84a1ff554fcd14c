/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the presentable images, one depth-stencil attachment shared by all
/// of them, and the binary semaphores ordering acquire, submit and present.
/// Acquire semaphores form a ring of `frames_in_flight` entries; the ring
/// advances on present, so an entry is only reused once the frame
/// synchronizer has retired the frame that waited on it.

use atomview_engine::atomview::{Result, Error};
use atomview_engine::atomview::device::{PresentResult, Swapchain as GraphicsSwapchain};
use atomview_engine::{engine_debug, engine_error, engine_err, engine_info};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{choose_present_mode, has_stencil};

/// Depth-stencil attachment sized to the swapchain extent
struct DepthAttachment {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
}

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,
    physical_device: vk::PhysicalDevice,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) image_views: Vec<vk::ImageView>,
    pub(crate) format: vk::SurfaceFormatKHR,
    pub(crate) extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    depth: DepthAttachment,
    pub(crate) depth_format: vk::Format,

    /// One per frame in flight (acquire)
    image_available_semaphores: Vec<vk::Semaphore>,
    /// One per swapchain image (present)
    render_finished_semaphores: Vec<vk::Semaphore>,

    /// Index into `image_available_semaphores`
    current_frame: usize,
}

impl Swapchain {
    /// Create a swapchain for `surface`
    ///
    /// Takes ownership of the surface; it is destroyed with the swapchain.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        format: vk::SurfaceFormatKHR,
        depth_format: vk::Format,
        frames_in_flight: usize,
        vsync: bool,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to query present modes: {:?}", e))
                })?
        };
        let present_mode = choose_present_mode(&present_modes, vsync);

        let mut swapchain = Self {
            ctx,
            physical_device,
            surface,
            surface_loader,
            swapchain: vk::SwapchainKHR::null(),
            swapchain_loader,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent: vk::Extent2D { width, height },
            present_mode,
            depth: DepthAttachment { image: vk::Image::null(), view: vk::ImageView::null(), allocation: None },
            depth_format,
            image_available_semaphores: Vec::new(),
            render_finished_semaphores: Vec::new(),
            current_frame: 0,
        };

        for _ in 0..frames_in_flight {
            let semaphore = swapchain.create_semaphore()?;
            swapchain.image_available_semaphores.push(semaphore);
        }
        swapchain.build(width, height)?;

        engine_info!(
            "atomview::vulkan",
            "Swapchain created: {}x{}, {} images, {:?}",
            swapchain.extent.width, swapchain.extent.height, swapchain.images.len(), present_mode
        );
        Ok(swapchain)
    }

    /// (wait, signal) semaphores for a submission rendering into `image_index`
    pub(crate) fn sync_info(&self, image_index: u32) -> (vk::Semaphore, vk::Semaphore) {
        (
            self.image_available_semaphores[self.current_frame],
            self.render_finished_semaphores[image_index as usize],
        )
    }

    pub(crate) fn depth_image(&self) -> vk::Image {
        self.depth.image
    }

    pub(crate) fn depth_view(&self) -> vk::ImageView {
        self.depth.view
    }

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        unsafe {
            self.ctx
                .device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to create semaphore: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create semaphore: {:?}", e))
                })
        }
    }

    /// Create (or recreate) the swapchain, its views, depth attachment and
    /// present semaphores. Previous per-image objects must already be destroyed.
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(self.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?
        };

        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            vk::Extent2D {
                width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
            }
        };

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        unsafe {
            self.swapchain = self.swapchain_loader.create_swapchain(&create_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
            })?;
            if old_swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(old_swapchain, None);
            }

            self.images = self.swapchain_loader.get_swapchain_images(self.swapchain).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to get swapchain images: {:?}", e);
                Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e))
            })?;
        }
        self.extent = extent;

        for &image in &self.images {
            let view = self.create_view(image, self.format.format, vk::ImageAspectFlags::COLOR)?;
            self.image_views.push(view);
        }
        for _ in 0..self.images.len() {
            let semaphore = self.create_semaphore()?;
            self.render_finished_semaphores.push(semaphore);
        }

        self.depth = self.create_depth_attachment()?;
        Ok(())
    }

    fn create_view(&self, image: vk::Image, format: vk::Format, aspect_mask: vk::ImageAspectFlags) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        unsafe {
            self.ctx.device.create_image_view(&create_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create image view: {:?}", e);
                Error::InitializationFailed(format!("Failed to create image view: {:?}", e))
            })
        }
    }

    fn create_depth_attachment(&self) -> Result<DepthAttachment> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.depth_format)
            .extent(vk::Extent3D { width: self.extent.width, height: self.extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = self.ctx.device.create_image(&image_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create depth image: {:?}", e);
                Error::InitializationFailed(format!("Failed to create depth image: {:?}", e))
            })?;
            let requirements = self.ctx.device.get_image_memory_requirements(image);

            let allocation = self
                .ctx
                .allocator()?
                .allocate(&AllocationCreateDesc {
                    name: "depth_stencil",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|e| {
                    self.ctx.device.destroy_image(image, None);
                    engine_error!("atomview::vulkan", "Out of GPU memory for depth attachment: {:?}", e);
                    Error::OutOfMemory
                })?;

            self.ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to bind depth image memory: {:?}", e))?;

            let mut aspect = vk::ImageAspectFlags::DEPTH;
            if has_stencil(self.depth_format) {
                aspect |= vk::ImageAspectFlags::STENCIL;
            }
            let view = self.create_view(image, self.depth_format, aspect)?;

            Ok(DepthAttachment { image, view, allocation: Some(allocation) })
        }
    }

    /// Destroy everything `build` creates, except the swapchain handle itself
    fn destroy_image_resources(&mut self) {
        unsafe {
            for view in self.image_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            for semaphore in self.render_finished_semaphores.drain(..) {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            if self.depth.view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.depth.view, None);
            }
            if let Some(allocation) = self.depth.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }
            if self.depth.image != vk::Image::null() {
                self.ctx.device.destroy_image(self.depth.image, None);
            }
        }
        self.depth = DepthAttachment { image: vk::Image::null(), view: vk::ImageView::null(), allocation: None };
        self.images.clear();
    }
}

impl GraphicsSwapchain for Swapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        unsafe {
            let (image_index, _suboptimal) = self
                .swapchain_loader
                .acquire_next_image(
                    self.swapchain,
                    u64::MAX,
                    self.image_available_semaphores[self.current_frame],
                    vk::Fence::null(),
                )
                .map_err(|e| {
                    if e == vk::Result::ERROR_OUT_OF_DATE_KHR {
                        engine_err!("atomview::vulkan", "Swapchain out of date during acquire")
                    } else {
                        engine_err!("atomview::vulkan", "Failed to acquire next swapchain image: {:?}", e)
                    }
                })?;
            Ok(image_index)
        }
    }

    fn present(&mut self, image_index: u32) -> Result<PresentResult> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [self.render_finished_semaphores[image_index as usize]];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(self.ctx.graphics_queue, &present_info) };

        // The acquire semaphore was consumed by the submission either way
        self.current_frame = (self.current_frame + 1) % self.image_available_semaphores.len();

        match result {
            Ok(false) => Ok(PresentResult::Presented),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                Ok(PresentResult::Suboptimal)
            }
            Err(e) => Err(engine_err!("atomview::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to wait idle before swapchain recreate: {:?}", e))?;
        }
        self.destroy_image_resources();
        self.build(width, height)?;

        engine_debug!(
            "atomview::vulkan",
            "Swapchain recreated: {}x{}",
            self.extent.width, self.extent.height
        );
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn width(&self) -> u32 {
        self.extent.width
    }

    fn height(&self) -> u32 {
        self.extent.height
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
        }
        self.destroy_image_resources();
        unsafe {
            for &semaphore in &self.image_available_semaphores {
                self.ctx.device.destroy_semaphore(semaphore, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
