/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Requires Vulkan 1.3 (dynamic rendering, synchronization2, timeline
/// semaphores) plus VK_KHR_push_descriptor. The completion fence is a
/// single timeline semaphore: each submission signals the value it is
/// given, and completed/wait queries read that semaphore.

use atomview_engine::atomview::{Result, Error};
use atomview_engine::atomview::config::RendererConfig;
use atomview_engine::atomview::device::{
    BindPoint, BindingLayout as GraphicsBindingLayout, BindingLayoutDesc, Buffer as GraphicsBuffer, BufferDesc,
    CommandList as GraphicsCommandList, ComputePipelineDesc, FenceValue, GraphicsDevice, Pipeline as GraphicsPipeline,
    PipelineDesc, Shader as GraphicsShader, ShaderDesc, ShaderStage, Swapchain as GraphicsSwapchain,
};
use atomview_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use winit::window::Window;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::CommandList;
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::*;
use crate::vulkan_pipeline::{BindingLayout, Pipeline};
use crate::vulkan_shader::Shader;
use crate::vulkan_swapchain::Swapchain;

/// SPIR-V magic number, first word of every module
const SPIRV_MAGIC: u32 = 0x0723_0203;

// ===== DOWNCASTS =====
//
// Every trait object handed to this backend was created by it, so the
// concrete type behind the pointer is known.

pub(crate) fn downcast_buffer(buffer: &dyn GraphicsBuffer) -> &Buffer {
    unsafe { &*(buffer as *const dyn GraphicsBuffer as *const Buffer) }
}

pub(crate) fn downcast_shader(shader: &dyn GraphicsShader) -> &Shader {
    unsafe { &*(shader as *const dyn GraphicsShader as *const Shader) }
}

pub(crate) fn downcast_binding_layout(layout: &dyn GraphicsBindingLayout) -> &BindingLayout {
    unsafe { &*(layout as *const dyn GraphicsBindingLayout as *const BindingLayout) }
}

pub(crate) fn downcast_pipeline(pipeline: &dyn GraphicsPipeline) -> &Pipeline {
    unsafe { &*(pipeline as *const dyn GraphicsPipeline as *const Pipeline) }
}

pub(crate) fn downcast_swapchain(swapchain: &dyn GraphicsSwapchain) -> &Swapchain {
    unsafe { &*(swapchain as *const dyn GraphicsSwapchain as *const Swapchain) }
}

pub(crate) fn downcast_command_list(commands: &dyn GraphicsCommandList) -> &CommandList {
    unsafe { &*(commands as *const dyn GraphicsCommandList as *const CommandList) }
}

/// Vulkan device implementation
///
/// Creates resources and owns the submission queue and its timeline fence.
/// Swapchains are created separately from a window with `create_swapchain`.
pub struct VulkanGraphicsDevice {
    /// Needed for surface creation
    entry: ash::Entry,
    physical_device: vk::PhysicalDevice,
    /// Color format of swapchain images; pipelines render to it
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    frames_in_flight: usize,
    vsync: bool,

    /// Completion fence
    timeline: vk::Semaphore,
    /// Last value handed to a submission
    last_signaled: AtomicU64,

    gpu_context: Arc<GpuContext>,
}

impl VulkanGraphicsDevice {
    /// Create a device able to present to `window`
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        let enable_validation = config.enable_validation || cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.as_str()).unwrap_or_else(|_| c"AtomView".to_owned());
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"AtomView")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();
            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let (debug_utils_loader, debug_messenger) = if enable_validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);

                crate::debug::init_debug_config(crate::debug::Config {
                    severity: config.debug_severity,
                    enable_stats: true,
                });

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(crate::debug::severity_flags(config.debug_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = debug_utils.create_debug_utils_messenger(&debug_info, None).map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?;

                (Some(debug_utils), Some(messenger))
            } else {
                (None, None)
            };

            // Temporary surface for queue family and format selection
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let selected = Self::select_physical_device(&instance, &surface_loader, surface);
            let formats = selected.as_ref().ok().map(|(physical_device, _)| {
                surface_loader.get_physical_device_surface_formats(*physical_device, surface).unwrap_or_default()
            });
            surface_loader.destroy_surface(surface, None);

            let (physical_device, queue_family) = selected?;
            let surface_format = formats
                .as_deref()
                .and_then(choose_surface_format)
                .ok_or_else(|| {
                    engine_error!("atomview::vulkan", "Surface reports no formats");
                    Error::InitializationFailed("Surface reports no formats".to_string())
                })?;
            let depth_format = Self::select_depth_format(&instance, physical_device)?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy().into_owned();

            let supported = instance.get_physical_device_features(physical_device);
            let wide_lines = supported.wide_lines == vk::TRUE;

            let queue_priorities = [1.0];
            let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
                .queue_family_index(queue_family)
                .queue_priorities(&queue_priorities)];

            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr(), ash::khr::push_descriptor::NAME.as_ptr()];

            let device_features = vk::PhysicalDeviceFeatures::default().wide_lines(wide_lines);
            let mut features12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
            let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
                .synchronization2(true)
                .dynamic_rendering(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features)
                .push_next(&mut features12)
                .push_next(&mut features13);

            let device = instance.create_device(physical_device, &device_create_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;
            let graphics_queue = device.get_device_queue(queue_family, 0);
            let push_descriptor = ash::khr::push_descriptor::Device::new(&instance, &device);

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let mut timeline_type = vk::SemaphoreTypeCreateInfo::default()
                .semaphore_type(vk::SemaphoreType::TIMELINE)
                .initial_value(0);
            let timeline = device
                .create_semaphore(&vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type), None)
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to create timeline semaphore: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create timeline semaphore: {:?}", e))
                })?;

            let gpu_context = Arc::new(GpuContext {
                device,
                allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
                graphics_queue,
                graphics_queue_family: queue_family,
                push_descriptor,
                wide_lines,
                instance,
                debug_utils_loader,
                debug_messenger,
            });

            engine_info!(
                "atomview::vulkan",
                "Vulkan device created: {} (color {:?}, depth {:?}, validation {})",
                device_name, surface_format.format, depth_format, enable_validation
            );

            Ok(Self {
                entry,
                physical_device,
                surface_format,
                depth_format,
                frames_in_flight: config.frames_in_flight,
                vsync: config.vsync,
                timeline,
                last_signaled: AtomicU64::new(0),
                gpu_context,
            })
        }
    }

    /// Pick a Vulkan 1.3 device with push descriptors and a queue family
    /// that does graphics, compute and presentation. Discrete GPUs win.
    fn select_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32)> {
        let physical_devices = unsafe {
            instance.enumerate_physical_devices().map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
            })?
        };

        let mut best: Option<(vk::PhysicalDevice, u32, bool)> = None;
        for physical_device in physical_devices {
            unsafe {
                let properties = instance.get_physical_device_properties(physical_device);
                if properties.api_version < vk::API_VERSION_1_3 {
                    continue;
                }

                let extensions = instance
                    .enumerate_device_extension_properties(physical_device)
                    .unwrap_or_default();
                let has_extension = |name: &CStr| {
                    extensions.iter().any(|ext| ext.extension_name_as_c_str().map_or(false, |n| n == name))
                };
                if !has_extension(ash::khr::swapchain::NAME) || !has_extension(ash::khr::push_descriptor::NAME) {
                    continue;
                }

                let families = instance.get_physical_device_queue_family_properties(physical_device);
                let family = families.iter().enumerate().find_map(|(i, family)| {
                    let flags = vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE;
                    let present = surface_loader
                        .get_physical_device_surface_support(physical_device, i as u32, surface)
                        .unwrap_or(false);
                    (family.queue_flags.contains(flags) && present).then_some(i as u32)
                });
                let Some(family) = family else { continue };

                let discrete = properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU;
                if best.map_or(true, |(_, _, best_discrete)| discrete && !best_discrete) {
                    best = Some((physical_device, family, discrete));
                }
            }
        }

        best.map(|(physical_device, family, _)| (physical_device, family)).ok_or_else(|| {
            engine_error!(
                "atomview::vulkan",
                "No GPU with Vulkan 1.3, VK_KHR_push_descriptor and a graphics+present queue"
            );
            Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
        })
    }

    fn select_depth_format(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Result<vk::Format> {
        DEPTH_STENCIL_CANDIDATES
            .into_iter()
            .find(|&format| {
                let properties = unsafe { instance.get_physical_device_format_properties(physical_device, format) };
                properties
                    .optimal_tiling_features
                    .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            })
            .ok_or_else(|| {
                engine_error!("atomview::vulkan", "No supported depth-stencil format");
                Error::InitializationFailed("No supported depth-stencil format".to_string())
            })
    }

    /// Create a swapchain presenting to `window`, sized to its inner size
    pub fn create_swapchain(&self, window: &Window) -> Result<Swapchain> {
        let size = window.inner_size();

        let display_handle = window.display_handle().map_err(|e| {
            engine_error!("atomview::vulkan", "Failed to get display handle for swapchain: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!("atomview::vulkan", "Failed to get window handle for swapchain: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;

        let ctx = &self.gpu_context;
        let surface = unsafe {
            ash_window::create_surface(
                &self.entry,
                &ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create surface for swapchain: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?
        };
        let surface_loader = ash::khr::surface::Instance::new(&self.entry, &ctx.instance);

        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(self.physical_device, ctx.graphics_queue_family, surface)
                .unwrap_or(false)
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            engine_bail!("atomview::vulkan", "Window surface cannot be presented from the graphics queue");
        }

        Swapchain::new(
            Arc::clone(ctx),
            self.physical_device,
            surface,
            surface_loader,
            self.surface_format,
            self.depth_format,
            self.frames_in_flight,
            self.vsync,
            size.width,
            size.height,
        )
    }

    /// Whether lines wider than 1.0 are honored
    pub fn supports_wide_lines(&self) -> bool {
        self.gpu_context.wide_lines
    }

    /// Record `value` as the next signal, rejecting non-increasing values
    fn claim_signal_value(&self, value: FenceValue) -> Result<()> {
        let previous = self.last_signaled.load(Ordering::Acquire);
        if value <= previous {
            engine_bail!(
                "atomview::vulkan",
                "Fence value {} does not increase past last submitted value {}",
                value, previous
            );
        }
        self.last_signaled.store(value, Ordering::Release);
        Ok(())
    }

    fn submit_internal(
        &self,
        commands: &dyn GraphicsCommandList,
        wait_semaphore: Option<vk::Semaphore>,
        present_semaphore: Option<vk::Semaphore>,
        signal_value: FenceValue,
    ) -> Result<()> {
        self.claim_signal_value(signal_value)?;

        let command_buffer_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(downcast_command_list(commands).command_buffer())];

        let wait_infos: Vec<vk::SemaphoreSubmitInfo> = wait_semaphore
            .into_iter()
            .map(|semaphore| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            })
            .collect();

        let mut signal_infos = vec![vk::SemaphoreSubmitInfo::default()
            .semaphore(self.timeline)
            .value(signal_value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS)];
        if let Some(semaphore) = present_semaphore {
            signal_infos.push(
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(semaphore)
                    .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
            );
        }

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.gpu_context
                .device
                .queue_submit2(self.gpu_context.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
        }
    }

    fn pipeline_shader_stage<'a>(
        shader: &'a Shader,
        expected: ShaderStage,
        pipeline_name: &str,
    ) -> Result<vk::PipelineShaderStageCreateInfo<'a>> {
        if shader.stage != expected {
            engine_bail!(
                "atomview::vulkan",
                "Pipeline '{}': expected a {:?} shader, got {:?}",
                pipeline_name, expected, shader.stage
            );
        }
        Ok(vk::PipelineShaderStageCreateInfo::default()
            .stage(shader_stage_to_vk(shader.stage))
            .module(shader.module)
            .name(&shader.entry_point))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn GraphicsBuffer>> {
        if desc.size == 0 {
            engine_bail!("atomview::vulkan", "Buffer '{}' has zero size", desc.name);
        }

        let ctx = &self.gpu_context;
        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = ctx.device.create_buffer(&buffer_create_info, None).map_err(|e| {
                engine_err!("atomview::vulkan", "Failed to create buffer '{}' of {} bytes: {:?}", desc.name, desc.size, e)
            })?;
            let requirements = ctx.device.get_buffer_memory_requirements(buffer);

            let allocation = ctx
                .allocator()?
                .allocate(&AllocationCreateDesc {
                    name: &desc.name,
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(|_| {
                    ctx.device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!(
                        "atomview::vulkan",
                        "Out of GPU memory for buffer '{}' (required: {:.2} MB)",
                        desc.name, size_mb
                    );
                    Error::OutOfMemory
                })?;

            ctx.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to bind buffer memory: {:?}", e))?;

            engine_debug!(
                "atomview::vulkan",
                "Created buffer '{}' ({} bytes, {:?})",
                desc.name, desc.size, desc.usage
            );
            Ok(Arc::new(Buffer::new(Arc::clone(ctx), buffer, allocation, desc.size, desc.usage)))
        }
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn GraphicsShader>> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            engine_bail!(
                "atomview::vulkan",
                "Shader code must be a non-empty multiple of 4 bytes (size: {} bytes)",
                desc.code.len()
            );
        }

        let words: Vec<u32> = bytemuck::pod_collect_to_vec(desc.code);
        if words[0] != SPIRV_MAGIC {
            engine_bail!("atomview::vulkan", "Shader code is not SPIR-V (magic {:#010x})", words[0]);
        }
        let entry_point = CString::new(desc.entry_point.as_str())
            .map_err(|_| engine_err!("atomview::vulkan", "Shader entry point '{}' contains NUL", desc.entry_point))?;

        let ctx = &self.gpu_context;
        let module = unsafe {
            ctx.device
                .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&words), None)
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to create shader module: {:?}", e))?
        };

        Ok(Arc::new(Shader::new(Arc::clone(ctx), module, desc.stage, entry_point)))
    }

    fn create_binding_layout(&mut self, desc: BindingLayoutDesc) -> Result<Arc<dyn GraphicsBindingLayout>> {
        desc.validate()?;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .slots
            .iter()
            .map(|slot| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(slot.slot)
                    .descriptor_type(binding_kind_to_vk(slot.kind))
                    .descriptor_count(1)
                    .stage_flags(stage_flags_to_vk(slot.stages))
            })
            .collect();

        let ctx = &self.gpu_context;
        unsafe {
            let set_layout_info = vk::DescriptorSetLayoutCreateInfo::default()
                .flags(vk::DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR_KHR)
                .bindings(&bindings);
            let set_layout = ctx
                .device
                .create_descriptor_set_layout(&set_layout_info, None)
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to create descriptor set layout: {:?}", e))?;

            let set_layouts = [set_layout];
            let pipeline_layout = match ctx
                .device
                .create_pipeline_layout(&vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts), None)
            {
                Ok(layout) => layout,
                Err(e) => {
                    ctx.device.destroy_descriptor_set_layout(set_layout, None);
                    engine_bail!("atomview::vulkan", "Failed to create pipeline layout: {:?}", e);
                }
            };

            Ok(Arc::new(BindingLayout::new(Arc::clone(ctx), desc.slots, set_layout, pipeline_layout)))
        }
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn GraphicsPipeline>> {
        let vertex_shader = downcast_shader(&*desc.vertex_shader);
        let fragment_shader = downcast_shader(&*desc.fragment_shader);
        let shader_stages = [
            Self::pipeline_shader_stage(vertex_shader, ShaderStage::Vertex, &desc.name)?,
            Self::pipeline_shader_stage(fragment_shader, ShaderStage::Fragment, &desc.name)?,
        ];

        let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
            .vertex_layout
            .bindings
            .iter()
            .map(|binding| vk::VertexInputBindingDescription {
                binding: binding.binding,
                stride: binding.stride,
                input_rate: vertex_input_rate_to_vk(binding.input_rate),
            })
            .collect();
        let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|attribute| vk::VertexInputAttributeDescription {
                location: attribute.location,
                binding: attribute.binding,
                format: buffer_format_to_vk(attribute.format),
                offset: attribute.offset,
            })
            .collect();
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(topology_class_to_vk(desc.topology_class))
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let line_width = if self.gpu_context.wide_lines { desc.rasterization.line_width } else { 1.0 };
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(polygon_mode_to_vk(desc.rasterization.polygon_mode))
            .line_width(line_width)
            .cull_mode(cull_mode_to_vk(desc.rasterization.cull_mode))
            .front_face(front_face_to_vk(desc.rasterization.front_face))
            .depth_bias_enable(false);

        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(desc.depth_stencil.depth_test_enable)
            .depth_write_enable(desc.depth_stencil.depth_write_enable)
            .depth_compare_op(compare_op_to_vk(desc.depth_stencil.depth_compare_op))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(desc.depth_stencil.stencil_test_enable)
            .front(stencil_op_state_to_vk(&desc.depth_stencil.front))
            .back(stencil_op_state_to_vk(&desc.depth_stencil.back));

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let blend = &desc.color_blend;
        let color_blend_attachment = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(color_write_mask_to_vk(&blend.color_write_mask))
            .blend_enable(blend.blend_enable)
            .src_color_blend_factor(blend_factor_to_vk(blend.src_color_factor))
            .dst_color_blend_factor(blend_factor_to_vk(blend.dst_color_factor))
            .color_blend_op(blend_op_to_vk(blend.color_blend_op))
            .src_alpha_blend_factor(blend_factor_to_vk(blend.src_alpha_factor))
            .dst_alpha_blend_factor(blend_factor_to_vk(blend.dst_alpha_factor))
            .alpha_blend_op(blend_op_to_vk(blend.alpha_blend_op))];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachment);

        // Topology and stencil reference come from the layer at record time
        let dynamic_states = [
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::PRIMITIVE_TOPOLOGY,
            vk::DynamicState::STENCIL_REFERENCE,
        ];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let color_formats = [self.surface_format.format];
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&color_formats)
            .depth_attachment_format(self.depth_format);
        if has_stencil(self.depth_format) {
            rendering_info = rendering_info.stencil_attachment_format(self.depth_format);
        }

        let pipeline_layout = downcast_binding_layout(&*desc.binding_layout).pipeline_layout;

        let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .depth_stencil_state(&depth_stencil_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .push_next(&mut rendering_info);

        let ctx = &self.gpu_context;
        let pipelines = unsafe {
            ctx.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|(_, e)| {
                    engine_err!("atomview::vulkan", "Failed to create graphics pipeline '{}': {:?}", desc.name, e)
                })?
        };

        engine_debug!("atomview::vulkan", "Created pipeline '{}' ({:?})", desc.name, desc.topology_class);
        Ok(Arc::new(Pipeline::new(
            Arc::clone(ctx),
            pipelines[0],
            BindPoint::Graphics,
            desc.name,
            desc.binding_layout,
        )))
    }

    fn create_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<Arc<dyn GraphicsPipeline>> {
        let shader = downcast_shader(&*desc.shader);
        let stage = Self::pipeline_shader_stage(shader, ShaderStage::Compute, &desc.name)?;
        let pipeline_layout = downcast_binding_layout(&*desc.binding_layout).pipeline_layout;

        let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(pipeline_layout);

        let ctx = &self.gpu_context;
        let pipelines = unsafe {
            ctx.device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| {
                    engine_err!("atomview::vulkan", "Failed to create compute pipeline '{}': {:?}", desc.name, e)
                })?
        };

        Ok(Arc::new(Pipeline::new(
            Arc::clone(ctx),
            pipelines[0],
            BindPoint::Compute,
            desc.name,
            desc.binding_layout,
        )))
    }

    fn create_command_list(&self) -> Result<Box<dyn GraphicsCommandList>> {
        Ok(Box::new(CommandList::new(Arc::clone(&self.gpu_context))?))
    }

    fn submit(&self, commands: &dyn GraphicsCommandList, signal_value: FenceValue) -> Result<()> {
        self.submit_internal(commands, None, None, signal_value)
    }

    fn submit_with_swapchain(
        &self,
        commands: &dyn GraphicsCommandList,
        swapchain: &dyn GraphicsSwapchain,
        image_index: u32,
        signal_value: FenceValue,
    ) -> Result<()> {
        let (wait_semaphore, present_semaphore) = downcast_swapchain(swapchain).sync_info(image_index);
        self.submit_internal(commands, Some(wait_semaphore), Some(present_semaphore), signal_value)
    }

    fn completed_fence_value(&self) -> Result<FenceValue> {
        unsafe {
            self.gpu_context
                .device
                .get_semaphore_counter_value(self.timeline)
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to read timeline semaphore: {:?}", e))
        }
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<()> {
        if value == 0 {
            return Ok(());
        }
        let semaphores = [self.timeline];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default().semaphores(&semaphores).values(&values);
        unsafe {
            self.gpu_context
                .device
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to wait for fence value {}: {:?}", value, e))
        }
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.gpu_context
                .device
                .device_wait_idle()
                .map_err(|e| engine_err!("atomview::vulkan", "Failed to wait idle: {:?}", e))
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.gpu_context.device.device_wait_idle().ok();
            self.gpu_context.device.destroy_semaphore(self.timeline, None);

            // Resources still holding the context would outlive the device
            let outstanding = Arc::strong_count(&self.gpu_context) - 1;
            if outstanding > 0 {
                engine_warn!(
                    "atomview::vulkan",
                    "Device dropped while {} resource(s) still reference it; leaking the Vulkan device",
                    outstanding
                );
                return;
            }
            let Some(ctx) = Arc::get_mut(&mut self.gpu_context) else { return };

            // Allocator frees its memory blocks before the device goes away
            ManuallyDrop::drop(&mut ctx.allocator);

            crate::debug::cleanup_debug_config();
            if let (Some(debug_utils), Some(messenger)) = (&ctx.debug_utils_loader, ctx.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            ctx.device.destroy_device(None);
            ctx.instance.destroy_instance(None);
        }
    }
}
