/// CommandList - Vulkan implementation of the CommandList trait
///
/// Each list owns its command pool, so `reset` recycles the whole pool.
/// Rendering uses dynamic rendering straight into the swapchain image;
/// constant regions and storage ranges are bound with push descriptors.

use atomview_engine::atomview::{Result, Error};
use atomview_engine::atomview::device::{
    BindPoint, BindingKind, BindingLayout as GraphicsBindingLayout, Buffer as GraphicsBuffer, BufferView,
    ClearValue, CommandList as GraphicsCommandList, IndexType, Pipeline as GraphicsPipeline, PrimitiveTopology,
    Rect2D, Swapchain as GraphicsSwapchain, Viewport,
};
use atomview_engine::{engine_bail, engine_error};
use ash::vk;
use std::sync::Arc;

use crate::vulkan::{downcast_binding_layout, downcast_buffer, downcast_pipeline, downcast_swapchain};
use crate::vulkan_context::GpuContext;
use crate::vulkan_format::{binding_kind_to_vk, has_stencil, index_type_to_vk, topology_to_vk};

/// Layout targeted by push-descriptor binds
struct BoundLayout {
    layout: Arc<dyn GraphicsBindingLayout>,
    pipeline_layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
}

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    is_recording: bool,
    /// Swapchain image rendered into, while inside begin/end_rendering
    rendering_image: Option<vk::Image>,
    bound_layout: Option<BoundLayout>,
}

fn bind_point_to_vk(bind_point: BindPoint) -> vk::PipelineBindPoint {
    match bind_point {
        BindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
        BindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
    }
}

fn full_subresource(aspect_mask: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);

            let command_pool = ctx.device.create_command_pool(&pool_info, None).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to create command pool: {:?}", e);
                Error::BackendError(format!("Failed to create command pool: {:?}", e))
            })?;

            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffers = match ctx.device.allocate_command_buffers(&allocate_info) {
                Ok(buffers) => buffers,
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_bail!("atomview::vulkan", "Failed to allocate command buffer: {:?}", e);
                }
            };

            Ok(Self {
                ctx,
                command_pool,
                command_buffer: command_buffers[0],
                is_recording: false,
                rendering_image: None,
                bound_layout: None,
            })
        }
    }

    /// Underlying Vulkan command buffer
    pub(crate) fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    fn check_recording(&self, operation: &str) -> Result<()> {
        if !self.is_recording {
            engine_bail!("atomview::vulkan", "{}: command list not recording", operation);
        }
        Ok(())
    }

    fn check_rendering(&self, operation: &str) -> Result<()> {
        self.check_recording(operation)?;
        if self.rendering_image.is_none() {
            engine_bail!("atomview::vulkan", "{}: not inside begin_rendering/end_rendering", operation);
        }
        Ok(())
    }

    /// Push one buffer descriptor at `slot` of the bound layout
    fn push_buffer(&mut self, slot: u32, view: &BufferView, expected: BindingKind) -> Result<()> {
        self.check_recording("push descriptor")?;
        let Some(bound) = self.bound_layout.as_ref() else {
            engine_bail!("atomview::vulkan", "Binding slot {} with no binding layout bound", slot);
        };
        match bound.layout.slot(slot) {
            Some(desc) if desc.kind == expected => {}
            Some(desc) => engine_bail!(
                "atomview::vulkan",
                "Slot {} is declared {:?} but bound as {:?}",
                slot, desc.kind, expected
            ),
            None => engine_bail!("atomview::vulkan", "Slot {} is not declared by the bound layout", slot),
        }

        let buffer = downcast_buffer(&*view.buffer);
        let buffer_info = [vk::DescriptorBufferInfo { buffer: buffer.buffer, offset: view.offset, range: view.size }];
        let write = vk::WriteDescriptorSet::default()
            .dst_binding(slot)
            .descriptor_type(binding_kind_to_vk(expected))
            .buffer_info(&buffer_info);

        unsafe {
            self.ctx.push_descriptor.cmd_push_descriptor_set(
                self.command_buffer,
                bound.bind_point,
                bound.pipeline_layout,
                0,
                &[write],
            );
        }
        Ok(())
    }
}

impl GraphicsCommandList for CommandList {
    fn reset(&mut self) -> Result<()> {
        // Resetting the pool also returns a buffer in the recording state to initial
        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to reset command pool: {:?}", e);
                    Error::BackendError(format!("Failed to reset command pool: {:?}", e))
                })?;
        }
        self.is_recording = false;
        self.rendering_image = None;
        self.bound_layout = None;
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!("atomview::vulkan", "begin: command list already recording");
        }
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| {
                    engine_error!("atomview::vulkan", "Failed to begin command buffer: {:?}", e);
                    Error::BackendError(format!("Failed to begin command buffer: {:?}", e))
                })?;
        }
        self.is_recording = true;
        self.rendering_image = None;
        self.bound_layout = None;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording("end")?;
        if self.rendering_image.is_some() {
            engine_bail!("atomview::vulkan", "end: rendering not ended before ending command list");
        }
        unsafe {
            self.ctx.device.end_command_buffer(self.command_buffer).map_err(|e| {
                engine_error!("atomview::vulkan", "Failed to end command buffer: {:?}", e);
                Error::BackendError(format!("Failed to end command buffer: {:?}", e))
            })?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_rendering(
        &mut self,
        swapchain: &dyn GraphicsSwapchain,
        image_index: u32,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.check_recording("begin_rendering")?;
        if self.rendering_image.is_some() {
            engine_bail!("atomview::vulkan", "begin_rendering: already inside a rendering scope");
        }

        let swapchain = downcast_swapchain(swapchain);
        let index = image_index as usize;
        if index >= swapchain.images.len() {
            engine_bail!(
                "atomview::vulkan",
                "begin_rendering: image_index {} out of range (count: {})",
                image_index, swapchain.images.len()
            );
        }
        let color_image = swapchain.images[index];

        let mut color_clear = [0.0, 0.0, 0.0, 1.0];
        let mut depth_clear = (1.0, 0);
        for value in clear_values {
            match *value {
                ClearValue::Color(color) => color_clear = color,
                ClearValue::DepthStencil { depth, stencil } => depth_clear = (depth, stencil),
            }
        }

        let mut depth_aspect = vk::ImageAspectFlags::DEPTH;
        if has_stencil(swapchain.depth_format) {
            depth_aspect |= vk::ImageAspectFlags::STENCIL;
        }
        let depth_stages = vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;

        let image_barriers = [
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .src_access_mask(vk::AccessFlags2::NONE)
                .dst_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
                .dst_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image(color_image)
                .subresource_range(full_subresource(vk::ImageAspectFlags::COLOR)),
            vk::ImageMemoryBarrier2::default()
                .src_stage_mask(depth_stages)
                .src_access_mask(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
                .dst_stage_mask(depth_stages)
                .dst_access_mask(
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                .image(swapchain.depth_image())
                .subresource_range(full_subresource(depth_aspect)),
        ];

        // Compute work recorded before rendering feeds vertex and fragment stages
        let memory_barriers = [vk::MemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COMPUTE_SHADER)
            .src_access_mask(vk::AccessFlags2::SHADER_STORAGE_WRITE)
            .dst_stage_mask(
                vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT
                    | vk::PipelineStageFlags2::VERTEX_SHADER
                    | vk::PipelineStageFlags2::FRAGMENT_SHADER,
            )
            .dst_access_mask(
                vk::AccessFlags2::VERTEX_ATTRIBUTE_READ
                    | vk::AccessFlags2::SHADER_STORAGE_READ
                    | vk::AccessFlags2::UNIFORM_READ,
            )];

        let dependency = vk::DependencyInfo::default()
            .memory_barriers(&memory_barriers)
            .image_memory_barriers(&image_barriers);

        let color_attachment = [vk::RenderingAttachmentInfo::default()
            .image_view(swapchain.image_views[index])
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { color: vk::ClearColorValue { float32: color_clear } })];

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(swapchain.depth_view())
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: depth_clear.0, stencil: depth_clear.1 },
            });

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: swapchain.extent })
            .layer_count(1)
            .color_attachments(&color_attachment)
            .depth_attachment(&depth_attachment);
        if has_stencil(swapchain.depth_format) {
            rendering_info = rendering_info.stencil_attachment(&depth_attachment);
        }

        unsafe {
            self.ctx.device.cmd_pipeline_barrier2(self.command_buffer, &dependency);
            self.ctx.device.cmd_begin_rendering(self.command_buffer, &rendering_info);
        }

        self.rendering_image = Some(color_image);
        Ok(())
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.check_recording("end_rendering")?;
        let Some(image) = self.rendering_image.take() else {
            engine_bail!("atomview::vulkan", "end_rendering: no rendering scope to end");
        };

        let to_present = [vk::ImageMemoryBarrier2::default()
            .src_stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE)
            .dst_stage_mask(vk::PipelineStageFlags2::NONE)
            .dst_access_mask(vk::AccessFlags2::NONE)
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .image(image)
            .subresource_range(full_subresource(vk::ImageAspectFlags::COLOR))];

        unsafe {
            self.ctx.device.cmd_end_rendering(self.command_buffer);
            self.ctx.device.cmd_pipeline_barrier2(
                self.command_buffer,
                &vk::DependencyInfo::default().image_memory_barriers(&to_present),
            );
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.check_recording("set_viewport")?;
        let vk_viewport = vk::Viewport::default()
            .x(viewport.x)
            .y(viewport.y)
            .width(viewport.width)
            .height(viewport.height)
            .min_depth(viewport.min_depth)
            .max_depth(viewport.max_depth);
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.check_recording("set_scissor")?;
        let vk_scissor = vk::Rect2D::default()
            .offset(vk::Offset2D { x: scissor.x, y: scissor.y })
            .extent(vk::Extent2D { width: scissor.width, height: scissor.height });
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_binding_layout(&mut self, layout: &Arc<dyn GraphicsBindingLayout>, bind_point: BindPoint) -> Result<()> {
        self.check_recording("bind_binding_layout")?;
        let pipeline_layout = downcast_binding_layout(&**layout).pipeline_layout;
        self.bound_layout = Some(BoundLayout {
            layout: Arc::clone(layout),
            pipeline_layout,
            bind_point: bind_point_to_vk(bind_point),
        });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn GraphicsPipeline>) -> Result<()> {
        self.check_recording("bind_pipeline")?;
        let vk_pipeline = downcast_pipeline(&**pipeline);
        let bind_point = bind_point_to_vk(vk_pipeline.bind_point);

        // Fall back to the pipeline's own layout when none is bound for its bind point
        let needs_layout = self.bound_layout.as_ref().map_or(true, |bound| bound.bind_point != bind_point);
        if needs_layout {
            self.bound_layout = Some(BoundLayout {
                layout: Arc::clone(&vk_pipeline.binding_layout),
                pipeline_layout: vk_pipeline.pipeline_layout(),
                bind_point,
            });
        }

        unsafe {
            self.ctx.device.cmd_bind_pipeline(self.command_buffer, bind_point, vk_pipeline.pipeline);
        }
        Ok(())
    }

    fn bind_constants(&mut self, slot: u32, view: &BufferView) -> Result<()> {
        self.push_buffer(slot, view, BindingKind::Constants)
    }

    fn bind_storage(&mut self, slot: u32, view: &BufferView) -> Result<()> {
        self.push_buffer(slot, view, BindingKind::Storage)
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.check_recording("set_primitive_topology")?;
        unsafe {
            self.ctx.device.cmd_set_primitive_topology(self.command_buffer, topology_to_vk(topology));
        }
        Ok(())
    }

    fn set_stencil_reference(&mut self, reference: u32) -> Result<()> {
        self.check_recording("set_stencil_reference")?;
        unsafe {
            self.ctx.device.cmd_set_stencil_reference(
                self.command_buffer,
                vk::StencilFaceFlags::FRONT_AND_BACK,
                reference,
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: &Arc<dyn GraphicsBuffer>, offset: u64) -> Result<()> {
        self.check_recording("bind_vertex_buffer")?;
        let vk_buffer = downcast_buffer(&**buffer);
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer.buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn GraphicsBuffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.check_recording("bind_index_buffer")?;
        let vk_buffer = downcast_buffer(&**buffer);
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                offset,
                index_type_to_vk(index_type),
            );
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.check_rendering("draw")?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.check_rendering("draw_indexed")?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.check_recording("dispatch")?;
        if self.rendering_image.is_some() {
            engine_bail!("atomview::vulkan", "dispatch: not allowed inside a rendering scope");
        }
        unsafe {
            self.ctx.device.cmd_dispatch(self.command_buffer, x, y, z);
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer with it
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
