/// Pipeline and BindingLayout - Vulkan implementations
///
/// A binding layout owns one push-descriptor set layout and the pipeline
/// layout built from it. Pipelines keep their binding layout alive through
/// an `Arc` so the pipeline layout outlives every pipeline created with it.

use atomview_engine::atomview::device::{
    BindPoint, BindingLayout as GraphicsBindingLayout, BindingSlotDesc, Pipeline as GraphicsPipeline,
};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan binding layout
pub struct BindingLayout {
    ctx: Arc<GpuContext>,
    slots: Vec<BindingSlotDesc>,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
}

impl BindingLayout {
    pub fn new(
        ctx: Arc<GpuContext>,
        slots: Vec<BindingSlotDesc>,
        set_layout: vk::DescriptorSetLayout,
        pipeline_layout: vk::PipelineLayout,
    ) -> Self {
        Self { ctx, slots, set_layout, pipeline_layout }
    }
}

impl GraphicsBindingLayout for BindingLayout {
    fn slots(&self) -> &[BindingSlotDesc] {
        &self.slots
    }
}

impl Drop for BindingLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.ctx.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// Vulkan graphics or compute pipeline
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    pub(crate) pipeline: vk::Pipeline,
    pub(crate) bind_point: BindPoint,
    name: String,
    /// Keeps the pipeline layout alive
    pub(crate) binding_layout: Arc<dyn GraphicsBindingLayout>,
}

impl Pipeline {
    pub fn new(
        ctx: Arc<GpuContext>,
        pipeline: vk::Pipeline,
        bind_point: BindPoint,
        name: String,
        binding_layout: Arc<dyn GraphicsBindingLayout>,
    ) -> Self {
        Self { ctx, pipeline, bind_point, name, binding_layout }
    }

    /// Pipeline layout of the binding layout this pipeline was created against
    pub(crate) fn pipeline_layout(&self) -> vk::PipelineLayout {
        crate::vulkan::downcast_binding_layout(&*self.binding_layout).pipeline_layout
    }
}

impl GraphicsPipeline for Pipeline {
    fn bind_point(&self) -> BindPoint {
        self.bind_point
    }

    fn debug_name(&self) -> &str {
        &self.name
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline(self.pipeline, None);
        }
    }
}
