/// Mock graphics device for unit tests (no GPU required)
///
/// Buffers keep their bytes in memory, command lists record every call as
/// a string, and the completion fence is driven by the test: submissions
/// only retire when the test advances the fence, or immediately when
/// `auto_complete` is enabled. `wait_for_fence` records the awaited value
/// and then treats the GPU as having caught up to it.

use std::sync::{Arc, Mutex};
use crate::error::{Error, Result};
use crate::graphics_device::{
    GraphicsDevice, FenceValue, Buffer, BufferDesc, BufferUsage, BufferView, Shader, ShaderDesc,
    ShaderStage, Pipeline, PipelineDesc, ComputePipelineDesc, BindPoint, BindingLayout,
    BindingLayoutDesc, BindingSlotDesc, CommandList, Swapchain, PresentResult, ClearValue,
    IndexType, PrimitiveTopology, Rect2D, Viewport,
};
use crate::engine_bail;

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub name: String,
    pub usage: BufferUsage,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(name: String, size: u64, usage: BufferUsage) -> Self {
        Self { name, usage, data: Mutex::new(vec![0u8; size as usize]) }
    }

    /// Copy of the buffer contents
    pub fn bytes(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut bytes = self.data.lock().unwrap();
        let end = offset as usize + data.len();
        if end > bytes.len() {
            engine_bail!(
                "atomview::MockBuffer",
                "Write of {} bytes at offset {} overflows buffer '{}' of {} bytes",
                data.len(), offset, self.name, bytes.len()
            );
        }
        bytes[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn mapped_ptr(&self) -> Option<*mut u8> {
        None
    }
}

// ============================================================================
// Mock Shader / Pipeline / BindingLayout
// ============================================================================

pub struct MockShader {
    pub stage: ShaderStage,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

pub struct MockPipeline {
    pub name: String,
    pub bind_point: BindPoint,
}

impl MockPipeline {
    pub fn graphics(name: &str) -> Self {
        Self { name: name.to_string(), bind_point: BindPoint::Graphics }
    }

    pub fn compute(name: &str) -> Self {
        Self { name: name.to_string(), bind_point: BindPoint::Compute }
    }
}

impl Pipeline for MockPipeline {
    fn bind_point(&self) -> BindPoint {
        self.bind_point
    }

    fn debug_name(&self) -> &str {
        &self.name
    }
}

pub struct MockBindingLayout {
    pub slots: Vec<BindingSlotDesc>,
}

impl BindingLayout for MockBindingLayout {
    fn slots(&self) -> &[BindingSlotDesc] {
        &self.slots
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub commands: Vec<String>,
    pub reset_count: u32,
    recording: bool,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self { commands: Vec::new(), reset_count: 0, recording: false }
    }

    /// Commands whose name starts with one of `prefixes`, in recorded order
    pub fn filtered(&self, prefixes: &[&str]) -> Vec<String> {
        self.commands
            .iter()
            .filter(|c| prefixes.iter().any(|p| c.starts_with(p)))
            .cloned()
            .collect()
    }

    fn record(&mut self, command: String) -> Result<()> {
        if !self.recording {
            engine_bail!("atomview::MockCommandList", "{} recorded outside begin/end", command);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandList for MockCommandList {
    fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        self.reset_count += 1;
        self.recording = false;
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        self.recording = true;
        self.record("begin".to_string())
    }

    fn end(&mut self) -> Result<()> {
        self.record("end".to_string())?;
        self.recording = false;
        Ok(())
    }

    fn begin_rendering(
        &mut self,
        _swapchain: &dyn Swapchain,
        image_index: u32,
        _clear_values: &[ClearValue],
    ) -> Result<()> {
        self.record(format!("begin_rendering({})", image_index))
    }

    fn end_rendering(&mut self) -> Result<()> {
        self.record("end_rendering".to_string())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(format!("set_viewport({}x{})", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!("set_scissor({}x{})", scissor.width, scissor.height))
    }

    fn bind_binding_layout(&mut self, _layout: &Arc<dyn BindingLayout>, bind_point: BindPoint) -> Result<()> {
        self.record(format!("bind_binding_layout({:?})", bind_point))
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.record(format!("bind_pipeline({})", pipeline.debug_name()))
    }

    fn bind_constants(&mut self, slot: u32, view: &BufferView) -> Result<()> {
        self.record(format!("bind_constants({},{},{})", slot, view.offset, view.size))
    }

    fn bind_storage(&mut self, slot: u32, view: &BufferView) -> Result<()> {
        self.record(format!("bind_storage({},{},{})", slot, view.offset, view.size))
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.record(format!("set_primitive_topology({:?})", topology))
    }

    fn set_stencil_reference(&mut self, reference: u32) -> Result<()> {
        self.record(format!("set_stencil_reference({})", reference))
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, offset: u64) -> Result<()> {
        self.record(format!("bind_vertex_buffer({})", offset))
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, offset: u64, index_type: IndexType) -> Result<()> {
        self.record(format!("bind_index_buffer({},{:?})", offset, index_type))
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.record(format!("draw({},{},{},{})", vertex_count, instance_count, first_vertex, first_instance))
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.record(format!(
            "draw_indexed({},{},{},{},{})",
            index_count, instance_count, first_index, vertex_offset, first_instance
        ))
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()> {
        self.record(format!("dispatch({},{},{})", x, y, z))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub width: u32,
    pub height: u32,
    pub image_count: usize,
    pub next_image: u32,
    pub presented: Vec<u32>,
}

impl MockSwapchain {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, image_count: 3, next_image: 0, presented: Vec::new() }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self) -> Result<u32> {
        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(index)
    }

    fn present(&mut self, image_index: u32) -> Result<PresentResult> {
        self.presented.push(image_index);
        Ok(PresentResult::Presented)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// Fence and submission bookkeeping
#[derive(Default)]
pub struct MockTimeline {
    pub completed: FenceValue,
    pub auto_complete: bool,
    /// Signal values in submission order
    pub submitted: Vec<FenceValue>,
    /// Command sequences in submission order
    pub submitted_commands: Vec<Vec<String>>,
    /// Values passed to `wait_for_fence`, in call order
    pub waits: Vec<FenceValue>,
    pub fail_next_submit: bool,
}

pub struct MockGraphicsDevice {
    pub buffers: Vec<Arc<MockBuffer>>,
    pub pipelines_created: u32,
    pub command_lists_created: u32,
    pub timeline: Mutex<MockTimeline>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            buffers: Vec::new(),
            pipelines_created: 0,
            command_lists_created: 0,
            timeline: Mutex::new(MockTimeline::default()),
        }
    }

    /// Device whose submissions retire as soon as they are submitted
    pub fn with_auto_complete() -> Self {
        let device = Self::new();
        device.timeline.lock().unwrap().auto_complete = true;
        device
    }

    /// Pretend the GPU has retired everything up to `value`
    pub fn set_completed_fence_value(&self, value: FenceValue) {
        let mut timeline = self.timeline.lock().unwrap();
        timeline.completed = timeline.completed.max(value);
    }

    /// Retire every submission made so far
    pub fn complete_all(&self) {
        let mut timeline = self.timeline.lock().unwrap();
        if let Some(&last) = timeline.submitted.last() {
            timeline.completed = timeline.completed.max(last);
        }
    }

    pub fn waits(&self) -> Vec<FenceValue> {
        self.timeline.lock().unwrap().waits.clone()
    }

    pub fn submitted(&self) -> Vec<FenceValue> {
        self.timeline.lock().unwrap().submitted.clone()
    }

    pub fn submitted_commands(&self) -> Vec<Vec<String>> {
        self.timeline.lock().unwrap().submitted_commands.clone()
    }

    pub fn fail_next_submit(&self) {
        self.timeline.lock().unwrap().fail_next_submit = true;
    }

    fn record_submission(&self, commands: &dyn CommandList, signal_value: FenceValue) -> Result<()> {
        let mut timeline = self.timeline.lock().unwrap();
        if timeline.fail_next_submit {
            timeline.fail_next_submit = false;
            return Err(Error::BackendError("mock submit failure".to_string()));
        }
        if let Some(&last) = timeline.submitted.last() {
            if signal_value <= last {
                engine_bail!(
                    "atomview::MockGraphicsDevice",
                    "Fence value {} is not greater than previous signal {}",
                    signal_value, last
                );
            }
        }

        // SAFETY: every command list handed out by this device is a MockCommandList
        let mock = unsafe { &*(commands as *const dyn CommandList as *const MockCommandList) };
        timeline.submitted_commands.push(mock.commands.clone());
        timeline.submitted.push(signal_value);
        if timeline.auto_complete {
            timeline.completed = signal_value;
        }
        Ok(())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        if desc.size == 0 {
            engine_bail!("atomview::MockGraphicsDevice", "Buffer '{}' has zero size", desc.name);
        }
        let buffer = Arc::new(MockBuffer::new(desc.name, desc.size, desc.usage));
        self.buffers.push(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(MockShader { stage: desc.stage }))
    }

    fn create_binding_layout(&mut self, desc: BindingLayoutDesc) -> Result<Arc<dyn BindingLayout>> {
        desc.validate()?;
        Ok(Arc::new(MockBindingLayout { slots: desc.slots }))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        self.pipelines_created += 1;
        Ok(Arc::new(MockPipeline::graphics(&desc.name)))
    }

    fn create_compute_pipeline(&mut self, desc: ComputePipelineDesc) -> Result<Arc<dyn Pipeline>> {
        self.pipelines_created += 1;
        Ok(Arc::new(MockPipeline::compute(&desc.name)))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new()))
    }

    fn submit(&self, commands: &dyn CommandList, signal_value: FenceValue) -> Result<()> {
        self.record_submission(commands, signal_value)
    }

    fn submit_with_swapchain(
        &self,
        commands: &dyn CommandList,
        _swapchain: &dyn Swapchain,
        _image_index: u32,
        signal_value: FenceValue,
    ) -> Result<()> {
        self.record_submission(commands, signal_value)
    }

    fn completed_fence_value(&self) -> Result<FenceValue> {
        Ok(self.timeline.lock().unwrap().completed)
    }

    fn wait_for_fence(&self, value: FenceValue) -> Result<()> {
        let mut timeline = self.timeline.lock().unwrap();
        timeline.waits.push(value);
        timeline.completed = timeline.completed.max(value);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut timeline = self.timeline.lock().unwrap();
        if let Some(&last) = timeline.submitted.last() {
            timeline.completed = timeline.completed.max(last);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
