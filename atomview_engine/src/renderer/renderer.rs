//! Renderer: per-frame orchestration of the render graph.
//!
//! One frame is
//!
//! ```text
//! begin_frame   wait for the slot's fence, reset its command list
//! update        binding callbacks write replica `frame_index`
//! render        compute layers, then passes → layers → items
//! end_frame     submit with the next fence value, present
//! sweep         free retired resources the GPU has finished with
//! ```
//!
//! `draw_frame` runs all of it. The individual steps are public so
//! callers can interleave their own work between them.

use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use crate::config::RendererConfig;
use crate::error::Result;
use crate::frame::{DeferredReclaimer, FrameSynchronizer, RetiredResource};
use crate::graphics_device::{
    BindingKind, ClearValue, CommandList, FenceValue, GraphicsDevice, PresentResult, Rect2D, Swapchain, Viewport,
};
use crate::render_graph::{FrameTime, LayerId, RenderGraph};
use crate::resource::{ConstantBuffer, ConstantBufferDesc, MeshCollection};
use crate::engine_bail;

/// Counters exposed for overlays and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_submitted: u64,
    /// Frames whose `begin_frame` had to block on the slot fence
    pub fence_waits: u64,
    pub resources_reclaimed: u64,
    pub pending_deletions: usize,
    /// Value signaled by the latest submission
    pub last_fence_value: FenceValue,
    pub last_draw_count: u32,
    pub last_dispatch_count: u32,
}

/// Commands recorded by one `render` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub draws: u32,
    pub dispatches: u32,
}

// Fields drop in declaration order: GPU resources go before the device
pub struct Renderer {
    config: RendererConfig,
    graph: RenderGraph,
    reclaimer: DeferredReclaimer<RetiredResource>,
    sync: FrameSynchronizer,
    last_counts: RecordCounts,
    shut_down: bool,
    device: Arc<Mutex<dyn GraphicsDevice>>,
}

impl Renderer {
    /// Create a renderer with an empty graph
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let sync = FrameSynchronizer::new(Arc::clone(&device), config.frames_in_flight)?;
        let reclaimer = DeferredReclaimer::with_soft_limit(config.max_pending_deletions);

        crate::engine_info!(
            "atomview::Renderer",
            "Renderer created ({} frames in flight)",
            config.frames_in_flight
        );

        Ok(Self {
            config,
            device,
            graph: RenderGraph::new(),
            sync,
            reclaimer,
            last_counts: RecordCounts::default(),
            shut_down: false,
        })
    }

    // ===== ACCESSORS =====

    pub fn config(&self) -> &RendererConfig { &self.config }

    pub fn device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> { &self.device }

    pub fn graph(&self) -> &RenderGraph { &self.graph }

    pub fn graph_mut(&mut self) -> &mut RenderGraph { &mut self.graph }

    pub fn frame_synchronizer(&self) -> &FrameSynchronizer { &self.sync }

    pub fn reclaimer(&self) -> &DeferredReclaimer<RetiredResource> { &self.reclaimer }

    pub fn frames_in_flight(&self) -> usize { self.sync.frames_in_flight() }

    /// Slot the next (or current) frame records into
    pub fn frame_index(&self) -> usize { self.sync.frame_index() }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frames_submitted: self.sync.frames_submitted(),
            fence_waits: self.sync.fence_waits(),
            resources_reclaimed: self.reclaimer.total_reclaimed(),
            pending_deletions: self.reclaimer.pending(),
            last_fence_value: self.sync.last_signaled_fence_value(),
            last_draw_count: self.last_counts.draws,
            last_dispatch_count: self.last_counts.dispatches,
        }
    }

    /// Constant buffer with one replica per frame in flight
    pub fn create_constant_buffer<T: Pod>(&self, name: &str, capacity: u32, kind: BindingKind) -> Result<Arc<ConstantBuffer<T>>> {
        Ok(Arc::new(ConstantBuffer::new(ConstantBufferDesc {
            name: name.to_string(),
            device: Arc::clone(&self.device),
            capacity,
            frames_in_flight: self.sync.frames_in_flight(),
            kind,
        })?))
    }

    // ===== FRAME STEPS =====

    /// Wait until the next slot is free and start recording into it
    pub fn begin_frame(&mut self) -> Result<usize> {
        if self.shut_down {
            engine_bail!("atomview::Renderer", "begin_frame after shutdown");
        }
        self.sync.begin_frame()
    }

    /// Refresh every binding's replica for `frame_index`
    ///
    /// Only valid between `begin_frame` and `end_frame` for that frame,
    /// when the GPU is known to be done with the replica. Returns the
    /// number of update callbacks invoked.
    pub fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        self.check_recording(frame_index)?;
        self.graph.update(time, frame_index)
    }

    /// Record the whole graph for `frame_index` into the slot's command list
    ///
    /// Compute layers of every active pass run first, then the active
    /// passes render into `image_index` of `swapchain`.
    pub fn render(&mut self, frame_index: usize, swapchain: &dyn Swapchain, image_index: u32) -> Result<RecordCounts> {
        self.check_recording(frame_index)?;
        let clear_values = [
            ClearValue::Color(self.config.clear_color),
            ClearValue::DepthStencil { depth: self.config.clear_depth, stencil: self.config.clear_stencil },
        ];
        let cmd = self.sync.command_list()?;
        let counts = record_graph(&mut self.graph, cmd, frame_index, swapchain, image_index, &clear_values)?;

        crate::engine_trace!(
            "atomview::Renderer",
            "Frame {}: {} dispatches, {} draws",
            frame_index, counts.dispatches, counts.draws
        );
        self.last_counts = counts;
        Ok(counts)
    }

    /// Submit the recorded frame, present it, then sweep the reclaimer
    pub fn end_frame(&mut self, swapchain: &mut dyn Swapchain, image_index: u32) -> Result<PresentResult> {
        self.sync.end_frame_with_swapchain(&*swapchain, image_index)?;
        let presented = swapchain.present(image_index)?;
        self.sweep()?;
        Ok(presented)
    }

    /// Run one complete frame
    ///
    /// Any error is a device failure or a broken graph; the caller should
    /// stop the frame loop.
    pub fn draw_frame(&mut self, time: &FrameTime, swapchain: &mut dyn Swapchain) -> Result<PresentResult> {
        let frame_index = self.begin_frame()?;
        let image_index = swapchain.acquire_next_image()?;
        self.update(time, frame_index)?;
        self.render(frame_index, &*swapchain, image_index)?;
        self.end_frame(swapchain, image_index)
    }

    /// Free retired resources whose fence value the device has completed
    pub fn sweep(&mut self) -> Result<usize> {
        let completed = self.sync.completed_fence_value()?;
        Ok(self.reclaimer.sweep(completed))
    }

    // ===== RESOURCE LIFETIME =====

    /// Hand a resource to the reclaimer
    ///
    /// It is dropped once the GPU completes the next submission, which is
    /// the last one that can reference it.
    pub fn retire(&mut self, resource: impl Into<RetiredResource>) {
        let resource = resource.into();
        let fence_value = self.sync.next_fence_value();
        crate::engine_debug!(
            "atomview::Renderer",
            "Retiring {} until fence {}",
            resource.describe(), fence_value
        );
        self.reclaimer.enqueue(resource, fence_value);
    }

    /// Swap a layer's mesh collection; the old one goes to the reclaimer
    pub fn replace_layer_mesh(&mut self, layer: LayerId, mesh: Arc<MeshCollection>) -> Result<()> {
        let previous = self.graph.layer_mut(layer)?.replace_mesh(mesh)?;
        self.retire(previous);
        Ok(())
    }

    /// Wait for the GPU to go idle and free everything pending
    ///
    /// A frame left recording by a failed step is abandoned first. Called
    /// by `Drop` when not called explicitly.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        let abandoned = self.sync.abandon_frame();
        crate::frame::frame_synchronizer::lock_device(&self.device)?.wait_idle()?;
        let freed = self.reclaimer.drain();
        self.shut_down = true;
        abandoned?;

        crate::engine_info!(
            "atomview::Renderer",
            "Renderer shut down after {} frames ({} resources freed at shutdown)",
            self.sync.frames_submitted(), freed
        );
        Ok(())
    }

    fn check_recording(&self, frame_index: usize) -> Result<()> {
        if !self.sync.is_recording() || self.sync.frame_index() != frame_index {
            engine_bail!(
                "atomview::Renderer",
                "frame {} is not the frame being recorded (current slot {}, recording: {})",
                frame_index, self.sync.frame_index(), self.sync.is_recording()
            );
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if !self.shut_down {
            if let Err(e) = self.shutdown() {
                crate::engine_error!("atomview::Renderer", "Shutdown on drop failed: {}", e);
            }
        }
    }
}

/// Record compute work, then every active pass inside one rendering scope
fn record_graph(
    graph: &mut RenderGraph,
    cmd: &mut dyn CommandList,
    frame_index: usize,
    swapchain: &dyn Swapchain,
    image_index: u32,
    clear_values: &[ClearValue],
) -> Result<RecordCounts> {
    let mut counts = RecordCounts::default();

    for pass in graph.passes_mut().iter_mut().filter(|p| p.is_active()) {
        counts.dispatches += pass.record_compute(cmd, frame_index)?;
    }

    cmd.begin_rendering(swapchain, image_index, clear_values)?;
    cmd.set_viewport(Viewport::full(swapchain.width(), swapchain.height()))?;
    cmd.set_scissor(Rect2D::full(swapchain.width(), swapchain.height()))?;
    for pass in graph.passes_mut().iter_mut().filter(|p| p.is_active()) {
        counts.draws += pass.record_graphics(cmd, frame_index)?;
    }
    cmd.end_rendering()?;

    Ok(counts)
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
