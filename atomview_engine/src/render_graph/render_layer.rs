//! Render pass layers.
//!
//! A `RenderLayer` groups items that share one graphics pipeline and one
//! mesh collection. A `ComputeLayer` groups dispatches that share one
//! compute pipeline.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{BindPoint, BindingLayout, CommandList, Pipeline, PrimitiveTopology};
use crate::resource::MeshCollection;
use crate::{engine_bail, engine_err};
use super::binding::{Binding, FrameTime};
use super::hooks::{HookContext, HookFlow, WorkHooks};
use super::render_item::{update_bindings, ComputeItem, RenderItem};

// ============================================================================
// RENDER LAYER
// ============================================================================

pub struct RenderLayer {
    name: String,
    pipeline: Arc<dyn Pipeline>,
    mesh: Arc<MeshCollection>,
    topology: PrimitiveTopology,
    stencil_reference: Option<u32>,
    active: bool,
    bindings: Vec<Binding>,
    items: Vec<RenderItem>,
    item_names: FxHashMap<String, usize>,
    hooks: WorkHooks,
}

impl RenderLayer {
    /// Layer drawing `mesh` with a graphics `pipeline`
    ///
    /// # Errors
    ///
    /// The pipeline is a compute pipeline.
    pub fn new(
        name: &str,
        pipeline: Arc<dyn Pipeline>,
        mesh: Arc<MeshCollection>,
        topology: PrimitiveTopology,
    ) -> Result<Self> {
        if pipeline.bind_point() != BindPoint::Graphics {
            engine_bail!(
                "atomview::RenderLayer",
                "'{}': pipeline '{}' is not a graphics pipeline",
                name, pipeline.debug_name()
            );
        }
        Ok(Self {
            name: name.to_string(),
            pipeline,
            mesh,
            topology,
            stencil_reference: None,
            active: true,
            bindings: Vec::new(),
            items: Vec::new(),
            item_names: FxHashMap::default(),
            hooks: WorkHooks::default(),
        })
    }

    /// Set the dynamic stencil reference before drawing
    pub fn with_stencil_reference(mut self, reference: u32) -> Self {
        self.stencil_reference = Some(reference);
        self
    }

    /// Layer-wide binding, bound before the items' own bindings
    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_pre_work<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<HookFlow> + Send + Sync + 'static,
    {
        self.hooks.set_pre_work(hook);
        self
    }

    pub fn with_post_work<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.set_post_work(hook);
        self
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str { &self.name }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> { &self.pipeline }

    pub fn mesh(&self) -> &Arc<MeshCollection> { &self.mesh }

    pub fn topology(&self) -> PrimitiveTopology { self.topology }

    pub fn stencil_reference(&self) -> Option<u32> { self.stencil_reference }

    pub fn is_active(&self) -> bool { self.active }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    pub fn items(&self) -> &[RenderItem] { &self.items }

    pub fn item(&self, index: usize) -> Option<&RenderItem> { self.items.get(index) }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut RenderItem> { self.items.get_mut(index) }

    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.item_names.get(name).copied()
    }

    pub fn hooks_mut(&mut self) -> &mut WorkHooks { &mut self.hooks }

    // ===== MUTATION =====

    /// Append an item, returning its index
    ///
    /// # Errors
    ///
    /// Duplicate item name, a submesh index the mesh collection does not have,
    /// or `CapacityExceeded` when a storage binding of the item or the layer
    /// holds fewer elements than `max_instances`.
    pub(crate) fn add_item(&mut self, item: RenderItem) -> Result<usize> {
        if self.item_names.contains_key(item.name()) {
            engine_bail!("atomview::RenderLayer", "'{}': duplicate item '{}'", self.name, item.name());
        }
        if item.submesh() >= self.mesh.submesh_count() {
            engine_bail!(
                "atomview::RenderLayer",
                "'{}': item '{}' references submesh {} but '{}' has {}",
                self.name, item.name(), item.submesh(), self.mesh.name(), self.mesh.submesh_count()
            );
        }
        item.check_instance_capacity(&self.bindings)?;
        let index = self.items.len();
        self.item_names.insert(item.name().to_string(), index);
        self.items.push(item);
        Ok(index)
    }

    /// Swap the mesh collection, returning the previous one
    ///
    /// # Errors
    ///
    /// The new collection lacks a submesh one of the items draws.
    pub(crate) fn replace_mesh(&mut self, mesh: Arc<MeshCollection>) -> Result<Arc<MeshCollection>> {
        if let Some(item) = self.items.iter().find(|i| i.submesh() >= mesh.submesh_count()) {
            engine_bail!(
                "atomview::RenderLayer",
                "'{}': replacement mesh '{}' has no submesh {} used by item '{}'",
                self.name, mesh.name(), item.submesh(), item.name()
            );
        }
        Ok(std::mem::replace(&mut self.mesh, mesh))
    }

    /// Run update callbacks of the layer and its active items
    pub(crate) fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        let mut updated = update_bindings(&mut self.bindings, time, frame_index)?;
        for item in self.items.iter_mut().filter(|i| i.is_active()) {
            updated += item.update(time, frame_index)?;
        }
        Ok(updated)
    }

    /// Record the layer: pipeline, PreWork, mesh, items, PostWork
    ///
    /// Returns the number of draws issued.
    pub(crate) fn record(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<u32> {
        cmd.bind_pipeline(&self.pipeline)?;

        let ctx = HookContext { frame_index, owner: &self.name };
        if self.hooks.pre_work(cmd, &ctx)? == HookFlow::Skip {
            return Ok(0);
        }

        self.mesh.bind(cmd)?;
        cmd.set_primitive_topology(self.topology)?;
        if let Some(reference) = self.stencil_reference {
            cmd.set_stencil_reference(reference)?;
        }
        for binding in &self.bindings {
            binding.bind(cmd, frame_index)?;
        }

        let mut draws = 0;
        for item in self.items.iter_mut().filter(|i| i.is_active()) {
            if item.pre_work(cmd, frame_index)? == HookFlow::Skip {
                continue;
            }
            for binding in item.bindings() {
                binding.bind(cmd, frame_index)?;
            }

            let submesh = self.mesh.submesh(item.submesh()).ok_or_else(|| {
                engine_err!(
                    "atomview::RenderLayer",
                    "'{}': submesh {} missing from '{}'",
                    self.name, item.submesh(), self.mesh.name()
                )
            })?;
            if self.mesh.is_indexed() {
                cmd.draw_indexed(
                    submesh.index_count(),
                    item.instance_count(),
                    submesh.first_index(),
                    submesh.base_vertex(),
                    0,
                )?;
            } else {
                cmd.draw(submesh.vertex_count(), item.instance_count(), submesh.base_vertex() as u32, 0)?;
            }
            draws += 1;

            item.post_work(cmd, frame_index)?;
        }

        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.post_work(cmd, &ctx)?;
        Ok(draws)
    }
}

// ============================================================================
// COMPUTE LAYER
// ============================================================================

pub struct ComputeLayer {
    name: String,
    pipeline: Arc<dyn Pipeline>,
    active: bool,
    bindings: Vec<Binding>,
    items: Vec<ComputeItem>,
    item_names: FxHashMap<String, usize>,
    hooks: WorkHooks,
}

impl ComputeLayer {
    /// # Errors
    ///
    /// The pipeline is not a compute pipeline.
    pub fn new(name: &str, pipeline: Arc<dyn Pipeline>) -> Result<Self> {
        if pipeline.bind_point() != BindPoint::Compute {
            engine_bail!(
                "atomview::ComputeLayer",
                "'{}': pipeline '{}' is not a compute pipeline",
                name, pipeline.debug_name()
            );
        }
        Ok(Self {
            name: name.to_string(),
            pipeline,
            active: true,
            bindings: Vec::new(),
            items: Vec::new(),
            item_names: FxHashMap::default(),
            hooks: WorkHooks::default(),
        })
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn with_pre_work<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<HookFlow> + Send + Sync + 'static,
    {
        self.hooks.set_pre_work(hook);
        self
    }

    pub fn with_post_work<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut dyn CommandList, &HookContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.hooks.set_post_work(hook);
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn pipeline(&self) -> &Arc<dyn Pipeline> { &self.pipeline }

    pub fn is_active(&self) -> bool { self.active }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    pub fn items(&self) -> &[ComputeItem] { &self.items }

    pub fn item(&self, index: usize) -> Option<&ComputeItem> { self.items.get(index) }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut ComputeItem> { self.items.get_mut(index) }

    pub fn item_index(&self, name: &str) -> Option<usize> {
        self.item_names.get(name).copied()
    }

    pub fn hooks_mut(&mut self) -> &mut WorkHooks { &mut self.hooks }

    pub(crate) fn add_item(&mut self, item: ComputeItem) -> Result<usize> {
        if self.item_names.contains_key(item.name()) {
            engine_bail!("atomview::ComputeLayer", "'{}': duplicate item '{}'", self.name, item.name());
        }
        let index = self.items.len();
        self.item_names.insert(item.name().to_string(), index);
        self.items.push(item);
        Ok(index)
    }

    pub(crate) fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        let mut updated = update_bindings(&mut self.bindings, time, frame_index)?;
        for item in self.items.iter_mut().filter(|i| i.is_active()) {
            updated += item.update(time, frame_index)?;
        }
        Ok(updated)
    }

    /// Record PreWork, pipeline and `layout`, dispatches, then PostWork
    ///
    /// Returns the number of dispatches issued.
    pub(crate) fn record(
        &mut self,
        cmd: &mut dyn CommandList,
        layout: &Arc<dyn BindingLayout>,
        frame_index: usize,
    ) -> Result<u32> {
        let ctx = HookContext { frame_index, owner: &self.name };
        if self.hooks.pre_work(cmd, &ctx)? == HookFlow::Skip {
            return Ok(0);
        }

        cmd.bind_pipeline(&self.pipeline)?;
        cmd.bind_binding_layout(layout, BindPoint::Compute)?;
        for binding in &self.bindings {
            binding.bind(cmd, frame_index)?;
        }

        let mut dispatches = 0;
        for item in self.items.iter_mut().filter(|i| i.is_active()) {
            if item.pre_work(cmd, frame_index)? == HookFlow::Skip {
                continue;
            }
            for binding in item.bindings() {
                binding.bind(cmd, frame_index)?;
            }
            let [x, y, z] = item.thread_groups();
            cmd.dispatch(x, y, z)?;
            dispatches += 1;
            item.post_work(cmd, frame_index)?;
        }

        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.post_work(cmd, &ctx)?;
        Ok(dispatches)
    }
}

#[cfg(test)]
#[path = "render_layer_tests.rs"]
mod tests;
