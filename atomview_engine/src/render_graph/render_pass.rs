//! Render pass: layers and compute layers sharing one binding-slot layout.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::error::Result;
use crate::graphics_device::{BindPoint, BindingLayout, CommandList};
use crate::engine_bail;
use super::binding::{Binding, FrameTime};
use super::hooks::{HookContext, HookFlow, WorkHooks};
use super::render_item::update_bindings;
use super::render_layer::{ComputeLayer, RenderLayer};

pub struct RenderPass {
    name: String,
    binding_layout: Arc<dyn BindingLayout>,
    active: bool,
    bindings: Vec<Binding>,
    layers: Vec<RenderLayer>,
    layer_names: FxHashMap<String, usize>,
    compute_layers: Vec<ComputeLayer>,
    compute_layer_names: FxHashMap<String, usize>,
    hooks: WorkHooks,
}

impl RenderPass {
    pub fn new(name: &str, binding_layout: Arc<dyn BindingLayout>) -> Self {
        Self {
            name: name.to_string(),
            binding_layout,
            active: true,
            bindings: Vec::new(),
            layers: Vec::new(),
            layer_names: FxHashMap::default(),
            compute_layers: Vec::new(),
            compute_layer_names: FxHashMap::default(),
            hooks: WorkHooks::default(),
        }
    }

    /// Pass-wide binding (camera, time, ...)
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

    pub fn binding_layout(&self) -> &Arc<dyn BindingLayout> { &self.binding_layout }

    pub fn is_active(&self) -> bool { self.active }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    pub fn layers(&self) -> &[RenderLayer] { &self.layers }

    pub fn layer(&self, index: usize) -> Option<&RenderLayer> { self.layers.get(index) }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut RenderLayer> { self.layers.get_mut(index) }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layer_names.get(name).copied()
    }

    pub fn compute_layers(&self) -> &[ComputeLayer] { &self.compute_layers }

    pub fn compute_layer(&self, index: usize) -> Option<&ComputeLayer> { self.compute_layers.get(index) }

    pub fn compute_layer_mut(&mut self, index: usize) -> Option<&mut ComputeLayer> {
        self.compute_layers.get_mut(index)
    }

    pub fn compute_layer_index(&self, name: &str) -> Option<usize> {
        self.compute_layer_names.get(name).copied()
    }

    pub fn hooks_mut(&mut self) -> &mut WorkHooks { &mut self.hooks }

    // ===== VALIDATION =====

    /// Every binding must target a slot of this pass's layout with the same kind
    pub(crate) fn check_bindings(&self, owner: &str, bindings: &[Binding]) -> Result<()> {
        for binding in bindings {
            match self.binding_layout.slot(binding.slot()) {
                None => engine_bail!(
                    "atomview::RenderPass",
                    "'{}': binding '{}' of '{}' targets slot {} which the layout does not declare",
                    self.name, binding.name(), owner, binding.slot()
                ),
                Some(slot) if slot.kind != binding.kind() => engine_bail!(
                    "atomview::RenderPass",
                    "'{}': binding '{}' of '{}' is {:?} but slot {} is {:?}",
                    self.name, binding.name(), owner, binding.kind(), binding.slot(), slot.kind
                ),
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub(crate) fn add_layer(&mut self, layer: RenderLayer) -> Result<usize> {
        if self.layer_names.contains_key(layer.name()) {
            engine_bail!("atomview::RenderPass", "'{}': duplicate layer '{}'", self.name, layer.name());
        }
        self.check_bindings(layer.name(), layer.bindings())?;
        for item in layer.items() {
            self.check_bindings(item.name(), item.bindings())?;
            item.check_instance_capacity(layer.bindings())?;
        }
        let index = self.layers.len();
        self.layer_names.insert(layer.name().to_string(), index);
        self.layers.push(layer);
        Ok(index)
    }

    pub(crate) fn add_compute_layer(&mut self, layer: ComputeLayer) -> Result<usize> {
        if self.compute_layer_names.contains_key(layer.name()) {
            engine_bail!("atomview::RenderPass", "'{}': duplicate compute layer '{}'", self.name, layer.name());
        }
        self.check_bindings(layer.name(), layer.bindings())?;
        let index = self.compute_layers.len();
        self.compute_layer_names.insert(layer.name().to_string(), index);
        self.compute_layers.push(layer);
        Ok(index)
    }

    // ===== FRAME =====

    /// Run every update callback under this pass
    ///
    /// Inactive passes and layers are still updated so their state is
    /// current when they are re-enabled. Inactive items are not.
    pub(crate) fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        let mut updated = update_bindings(&mut self.bindings, time, frame_index)?;
        for layer in &mut self.compute_layers {
            updated += layer.update(time, frame_index)?;
        }
        for layer in &mut self.layers {
            updated += layer.update(time, frame_index)?;
        }
        Ok(updated)
    }

    /// Record the active compute layers, returning the dispatch count
    pub(crate) fn record_compute(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<u32> {
        let mut dispatches = 0;
        for layer in self.compute_layers.iter_mut().filter(|l| l.is_active()) {
            dispatches += layer.record(cmd, &self.binding_layout, frame_index)?;
        }
        Ok(dispatches)
    }

    /// Record PreWork, layout and pass bindings, active layers, PostWork
    ///
    /// Returns the draw count.
    pub(crate) fn record_graphics(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<u32> {
        let ctx = HookContext { frame_index, owner: &self.name };
        if self.hooks.pre_work(cmd, &ctx)? == HookFlow::Skip {
            return Ok(0);
        }

        cmd.bind_binding_layout(&self.binding_layout, BindPoint::Graphics)?;
        for binding in &self.bindings {
            binding.bind(cmd, frame_index)?;
        }

        let mut draws = 0;
        for layer in self.layers.iter_mut().filter(|l| l.is_active()) {
            draws += layer.record(cmd, frame_index)?;
        }

        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.post_work(cmd, &ctx)?;
        Ok(draws)
    }
}
