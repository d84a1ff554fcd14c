//! Render and compute items, the leaves of the render graph

use crate::error::{Error, Result};
use crate::graphics_device::{BindingKind, CommandList};
use super::binding::{Binding, FrameTime};
use super::hooks::{HookContext, HookFlow, WorkHooks};

// ============================================================================
// RENDER ITEM
// ============================================================================

/// One draw: a submesh of the layer's mesh collection, instanced
pub struct RenderItem {
    name: String,
    submesh: usize,
    instance_count: u32,
    max_instances: u32,
    active: bool,
    bindings: Vec<Binding>,
    hooks: WorkHooks,
}

impl RenderItem {
    /// Item drawing `submesh` with up to `max_instances` instances
    ///
    /// Starts active with one instance (none if `max_instances` is 0).
    /// `max_instances` may not exceed the element capacity of any
    /// per-instance (storage) binding; the graph checks this when the
    /// item is added.
    pub fn new(name: &str, submesh: usize, max_instances: u32) -> Self {
        Self {
            name: name.to_string(),
            submesh,
            instance_count: max_instances.min(1),
            max_instances,
            active: true,
            bindings: Vec::new(),
            hooks: WorkHooks::default(),
        }
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

    /// Submesh index inside the layer's mesh collection
    pub fn submesh(&self) -> usize { self.submesh }

    pub fn instance_count(&self) -> u32 { self.instance_count }

    pub fn max_instances(&self) -> u32 { self.max_instances }

    pub fn is_active(&self) -> bool { self.active }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Change the number of instances drawn
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` if `count` is above `max_instances`; the previous
    /// count is kept.
    pub fn set_instance_count(&mut self, count: u32) -> Result<()> {
        if count > self.max_instances {
            crate::engine_error!(
                "atomview::RenderItem",
                "'{}': instance count {} exceeds capacity {}",
                self.name, count, self.max_instances
            );
            return Err(Error::CapacityExceeded {
                what: format!("instances of render item '{}'", self.name),
                requested: count as usize,
                capacity: self.max_instances as usize,
            });
        }
        self.instance_count = count;
        Ok(())
    }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    pub fn hooks_mut(&mut self) -> &mut WorkHooks { &mut self.hooks }

    /// Every storage binding the draw reads per instance must hold `max_instances` elements
    ///
    /// `shared` are the bindings of the enclosing layer. Storage views
    /// without a known capacity are not checked.
    pub(crate) fn check_instance_capacity(&self, shared: &[Binding]) -> Result<()> {
        let storage = self
            .bindings
            .iter()
            .chain(shared)
            .filter(|b| b.kind() == BindingKind::Storage);
        for binding in storage {
            if let Some(capacity) = binding.capacity().filter(|c| self.max_instances > *c) {
                crate::engine_error!(
                    "atomview::RenderItem",
                    "'{}': max instances {} exceed the {} elements of binding '{}'",
                    self.name, self.max_instances, capacity, binding.name()
                );
                return Err(Error::CapacityExceeded {
                    what: format!("max instances of render item '{}' (binding '{}')", self.name, binding.name()),
                    requested: self.max_instances as usize,
                    capacity: capacity as usize,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        update_bindings(&mut self.bindings, time, frame_index)
    }

    pub(crate) fn pre_work(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<HookFlow> {
        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.pre_work(cmd, &ctx)
    }

    pub(crate) fn post_work(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()> {
        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.post_work(cmd, &ctx)
    }
}

// ============================================================================
// COMPUTE ITEM
// ============================================================================

/// One dispatch with a thread-group extent
pub struct ComputeItem {
    name: String,
    thread_groups: [u32; 3],
    max_thread_groups: [u32; 3],
    active: bool,
    bindings: Vec<Binding>,
    hooks: WorkHooks,
}

impl ComputeItem {
    /// Item dispatching `max_thread_groups` groups until told otherwise
    pub fn new(name: &str, max_thread_groups: [u32; 3]) -> Self {
        Self {
            name: name.to_string(),
            thread_groups: max_thread_groups,
            max_thread_groups,
            active: true,
            bindings: Vec::new(),
            hooks: WorkHooks::default(),
        }
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

    pub fn name(&self) -> &str { &self.name }

    pub fn thread_groups(&self) -> [u32; 3] { self.thread_groups }

    pub fn max_thread_groups(&self) -> [u32; 3] { self.max_thread_groups }

    pub fn is_active(&self) -> bool { self.active }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Change the dispatched extent; every axis must stay within its maximum
    pub fn set_thread_groups(&mut self, groups: [u32; 3]) -> Result<()> {
        if let Some(axis) = (0..3).find(|&a| groups[a] > self.max_thread_groups[a]) {
            crate::engine_error!(
                "atomview::ComputeItem",
                "'{}': thread groups {:?} exceed maximum {:?}",
                self.name, groups, self.max_thread_groups
            );
            return Err(Error::CapacityExceeded {
                what: format!("thread groups (axis {}) of compute item '{}'", axis, self.name),
                requested: groups[axis] as usize,
                capacity: self.max_thread_groups[axis] as usize,
            });
        }
        self.thread_groups = groups;
        Ok(())
    }

    pub fn bindings(&self) -> &[Binding] { &self.bindings }

    pub fn hooks_mut(&mut self) -> &mut WorkHooks { &mut self.hooks }

    pub(crate) fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        update_bindings(&mut self.bindings, time, frame_index)
    }

    pub(crate) fn pre_work(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<HookFlow> {
        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.pre_work(cmd, &ctx)
    }

    pub(crate) fn post_work(&mut self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()> {
        let ctx = HookContext { frame_index, owner: &self.name };
        self.hooks.post_work(cmd, &ctx)
    }
}

/// Run every update callback in `bindings`, returning how many ran
pub(crate) fn update_bindings(bindings: &mut [Binding], time: &FrameTime, frame_index: usize) -> Result<usize> {
    let mut updated = 0;
    for binding in bindings.iter_mut().filter(|b| b.has_update()) {
        binding.update(time, frame_index)?;
        updated += 1;
    }
    Ok(updated)
}

#[cfg(test)]
#[path = "render_item_tests.rs"]
mod tests;
