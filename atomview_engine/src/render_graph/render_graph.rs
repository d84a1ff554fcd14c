//! Render graph: the ordered passes → layers → items tree.
//!
//! Passes, layers and items are addressed through small `Copy` ids returned
//! when they are added (or found by name). Ids are positional and stay
//! valid for the lifetime of the graph since nothing is ever removed.
//!
//! ```text
//! RenderGraph
//! └── pass "scene"            (binding layout, camera constants)
//!     ├── compute layer "integrate"
//!     │   └── compute item "particles"
//!     ├── layer "particles"   (pipeline, mesh, topology)
//!     │   └── item "spheres"  (submesh, instances, bindings)
//!     ├── layer "selection"   (stencil write)
//!     └── layer "outline"     (stencil test, declared after "selection")
//! ```

use crate::error::{Error, Result};
use super::binding::FrameTime;
use super::render_item::{ComputeItem, RenderItem};
use super::render_layer::{ComputeLayer, RenderLayer};
use super::render_pass::RenderPass;
use crate::engine_bail;

// ============================================================================
// IDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId {
    pass: PassId,
    layer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    layer: LayerId,
    item: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputeLayerId {
    pass: PassId,
    layer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputeItemId {
    layer: ComputeLayerId,
    item: usize,
}

impl PassId {
    pub fn index(&self) -> usize { self.0 }
}

impl LayerId {
    pub fn pass(&self) -> PassId { self.pass }
    pub fn index(&self) -> usize { self.layer }
}

impl ItemId {
    pub fn layer(&self) -> LayerId { self.layer }
    pub fn index(&self) -> usize { self.item }
}

impl ComputeLayerId {
    pub fn pass(&self) -> PassId { self.pass }
    pub fn index(&self) -> usize { self.layer }
}

impl ComputeItemId {
    pub fn layer(&self) -> ComputeLayerId { self.layer }
    pub fn index(&self) -> usize { self.item }
}

fn invalid(what: &str, id: impl std::fmt::Debug) -> Error {
    crate::engine_error!("atomview::RenderGraph", "Unknown {} {:?}", what, id);
    Error::InvalidHandle(format!("{} {:?}", what, id))
}

// ============================================================================
// RENDER GRAPH
// ============================================================================

#[derive(Default)]
pub struct RenderGraph {
    passes: Vec<RenderPass>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== CONSTRUCTION =====

    /// Append a pass; passes execute in the order they are added
    pub fn add_pass(&mut self, pass: RenderPass) -> Result<PassId> {
        if self.find_pass(pass.name()).is_some() {
            engine_bail!("atomview::RenderGraph", "Duplicate pass '{}'", pass.name());
        }
        pass.check_bindings(pass.name(), pass.bindings())?;
        self.passes.push(pass);
        Ok(PassId(self.passes.len() - 1))
    }

    /// Append a layer to `pass`; layers execute in the order they are added
    pub fn add_layer(&mut self, pass: PassId, layer: RenderLayer) -> Result<LayerId> {
        let layer = self.pass_mut(pass)?.add_layer(layer)?;
        Ok(LayerId { pass, layer })
    }

    pub fn add_item(&mut self, layer: LayerId, item: RenderItem) -> Result<ItemId> {
        let pass = self.pass_mut(layer.pass)?;
        pass.check_bindings(item.name(), item.bindings())?;
        let target = pass
            .layer_mut(layer.layer)
            .ok_or_else(|| invalid("layer", layer))?;
        let item = target.add_item(item)?;
        Ok(ItemId { layer, item })
    }

    pub fn add_compute_layer(&mut self, pass: PassId, layer: ComputeLayer) -> Result<ComputeLayerId> {
        let layer = self.pass_mut(pass)?.add_compute_layer(layer)?;
        Ok(ComputeLayerId { pass, layer })
    }

    pub fn add_compute_item(&mut self, layer: ComputeLayerId, item: ComputeItem) -> Result<ComputeItemId> {
        let pass = self.pass_mut(layer.pass)?;
        pass.check_bindings(item.name(), item.bindings())?;
        let target = pass
            .compute_layer_mut(layer.layer)
            .ok_or_else(|| invalid("compute layer", layer))?;
        let item = target.add_item(item)?;
        Ok(ComputeItemId { layer, item })
    }

    // ===== LOOKUP =====

    pub fn find_pass(&self, name: &str) -> Option<PassId> {
        self.passes.iter().position(|p| p.name() == name).map(PassId)
    }

    pub fn find_layer(&self, pass: PassId, name: &str) -> Option<LayerId> {
        let layer = self.passes.get(pass.0)?.layer_index(name)?;
        Some(LayerId { pass, layer })
    }

    pub fn find_item(&self, layer: LayerId, name: &str) -> Option<ItemId> {
        let item = self.passes.get(layer.pass.0)?.layer(layer.layer)?.item_index(name)?;
        Some(ItemId { layer, item })
    }

    pub fn find_compute_layer(&self, pass: PassId, name: &str) -> Option<ComputeLayerId> {
        let layer = self.passes.get(pass.0)?.compute_layer_index(name)?;
        Some(ComputeLayerId { pass, layer })
    }

    pub fn find_compute_item(&self, layer: ComputeLayerId, name: &str) -> Option<ComputeItemId> {
        let item = self.passes.get(layer.pass.0)?.compute_layer(layer.layer)?.item_index(name)?;
        Some(ComputeItemId { layer, item })
    }

    /// Resolve `"pass/layer"` in one call
    pub fn find_layer_path(&self, path: &str) -> Option<LayerId> {
        let (pass, layer) = path.split_once('/')?;
        self.find_layer(self.find_pass(pass)?, layer)
    }

    // ===== ACCESS =====

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass(&self, id: PassId) -> Result<&RenderPass> {
        self.passes.get(id.0).ok_or_else(|| invalid("pass", id))
    }

    pub fn pass_mut(&mut self, id: PassId) -> Result<&mut RenderPass> {
        self.passes.get_mut(id.0).ok_or_else(|| invalid("pass", id))
    }

    pub fn layer(&self, id: LayerId) -> Result<&RenderLayer> {
        self.pass(id.pass)?.layer(id.layer).ok_or_else(|| invalid("layer", id))
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Result<&mut RenderLayer> {
        self.pass_mut(id.pass)?.layer_mut(id.layer).ok_or_else(|| invalid("layer", id))
    }

    pub fn item(&self, id: ItemId) -> Result<&RenderItem> {
        self.layer(id.layer)?.item(id.item).ok_or_else(|| invalid("item", id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut RenderItem> {
        self.layer_mut(id.layer)?.item_mut(id.item).ok_or_else(|| invalid("item", id))
    }

    pub fn compute_layer(&self, id: ComputeLayerId) -> Result<&ComputeLayer> {
        self.pass(id.pass)?.compute_layer(id.layer).ok_or_else(|| invalid("compute layer", id))
    }

    pub fn compute_layer_mut(&mut self, id: ComputeLayerId) -> Result<&mut ComputeLayer> {
        self.pass_mut(id.pass)?
            .compute_layer_mut(id.layer)
            .ok_or_else(|| invalid("compute layer", id))
    }

    pub fn compute_item(&self, id: ComputeItemId) -> Result<&ComputeItem> {
        self.compute_layer(id.layer)?.item(id.item).ok_or_else(|| invalid("compute item", id))
    }

    pub fn compute_item_mut(&mut self, id: ComputeItemId) -> Result<&mut ComputeItem> {
        self.compute_layer_mut(id.layer)?
            .item_mut(id.item)
            .ok_or_else(|| invalid("compute item", id))
    }

    // ===== COARSE MUTATORS =====

    pub fn set_item_active(&mut self, id: ItemId, active: bool) -> Result<()> {
        self.item_mut(id)?.set_active(active);
        Ok(())
    }

    /// # Errors
    ///
    /// Unknown item, or `count` above the item's `max_instances`.
    pub fn set_instance_count(&mut self, id: ItemId, count: u32) -> Result<()> {
        self.item_mut(id)?.set_instance_count(count)
    }

    pub fn set_layer_active(&mut self, id: LayerId, active: bool) -> Result<()> {
        self.layer_mut(id)?.set_active(active);
        Ok(())
    }

    pub fn set_pass_active(&mut self, id: PassId, active: bool) -> Result<()> {
        self.pass_mut(id)?.set_active(active);
        Ok(())
    }

    pub fn set_compute_layer_active(&mut self, id: ComputeLayerId, active: bool) -> Result<()> {
        self.compute_layer_mut(id)?.set_active(active);
        Ok(())
    }

    pub fn set_compute_item_active(&mut self, id: ComputeItemId, active: bool) -> Result<()> {
        self.compute_item_mut(id)?.set_active(active);
        Ok(())
    }

    pub fn set_thread_groups(&mut self, id: ComputeItemId, groups: [u32; 3]) -> Result<()> {
        self.compute_item_mut(id)?.set_thread_groups(groups)
    }

    // ===== FRAME =====

    /// Run every binding update callback against replica `frame_index`
    ///
    /// Returns the number of callbacks invoked.
    pub fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<usize> {
        let mut updated = 0;
        for pass in &mut self.passes {
            updated += pass.update(time, frame_index)?;
        }
        Ok(updated)
    }

    pub(crate) fn passes_mut(&mut self) -> &mut [RenderPass] {
        &mut self.passes
    }
}

#[cfg(test)]
#[path = "render_graph_tests.rs"]
mod tests;
