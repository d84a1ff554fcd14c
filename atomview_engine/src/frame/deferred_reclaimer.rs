//! Deferred reclaimer.
//!
//! Resources that in-flight GPU work may still reference are parked here
//! with the fence value of the next submission. `sweep` drops every record
//! whose fence value the device has completed. Records are never dropped
//! early; if `sweep` is never called the queue only grows.

use std::sync::Arc;
use crate::graphics_device::{BindingLayout, Buffer, FenceValue, Pipeline};
use crate::resource::MeshCollection;

/// A resource waiting for the GPU to retire `fence_value`
pub struct DeletionRecord<R> {
    pub fence_value: FenceValue,
    pub resource: R,
}

/// Fence-gated destruction queue
pub struct DeferredReclaimer<R> {
    records: Vec<DeletionRecord<R>>,
    soft_limit: Option<usize>,
    over_limit: bool,
    total_reclaimed: u64,
}

impl<R> DeferredReclaimer<R> {
    pub fn new() -> Self {
        Self::with_soft_limit(None)
    }

    /// Queue that logs a warning each time it grows past `soft_limit` records
    pub fn with_soft_limit(soft_limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            soft_limit,
            over_limit: false,
            total_reclaimed: 0,
        }
    }

    /// Park `resource` until the device completes `fence_value`
    ///
    /// Pass the frame synchronizer's `next_fence_value()`: the resource may
    /// be referenced by anything recorded up to that submission.
    pub fn enqueue(&mut self, resource: R, fence_value: FenceValue) {
        self.records.push(DeletionRecord { fence_value, resource });

        if let Some(limit) = self.soft_limit {
            if self.records.len() > limit && !self.over_limit {
                self.over_limit = true;
                crate::engine_warn!(
                    "atomview::DeferredReclaimer",
                    "{} resources pending deletion (soft limit {}), is sweep being called?",
                    self.records.len(), limit
                );
            }
        }
    }

    /// Drop every record whose fence value is at most `completed`
    ///
    /// Returns the number of resources freed.
    pub fn sweep(&mut self, completed: FenceValue) -> usize {
        let before = self.records.len();
        self.records.retain(|record| record.fence_value > completed);
        let freed = before - self.records.len();

        if freed > 0 {
            self.total_reclaimed += freed as u64;
            crate::engine_debug!(
                "atomview::DeferredReclaimer",
                "Reclaimed {} resources at fence {}, {} pending",
                freed, completed, self.records.len()
            );
        }
        if let Some(limit) = self.soft_limit {
            if self.records.len() <= limit {
                self.over_limit = false;
            }
        }
        freed
    }

    /// Drop everything regardless of fence values
    ///
    /// Only valid once the device is idle.
    pub fn drain(&mut self) -> usize {
        let freed = self.records.len();
        self.records.clear();
        self.total_reclaimed += freed as u64;
        self.over_limit = false;
        freed
    }

    pub fn pending(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fence values of the pending records, in enqueue order
    pub fn pending_fence_values(&self) -> Vec<FenceValue> {
        self.records.iter().map(|r| r.fence_value).collect()
    }

    pub fn total_reclaimed(&self) -> u64 {
        self.total_reclaimed
    }

    pub fn soft_limit(&self) -> Option<usize> {
        self.soft_limit
    }
}

impl<R> Default for DeferredReclaimer<R> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// RETIRED RESOURCES
// ============================================================================

/// GPU objects the renderer retires through the reclaimer
pub enum RetiredResource {
    Buffer(Arc<dyn Buffer>),
    Pipeline(Arc<dyn Pipeline>),
    BindingLayout(Arc<dyn BindingLayout>),
    Mesh(Arc<MeshCollection>),
}

impl RetiredResource {
    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            RetiredResource::Buffer(buffer) => format!("buffer ({} bytes)", buffer.size()),
            RetiredResource::Pipeline(pipeline) => format!("pipeline '{}'", pipeline.debug_name()),
            RetiredResource::BindingLayout(layout) => format!("binding layout ({} slots)", layout.slots().len()),
            RetiredResource::Mesh(mesh) => format!("mesh collection '{}'", mesh.name()),
        }
    }
}

impl From<Arc<dyn Buffer>> for RetiredResource {
    fn from(buffer: Arc<dyn Buffer>) -> Self {
        RetiredResource::Buffer(buffer)
    }
}

impl From<Arc<dyn Pipeline>> for RetiredResource {
    fn from(pipeline: Arc<dyn Pipeline>) -> Self {
        RetiredResource::Pipeline(pipeline)
    }
}

impl From<Arc<dyn BindingLayout>> for RetiredResource {
    fn from(layout: Arc<dyn BindingLayout>) -> Self {
        RetiredResource::BindingLayout(layout)
    }
}

impl From<Arc<MeshCollection>> for RetiredResource {
    fn from(mesh: Arc<MeshCollection>) -> Self {
        RetiredResource::Mesh(mesh)
    }
}

#[cfg(test)]
#[path = "deferred_reclaimer_tests.rs"]
mod tests;
