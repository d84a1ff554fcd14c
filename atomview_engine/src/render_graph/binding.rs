//! Bindings: GPU-visible state attached to a numbered slot.
//!
//! A constant binding references a frame-replicated `ConstantBuffer` and may
//! carry an update callback. The callback receives a `FrameWriter` scoped to
//! the frame being recorded, so it can only touch that frame's replica. A
//! storage binding references a fixed buffer range that is bound as-is
//! every frame.

use std::sync::Arc;
use bytemuck::Pod;
use crate::error::Result;
use crate::graphics_device::{BindingKind, BufferView, CommandList};
use crate::resource::{ConstantBuffer, FrameWriter};

/// Time passed to update callbacks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since the renderer started
    pub total_seconds: f64,
    /// Seconds since the previous frame
    pub delta_seconds: f32,
}

/// Update callback of a constant binding
///
/// Captured collaborator state must outlive the binding.
pub type UpdateFn<T> = Box<dyn FnMut(&mut FrameWriter<'_, T>, &FrameTime) -> Result<()> + Send + Sync>;

trait BindingSource: Send + Sync {
    fn kind(&self) -> BindingKind;
    fn has_update(&self) -> bool;
    fn capacity(&self) -> Option<u32>;
    fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<()>;
    fn view(&self, frame_index: usize) -> Result<BufferView>;
}

struct ConstantSource<T: Pod> {
    buffer: Arc<ConstantBuffer<T>>,
    update: Option<UpdateFn<T>>,
}

impl<T: Pod + Send + Sync> BindingSource for ConstantSource<T> {
    fn kind(&self) -> BindingKind {
        self.buffer.kind()
    }

    fn has_update(&self) -> bool {
        self.update.is_some()
    }

    fn capacity(&self) -> Option<u32> {
        Some(self.buffer.capacity())
    }

    fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<()> {
        match self.update.as_mut() {
            Some(update) => {
                let mut writer = self.buffer.writer(frame_index)?;
                update(&mut writer, time)
            }
            None => Ok(()),
        }
    }

    fn view(&self, frame_index: usize) -> Result<BufferView> {
        self.buffer.address_of(frame_index)
    }
}

struct StorageSource {
    view: BufferView,
}

impl BindingSource for StorageSource {
    fn kind(&self) -> BindingKind {
        BindingKind::Storage
    }

    fn has_update(&self) -> bool {
        false
    }

    fn capacity(&self) -> Option<u32> {
        None
    }

    fn update(&mut self, _time: &FrameTime, _frame_index: usize) -> Result<()> {
        Ok(())
    }

    fn view(&self, _frame_index: usize) -> Result<BufferView> {
        Ok(self.view.clone())
    }
}

/// Named attachment of a buffer region to a binding slot
pub struct Binding {
    name: String,
    slot: u32,
    source: Box<dyn BindingSource>,
}

impl Binding {
    /// Constant binding without an update callback
    pub fn constants<T: Pod + Send + Sync>(name: &str, slot: u32, buffer: Arc<ConstantBuffer<T>>) -> Self {
        Self {
            name: name.to_string(),
            slot,
            source: Box::new(ConstantSource { buffer, update: None }),
        }
    }

    /// Constant binding refreshed once per frame by `update`
    pub fn constants_with_update<T, F>(name: &str, slot: u32, buffer: Arc<ConstantBuffer<T>>, update: F) -> Self
    where
        T: Pod + Send + Sync,
        F: FnMut(&mut FrameWriter<'_, T>, &FrameTime) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            slot,
            source: Box::new(ConstantSource { buffer, update: Some(Box::new(update)) }),
        }
    }

    /// Storage binding of a fixed buffer range, identical in every frame
    pub fn storage(name: &str, slot: u32, view: BufferView) -> Self {
        Self {
            name: name.to_string(),
            slot,
            source: Box::new(StorageSource { view }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn kind(&self) -> BindingKind {
        self.source.kind()
    }

    pub fn has_update(&self) -> bool {
        self.source.has_update()
    }

    /// Element capacity of the referenced constant buffer
    pub fn capacity(&self) -> Option<u32> {
        self.source.capacity()
    }

    /// Run the update callback against replica `frame_index`
    pub fn update(&mut self, time: &FrameTime, frame_index: usize) -> Result<()> {
        self.source.update(time, frame_index)
    }

    /// Region bound for `frame_index`
    pub fn view(&self, frame_index: usize) -> Result<BufferView> {
        self.source.view(frame_index)
    }

    /// Bind the region for `frame_index` at this binding's slot
    pub fn bind(&self, cmd: &mut dyn CommandList, frame_index: usize) -> Result<()> {
        let view = self.source.view(frame_index)?;
        match self.source.kind() {
            BindingKind::Constants => cmd.bind_constants(self.slot, &view),
            BindingKind::Storage => cmd.bind_storage(self.slot, &view),
        }
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
