//! Frame-multiplexed constant buffer.
//!
//! One upload-visible GPU buffer holds `frames_in_flight` replicas of a
//! region sized `align_up(size_of::<T>() * capacity, 256)`. Replica `f` is
//! only ever written while frame slot `f` is being recorded, which the
//! frame synchronizer guarantees is after the GPU retired the previous use
//! of that slot. Writes never cross into another replica.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use bytemuck::Pod;
use crate::error::{Error, Result};
use crate::graphics_device::{self, Buffer, BufferView, BindingKind, GraphicsDevice};
use crate::{engine_bail, engine_err};

/// Offset granularity of a constant region
pub const CONSTANT_REGION_ALIGNMENT: u64 = 256;

/// Round `value` up to a multiple of `alignment` (a power of two)
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Byte size of one replica for `element_size * capacity` bytes of payload
pub const fn region_size(element_size: u64, capacity: u64) -> u64 {
    align_up(element_size * capacity, CONSTANT_REGION_ALIGNMENT)
}

// ============================================================================
// DESCRIPTOR
// ============================================================================

/// Creation parameters of a `ConstantBuffer`
pub struct ConstantBufferDesc {
    /// Debug name
    pub name: String,
    pub device: Arc<Mutex<dyn GraphicsDevice>>,
    /// Maximum number of `T` elements a replica holds
    pub capacity: u32,
    /// Number of replicas (frames in flight)
    pub frames_in_flight: usize,
    /// Slot kind the buffer is bound at
    pub kind: BindingKind,
}

// ============================================================================
// CONSTANT BUFFER
// ============================================================================

/// Typed, frame-replicated upload buffer
pub struct ConstantBuffer<T: Pod> {
    name: String,
    buffer: Arc<dyn Buffer>,
    kind: BindingKind,
    capacity: u32,
    frames_in_flight: usize,
    region_size: u64,
    _marker: PhantomData<fn(T)>,
}

impl<T: Pod> ConstantBuffer<T> {
    /// Allocate the backing buffer for every replica
    pub fn new(desc: ConstantBufferDesc) -> Result<Self> {
        if desc.capacity == 0 {
            engine_bail!("atomview::ConstantBuffer", "'{}': capacity must be at least 1", desc.name);
        }
        if desc.frames_in_flight == 0 {
            engine_bail!("atomview::ConstantBuffer", "'{}': frames_in_flight must be at least 1", desc.name);
        }
        if std::mem::size_of::<T>() == 0 {
            engine_bail!("atomview::ConstantBuffer", "'{}': zero-sized element type", desc.name);
        }

        let region_size = region_size(std::mem::size_of::<T>() as u64, desc.capacity as u64);
        let usage = match desc.kind {
            BindingKind::Constants => graphics_device::BufferUsage::Uniform,
            BindingKind::Storage => graphics_device::BufferUsage::Storage,
        };

        let buffer = desc
            .device
            .lock()
            .map_err(|_| engine_err!("atomview::ConstantBuffer", "GraphicsDevice lock poisoned"))?
            .create_buffer(graphics_device::BufferDesc {
                name: desc.name.clone(),
                size: region_size * desc.frames_in_flight as u64,
                usage,
            })?;

        crate::engine_debug!(
            "atomview::ConstantBuffer",
            "'{}': {} x {} bytes ({} elements of {} bytes)",
            desc.name,
            desc.frames_in_flight,
            region_size,
            desc.capacity,
            std::mem::size_of::<T>()
        );

        Ok(Self {
            name: desc.name,
            buffer,
            kind: desc.kind,
            capacity: desc.capacity,
            frames_in_flight: desc.frames_in_flight,
            region_size,
            _marker: PhantomData,
        })
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str { &self.name }

    pub fn kind(&self) -> BindingKind { self.kind }

    /// Element capacity of one replica
    pub fn capacity(&self) -> u32 { self.capacity }

    pub fn frames_in_flight(&self) -> usize { self.frames_in_flight }

    /// Padded byte size of one replica
    pub fn region_size(&self) -> u64 { self.region_size }

    /// The backing GPU buffer shared by all replicas
    pub fn buffer(&self) -> &Arc<dyn Buffer> { &self.buffer }

    // ===== WRITES =====

    /// Copy `data` into the start of replica `frame_index`
    ///
    /// # Errors
    ///
    /// - `frame_index` is not a valid replica
    /// - `data` holds more elements than the capacity (nothing is written)
    pub fn write(&self, frame_index: usize, data: &[T]) -> Result<()> {
        self.write_at(frame_index, 0, data)
    }

    /// Copy `data` into replica `frame_index` starting at element `first`
    pub fn write_at(&self, frame_index: usize, first: u32, data: &[T]) -> Result<()> {
        self.check_frame(frame_index)?;
        let end = first as usize + data.len();
        if end > self.capacity as usize {
            crate::engine_error!(
                "atomview::ConstantBuffer",
                "'{}': write of elements {}..{} exceeds capacity {}",
                self.name, first, end, self.capacity
            );
            return Err(Error::CapacityExceeded {
                what: format!("constant buffer '{}'", self.name),
                requested: end,
                capacity: self.capacity as usize,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        let offset = self.region_size * frame_index as u64
            + first as u64 * std::mem::size_of::<T>() as u64;
        self.buffer.update(offset, bytemuck::cast_slice(data))
    }

    /// View of replica `frame_index`, for binding
    pub fn address_of(&self, frame_index: usize) -> Result<BufferView> {
        self.check_frame(frame_index)?;
        Ok(BufferView {
            buffer: Arc::clone(&self.buffer),
            offset: self.region_size * frame_index as u64,
            size: self.region_size,
        })
    }

    /// Writer restricted to replica `frame_index`
    pub fn writer(&self, frame_index: usize) -> Result<FrameWriter<'_, T>> {
        self.check_frame(frame_index)?;
        Ok(FrameWriter { target: self, frame_index })
    }

    fn check_frame(&self, frame_index: usize) -> Result<()> {
        if frame_index >= self.frames_in_flight {
            crate::engine_error!(
                "atomview::ConstantBuffer",
                "'{}': frame index {} out of range ({} replicas)",
                self.name, frame_index, self.frames_in_flight
            );
            return Err(Error::InvalidHandle(format!(
                "frame index {} of constant buffer '{}'",
                frame_index, self.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// FRAME WRITER
// ============================================================================

/// Write access to exactly one replica of a `ConstantBuffer`
///
/// Update callbacks receive this instead of the buffer, so they cannot
/// address any frame other than the one being recorded.
pub struct FrameWriter<'a, T: Pod> {
    target: &'a ConstantBuffer<T>,
    frame_index: usize,
}

impl<'a, T: Pod> FrameWriter<'a, T> {
    pub fn frame_index(&self) -> usize { self.frame_index }

    pub fn capacity(&self) -> u32 { self.target.capacity }

    /// Write a contiguous run from element 0
    pub fn write(&mut self, data: &[T]) -> Result<()> {
        self.target.write_at(self.frame_index, 0, data)
    }

    /// Write a contiguous run from element `first`
    pub fn write_at(&mut self, first: u32, data: &[T]) -> Result<()> {
        self.target.write_at(self.frame_index, first, data)
    }

    /// Zero elements `first..end`, so a shorter write leaves no stale data
    /// in the range a draw reads
    pub fn zero_range(&mut self, first: u32, end: u32) -> Result<()> {
        if end <= first {
            return Ok(());
        }
        let zeros = vec![T::zeroed(); (end - first) as usize];
        self.target.write_at(self.frame_index, first, &zeros)
    }

    /// Write a single element at index 0
    pub fn write_one(&mut self, value: &T) -> Result<()> {
        self.target.write_at(self.frame_index, 0, std::slice::from_ref(value))
    }
}

#[cfg(test)]
#[path = "constant_buffer_tests.rs"]
mod tests;
