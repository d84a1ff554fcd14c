//! Frame synchronizer.
//!
//! Owns the circular frame index, one command list per frame slot, and the
//! fence value each slot was last submitted with. A slot is only reused
//! once the device's completed fence value has reached the value recorded
//! for it, so at most `frames_in_flight` frames are ever queued on the GPU.
//!
//! ```text
//! Idle(i) --begin_frame--> Recording(i) --end_frame--> Submitted(i, v)
//!    ^  ^                        |                          |
//!    |  +-----abandon_frame------+                          |
//!    +--------------- completed fence >= v -----------------+
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use crate::config::MAX_FRAMES_IN_FLIGHT;
use crate::error::Result;
use crate::graphics_device::{CommandList, FenceValue, GraphicsDevice, Swapchain};
use crate::{engine_bail, engine_err};

/// Lifecycle of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Free to record into
    Idle,
    /// Commands are being recorded on the CPU
    Recording,
    /// Submitted and not yet retired by the GPU
    Submitted(FenceValue),
}

struct FrameSlot {
    command_list: Box<dyn CommandList>,
    /// Value signaled by the slot's last submission, 0 if never submitted
    fence_value: FenceValue,
}

/// Circular frame index plus per-slot fences
pub struct FrameSynchronizer {
    /// Dropped before `device`
    slots: Vec<FrameSlot>,
    device: Arc<Mutex<dyn GraphicsDevice>>,
    frame_index: usize,
    next_fence_value: FenceValue,
    recording: bool,
    frames_submitted: u64,
    fence_waits: u64,
}

impl FrameSynchronizer {
    /// Create `frames_in_flight` slots, each with its own command list
    pub fn new(device: Arc<Mutex<dyn GraphicsDevice>>, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 || frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            engine_bail!(
                "atomview::FrameSynchronizer",
                "frames_in_flight must be in 1..={}, got {}",
                MAX_FRAMES_IN_FLIGHT, frames_in_flight
            );
        }

        // Fence values keep increasing across synchronizers sharing a device
        let (slots, resume_after) = {
            let device = lock_device(&device)?;
            device.wait_idle()?;
            let resume_after = device.completed_fence_value()?;
            let slots = (0..frames_in_flight)
                .map(|_| {
                    Ok(FrameSlot {
                        command_list: device.create_command_list()?,
                        fence_value: 0,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            (slots, resume_after)
        };

        crate::engine_info!(
            "atomview::FrameSynchronizer",
            "Created with {} frames in flight",
            frames_in_flight
        );

        Ok(Self {
            device,
            slots,
            frame_index: 0,
            next_fence_value: resume_after + 1,
            recording: false,
            frames_submitted: 0,
            fence_waits: 0,
        })
    }

    // ===== ACCESSORS =====

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next (or current) frame records into
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Value the next submission will signal
    ///
    /// Anything referenced by work recorded from now on is safe to free
    /// once the device has completed this value.
    pub fn next_fence_value(&self) -> FenceValue {
        self.next_fence_value
    }

    /// Value signaled by the most recent submission, 0 before the first one
    pub fn last_signaled_fence_value(&self) -> FenceValue {
        self.next_fence_value - 1
    }

    /// Fence value recorded for `slot`, 0 if it was never submitted
    pub fn slot_fence_value(&self, slot: usize) -> Option<FenceValue> {
        self.slots.get(slot).map(|s| s.fence_value)
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Number of `begin_frame` calls that had to block on the fence
    pub fn fence_waits(&self) -> u64 {
        self.fence_waits
    }

    pub fn device(&self) -> &Arc<Mutex<dyn GraphicsDevice>> {
        &self.device
    }

    /// Completed fence value as reported by the device
    pub fn completed_fence_value(&self) -> Result<FenceValue> {
        lock_device(&self.device)?.completed_fence_value()
    }

    /// Current state of `slot`, querying the device for retirement
    pub fn slot_state(&self, slot: usize) -> Result<SlotState> {
        let Some(entry) = self.slots.get(slot) else {
            engine_bail!("atomview::FrameSynchronizer", "slot {} out of range", slot);
        };
        if self.recording && slot == self.frame_index {
            return Ok(SlotState::Recording);
        }
        if entry.fence_value == 0 || self.completed_fence_value()? >= entry.fence_value {
            Ok(SlotState::Idle)
        } else {
            Ok(SlotState::Submitted(entry.fence_value))
        }
    }

    // ===== FRAME PROTOCOL =====

    /// Make the current slot recordable
    ///
    /// Blocks until the GPU has retired the slot's previous submission, then
    /// resets and begins the slot's command list. Returns the frame index.
    pub fn begin_frame(&mut self) -> Result<usize> {
        if self.recording {
            engine_bail!(
                "atomview::FrameSynchronizer",
                "begin_frame called while frame {} is still recording",
                self.frame_index
            );
        }

        let index = self.frame_index;
        let required = self.slots[index].fence_value;
        if required != 0 {
            let device = lock_device(&self.device)?;
            let completed = device.completed_fence_value()?;
            if completed < required {
                crate::engine_debug!(
                    "atomview::FrameSynchronizer",
                    "Slot {} still in flight (completed {}, needs {}), waiting",
                    index, completed, required
                );
                device.wait_for_fence(required)?;
                self.fence_waits += 1;
            }
        }

        let command_list = &mut self.slots[index].command_list;
        command_list.reset()?;
        command_list.begin()?;
        self.recording = true;

        crate::engine_trace!("atomview::FrameSynchronizer", "Recording frame slot {}", index);
        Ok(index)
    }

    /// Command list of the slot being recorded
    pub fn command_list(&mut self) -> Result<&mut dyn CommandList> {
        if !self.recording {
            engine_bail!("atomview::FrameSynchronizer", "No frame is being recorded");
        }
        Ok(self.slots[self.frame_index].command_list.as_mut())
    }

    /// End recording, submit, and advance to the next slot
    ///
    /// Returns the fence value the submission signals.
    pub fn end_frame(&mut self) -> Result<FenceValue> {
        self.finish(None)
    }

    /// Like `end_frame`, synchronizing with an acquired swapchain image
    pub fn end_frame_with_swapchain(&mut self, swapchain: &dyn Swapchain, image_index: u32) -> Result<FenceValue> {
        self.finish(Some((swapchain, image_index)))
    }

    fn finish(&mut self, target: Option<(&dyn Swapchain, u32)>) -> Result<FenceValue> {
        if !self.recording {
            engine_bail!("atomview::FrameSynchronizer", "end_frame called without begin_frame");
        }

        let index = self.frame_index;
        let signal = self.next_fence_value;
        let slot = &mut self.slots[index];
        slot.command_list.end()?;
        {
            let device = lock_device(&self.device)?;
            match target {
                Some((swapchain, image_index)) => {
                    device.submit_with_swapchain(slot.command_list.as_ref(), swapchain, image_index, signal)?
                }
                None => device.submit(slot.command_list.as_ref(), signal)?,
            }
        }

        slot.fence_value = signal;
        self.next_fence_value += 1;
        self.frame_index = (index + 1) % self.slots.len();
        self.recording = false;
        self.frames_submitted += 1;

        crate::engine_trace!(
            "atomview::FrameSynchronizer",
            "Submitted frame slot {} with fence value {}",
            index, signal
        );
        Ok(signal)
    }

    /// Drop the frame being recorded without submitting it
    ///
    /// The slot keeps its previous fence value and is recorded again by the
    /// next `begin_frame`. Returns whether a frame was abandoned.
    pub fn abandon_frame(&mut self) -> Result<bool> {
        if !self.recording {
            return Ok(false);
        }
        self.recording = false;
        crate::engine_warn!(
            "atomview::FrameSynchronizer",
            "Abandoning frame slot {} without submitting it",
            self.frame_index
        );
        self.slots[self.frame_index].command_list.reset()?;
        Ok(true)
    }

    /// Block until every submitted frame has retired
    pub fn wait_idle(&self) -> Result<()> {
        let last = self.last_signaled_fence_value();
        if last == 0 {
            return Ok(());
        }
        lock_device(&self.device)?.wait_for_fence(last)
    }
}

pub(crate) fn lock_device(
    device: &Arc<Mutex<dyn GraphicsDevice>>,
) -> Result<MutexGuard<'_, dyn GraphicsDevice + 'static>> {
    device
        .lock()
        .map_err(|_| engine_err!("atomview::FrameSynchronizer", "GraphicsDevice lock poisoned"))
}

#[cfg(test)]
#[path = "frame_synchronizer_tests.rs"]
mod tests;
