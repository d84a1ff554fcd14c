//! Unit tests for MockGraphicsDevice
//!
//! The rest of the crate's tests lean on this mock, so its fence and
//! recording semantics are pinned down here.

use super::*;

// ============================================================================
// BUFFER TESTS
// ============================================================================

#[test]
fn test_create_buffer_keeps_bytes() {
    let mut device = MockGraphicsDevice::new();
    let buffer = device
        .create_buffer(BufferDesc { name: "cb".to_string(), size: 16, usage: BufferUsage::Uniform })
        .unwrap();

    buffer.update(4, &[1, 2, 3]).unwrap();

    assert_eq!(buffer.size(), 16);
    assert_eq!(buffer.usage(), BufferUsage::Uniform);
    assert_eq!(&device.buffers[0].bytes()[..8], &[0, 0, 0, 0, 1, 2, 3, 0]);
}

#[test]
fn test_buffer_update_out_of_bounds_fails() {
    let buffer = MockBuffer::new("small".to_string(), 4, BufferUsage::Storage);
    assert!(buffer.update(2, &[0; 4]).is_err());
    assert_eq!(buffer.bytes(), vec![0; 4]);
}

#[test]
fn test_zero_size_buffer_rejected() {
    let mut device = MockGraphicsDevice::new();
    let result = device.create_buffer(BufferDesc { name: "empty".to_string(), size: 0, usage: BufferUsage::Vertex });
    assert!(result.is_err());
}

// ============================================================================
// COMMAND LIST TESTS
// ============================================================================

#[test]
fn test_command_list_records_in_order() {
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    cmd.set_stencil_reference(1).unwrap();
    cmd.draw_indexed(36, 2, 6, -4, 0).unwrap();
    cmd.dispatch(8, 1, 1).unwrap();
    cmd.end().unwrap();

    assert_eq!(
        cmd.commands,
        vec!["begin", "set_stencil_reference(1)", "draw_indexed(36,2,6,-4,0)", "dispatch(8,1,1)", "end"]
    );
}

#[test]
fn test_command_list_rejects_recording_outside_begin() {
    let mut cmd = MockCommandList::new();
    assert!(cmd.draw(3, 1, 0, 0).is_err());
    assert!(cmd.commands.is_empty());
}

#[test]
fn test_command_list_reset_clears_commands() {
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    cmd.end().unwrap();
    cmd.reset().unwrap();

    assert!(cmd.commands.is_empty());
    assert_eq!(cmd.reset_count, 1);
}

#[test]
fn test_filtered_keeps_matching_prefixes() {
    let mut cmd = MockCommandList::new();
    cmd.begin().unwrap();
    cmd.set_primitive_topology(PrimitiveTopology::LineList).unwrap();
    cmd.draw(24, 1, 0, 0).unwrap();
    cmd.end().unwrap();

    assert_eq!(cmd.filtered(&["draw"]), vec!["draw(24,1,0,0)"]);
}

// ============================================================================
// FENCE TESTS
// ============================================================================

fn submit_empty(device: &MockGraphicsDevice, value: FenceValue) -> Result<()> {
    let mut cmd = MockCommandList::new();
    cmd.begin()?;
    cmd.end()?;
    device.submit(&cmd, value)
}

#[test]
fn test_submissions_do_not_complete_by_default() {
    let device = MockGraphicsDevice::new();
    submit_empty(&device, 1).unwrap();
    submit_empty(&device, 2).unwrap();

    assert_eq!(device.completed_fence_value().unwrap(), 0);
    assert_eq!(device.submitted(), vec![1, 2]);
    assert_eq!(device.submitted_commands()[0], vec!["begin", "end"]);
}

#[test]
fn test_auto_complete_retires_immediately() {
    let device = MockGraphicsDevice::with_auto_complete();
    submit_empty(&device, 5).unwrap();
    assert_eq!(device.completed_fence_value().unwrap(), 5);
}

#[test]
fn test_wait_for_fence_records_and_catches_up() {
    let device = MockGraphicsDevice::new();
    submit_empty(&device, 1).unwrap();

    device.wait_for_fence(1).unwrap();

    assert_eq!(device.waits(), vec![1]);
    assert_eq!(device.completed_fence_value().unwrap(), 1);
}

#[test]
fn test_completed_value_never_decreases() {
    let device = MockGraphicsDevice::new();
    device.set_completed_fence_value(7);
    device.set_completed_fence_value(3);
    assert_eq!(device.completed_fence_value().unwrap(), 7);
}

#[test]
fn test_non_monotonic_signal_rejected() {
    let device = MockGraphicsDevice::new();
    submit_empty(&device, 2).unwrap();
    assert!(submit_empty(&device, 2).is_err());
}

#[test]
fn test_fail_next_submit_fails_once() {
    let device = MockGraphicsDevice::new();
    device.fail_next_submit();
    assert!(submit_empty(&device, 1).is_err());
    assert!(submit_empty(&device, 1).is_ok());
}

#[test]
fn test_wait_idle_completes_everything() {
    let device = MockGraphicsDevice::new();
    submit_empty(&device, 1).unwrap();
    submit_empty(&device, 2).unwrap();
    device.wait_idle().unwrap();
    assert_eq!(device.completed_fence_value().unwrap(), 2);
}

// ============================================================================
// SWAPCHAIN TESTS
// ============================================================================

#[test]
fn test_swapchain_cycles_images() {
    let mut swapchain = MockSwapchain::new(640, 480);
    let images: Vec<u32> = (0..4).map(|_| swapchain.acquire_next_image().unwrap()).collect();
    assert_eq!(images, vec![0, 1, 2, 0]);

    swapchain.present(2).unwrap();
    assert_eq!(swapchain.presented, vec![2]);
}
