//! Integration tests for the Vulkan graphics device
//!
//! All tests require a GPU and a display and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_graphics_device_tests -- --ignored

mod gpu_test_utils;

use std::sync::{Arc, Mutex};

use atomview_engine::atomview::config::RendererConfig;
use atomview_engine::atomview::device::{
    BindingKind, BindingLayoutDesc, BufferDesc, BufferUsage, FenceValue, GraphicsDevice, PresentResult,
    ShaderDesc, ShaderStage, ShaderStageFlags, Swapchain,
};
use atomview_engine::atomview::graph::FrameTime;
use atomview_engine::atomview::{Engine, Renderer};
use gpu_test_utils::{get_test_graphics_device, get_test_window};
use serial_test::serial;

/// First fence value no earlier test has used
fn next_free_fence_value(device: &dyn GraphicsDevice) -> FenceValue {
    device.wait_idle().unwrap();
    device.completed_fence_value().unwrap() + 1
}

// ============================================================================
// BUFFERS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_create_buffer_is_mapped() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let buffer = device
        .create_buffer(BufferDesc { name: "constants".to_string(), size: 512, usage: BufferUsage::Uniform })
        .unwrap();

    assert_eq!(buffer.size(), 512);
    assert_eq!(buffer.usage(), BufferUsage::Uniform);
    assert!(buffer.mapped_ptr().is_some());
    buffer.update(256, &[7u8; 256]).unwrap();
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_buffer_update_out_of_bounds_fails() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let buffer = device
        .create_buffer(BufferDesc { name: "small".to_string(), size: 64, usage: BufferUsage::Storage })
        .unwrap();

    assert!(buffer.update(32, &[0u8; 64]).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_zero_size_buffer_rejected() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let result = device.create_buffer(BufferDesc { name: "empty".to_string(), size: 0, usage: BufferUsage::Vertex });
    assert!(result.is_err());
}

// ============================================================================
// SHADERS AND LAYOUTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_shader_rejects_non_spirv() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let unaligned = device.create_shader(ShaderDesc { code: &[1, 2, 3], stage: ShaderStage::Vertex, entry_point: "main".to_string() });
    assert!(unaligned.is_err());

    let not_spirv = device.create_shader(ShaderDesc { code: &[0u8; 16], stage: ShaderStage::Vertex, entry_point: "main".to_string() });
    assert!(not_spirv.is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_binding_layout_keeps_slots() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let layout = device
        .create_binding_layout(
            BindingLayoutDesc::default()
                .with_slot(0, BindingKind::Constants, ShaderStageFlags::VERTEX_FRAGMENT)
                .with_slot(1, BindingKind::Storage, ShaderStageFlags::VERTEX),
        )
        .unwrap();

    assert_eq!(layout.slots().len(), 2);
    assert_eq!(layout.slot(1).map(|s| s.kind), Some(BindingKind::Storage));
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_binding_layout_duplicate_slot_rejected() {
    let shared = get_test_graphics_device();
    let mut device = shared.lock().unwrap();

    let result = device.create_binding_layout(
        BindingLayoutDesc::default()
            .with_slot(0, BindingKind::Constants, ShaderStageFlags::VERTEX)
            .with_slot(0, BindingKind::Storage, ShaderStageFlags::VERTEX),
    );
    assert!(result.is_err());
}

// ============================================================================
// FENCE
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_fence_reaches_submitted_values() {
    let shared = get_test_graphics_device();
    let device = shared.lock().unwrap();

    device.wait_for_fence(0).unwrap();
    let base = next_free_fence_value(&*device);

    let mut commands = device.create_command_list().unwrap();
    for value in base..base + 3 {
        commands.reset().unwrap();
        commands.begin().unwrap();
        commands.end().unwrap();
        device.submit(&*commands, value).unwrap();
        device.wait_for_fence(value).unwrap();
        assert!(device.completed_fence_value().unwrap() >= value);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_non_increasing_fence_value_rejected() {
    let shared = get_test_graphics_device();
    let device = shared.lock().unwrap();

    let value = next_free_fence_value(&*device);

    let mut commands = device.create_command_list().unwrap();
    commands.begin().unwrap();
    commands.end().unwrap();
    device.submit(&*commands, value).unwrap();
    device.wait_idle().unwrap();

    commands.reset().unwrap();
    commands.begin().unwrap();
    commands.end().unwrap();
    assert!(device.submit(&*commands, value).is_err());
    assert!(device.submit(&*commands, value - 1).is_err());
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_command_list_draw_outside_rendering_fails() {
    let shared = get_test_graphics_device();
    let device = shared.lock().unwrap();

    let mut commands = device.create_command_list().unwrap();
    assert!(commands.draw(3, 1, 0, 0).is_err());
    commands.begin().unwrap();
    assert!(commands.draw(3, 1, 0, 0).is_err());
    assert!(commands.begin().is_err());
    commands.end().unwrap();
}

// ============================================================================
// SWAPCHAIN AND FRAME LOOP
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_swapchain_creation_and_recreate() {
    let shared = get_test_graphics_device();
    let device = shared.lock().unwrap();

    let mut swapchain = device.create_swapchain(get_test_window()).unwrap();
    assert!(swapchain.image_count() >= 2);
    assert!(swapchain.width() > 0 && swapchain.height() > 0);

    swapchain.recreate(swapchain.width(), swapchain.height()).unwrap();
    assert!(swapchain.image_count() >= 2);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_renderer_presents_empty_graph() {
    let shared = get_test_graphics_device();
    let mut swapchain = shared.lock().unwrap().create_swapchain(get_test_window()).unwrap();

    let config = RendererConfig::default();
    let device: Arc<Mutex<dyn GraphicsDevice>> = shared.clone();
    let mut renderer = Renderer::new(device, config.clone()).unwrap();

    let frames = config.frames_in_flight as u64 * 2 + 1;
    for frame in 0..frames {
        let time = FrameTime { total_seconds: frame as f64 / 60.0, delta_seconds: 1.0 / 60.0 };
        let presented = renderer.draw_frame(&time, &mut swapchain).unwrap();
        assert!(matches!(presented, PresentResult::Presented | PresentResult::Suboptimal));
    }

    assert_eq!(renderer.stats().frames_submitted, frames);
    renderer.shutdown().unwrap();
}

// ============================================================================
// ENGINE REGISTRATION
// ============================================================================

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_vulkan_device_registered_with_engine() {
    Engine::initialize().unwrap();
    let device: Arc<Mutex<dyn GraphicsDevice>> = get_test_graphics_device();
    Engine::register_graphics_device(device).unwrap();

    let registered = Engine::graphics_device().unwrap();
    assert!(registered.lock().unwrap().completed_fence_value().is_ok());
    assert!(Engine::register_graphics_device(registered.clone()).is_err());

    Engine::destroy_graphics_device().unwrap();
    assert!(Engine::graphics_device().is_err());
    Engine::shutdown();
}
