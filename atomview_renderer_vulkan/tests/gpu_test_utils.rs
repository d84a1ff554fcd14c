#![allow(dead_code)]
//! GPU test utilities - one Vulkan device shared by every test in a binary
//!
//! winit refuses to create a second event loop in the same process, so the
//! window, its event loop and the device are created once and reused.

use atomview_engine::atomview::config::RendererConfig;
use atomview_renderer_vulkan::VulkanGraphicsDevice;
use std::sync::{Arc, Mutex, OnceLock};
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Shared device, created on first use
static GPU_GRAPHICS_DEVICE: OnceLock<Arc<Mutex<VulkanGraphicsDevice>>> = OnceLock::new();

/// Window backing the device's surfaces. The event loop is leaked with
/// `mem::forget` because it cannot live in a static.
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Shared test device
pub fn get_test_graphics_device() -> Arc<Mutex<VulkanGraphicsDevice>> {
    GPU_GRAPHICS_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();
            let device = VulkanGraphicsDevice::new(&window, &RendererConfig::default())
                .expect("Failed to create VulkanGraphicsDevice for tests");
            std::mem::forget(event_loop);
            GPU_WINDOW.set(window).ok();
            Arc::new(Mutex::new(device))
        })
        .clone()
}

/// Window of the shared device, for swapchain creation
pub fn get_test_window() -> &'static Window {
    get_test_graphics_device();
    GPU_WINDOW.get().expect("test window initialized with the device")
}

/// Hidden window on an event loop allowed off the main thread
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let mut builder = EventLoop::builder();
    #[cfg(target_os = "windows")]
    {
        use winit::platform::windows::EventLoopBuilderExtWindows;
        builder.with_any_thread(true);
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        winit::platform::x11::EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = builder.build().expect("Failed to create test event loop");

    let window_attrs = Window::default_attributes()
        .with_title("AtomView GPU Test")
        .with_inner_size(winit::dpi::PhysicalSize::new(320, 240))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).expect("Failed to create test window");
    (window, event_loop)
}
