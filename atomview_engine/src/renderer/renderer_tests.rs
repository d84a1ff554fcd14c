//! Tests for frame orchestration against the mock device

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::{MockGraphicsDevice, MockSwapchain};
use crate::graphics_device::{Buffer, PrimitiveTopology};
use crate::render_graph::{
    Binding, ComputeItem, ComputeItemId, ComputeLayer, HookFlow, ItemId, PassId, RenderItem, RenderLayer, RenderPass,
};
use crate::test_fixtures::{compute_pipeline, graphics_pipeline, Fixture};

// ============================================================================
// Helpers
// ============================================================================

struct Scene {
    renderer: Renderer,
    pass: PassId,
    particles: LayerId,
    selection: LayerId,
    outline: LayerId,
    spheres: ItemId,
    integrate: ComputeItemId,
}

/// pass "scene": compute "simulate", layers particles, selection, outline, box
fn scene(fixture: &Fixture) -> Scene {
    let mut renderer = Renderer::new(Arc::clone(&fixture.device), RendererConfig::default()).unwrap();
    let camera = renderer.create_constant_buffer::<[f32; 4]>("camera", 1, BindingKind::Constants).unwrap();
    let mesh = fixture.mesh("primitives");
    let graph = renderer.graph_mut();

    let pass = graph
        .add_pass(RenderPass::new("scene", fixture.layout()).with_binding(Binding::constants_with_update(
            "camera",
            0,
            camera,
            |writer, time| writer.write_one(&[time.total_seconds as f32, time.delta_seconds, 0.0, 0.0]),
        )))
        .unwrap();

    let simulate = graph
        .add_compute_layer(pass, ComputeLayer::new("simulate", compute_pipeline("simulate")).unwrap())
        .unwrap();
    let integrate = graph.add_compute_item(simulate, ComputeItem::new("integrate", [4, 1, 1])).unwrap();

    let particles = graph
        .add_layer(
            pass,
            RenderLayer::new("particles", graphics_pipeline("lit"), Arc::clone(&mesh), PrimitiveTopology::TriangleList)
                .unwrap(),
        )
        .unwrap();
    let spheres = graph.add_item(particles, RenderItem::new("spheres", 0, 100)).unwrap();

    let selection = graph
        .add_layer(
            pass,
            RenderLayer::new("selection", graphics_pipeline("stencil_write"), Arc::clone(&mesh), PrimitiveTopology::TriangleList)
                .unwrap()
                .with_stencil_reference(1),
        )
        .unwrap();
    graph.add_item(selection, RenderItem::new("selected", 0, 100)).unwrap();

    let outline = graph
        .add_layer(
            pass,
            RenderLayer::new("outline", graphics_pipeline("stencil_test"), Arc::clone(&mesh), PrimitiveTopology::TriangleList)
                .unwrap()
                .with_stencil_reference(1),
        )
        .unwrap();
    graph.add_item(outline, RenderItem::new("outlined", 0, 100)).unwrap();

    let box_layer = graph
        .add_layer(
            pass,
            RenderLayer::new("box", graphics_pipeline("lines"), mesh, PrimitiveTopology::LineList).unwrap(),
        )
        .unwrap();
    graph.add_item(box_layer, RenderItem::new("edges", 1, 1)).unwrap();

    Scene { renderer, pass, particles, selection, outline, spheres, integrate }
}

fn time(frame: u32) -> FrameTime {
    FrameTime { total_seconds: frame as f64 * 0.5, delta_seconds: 0.5 }
}

/// Pipeline binds, draws and dispatches only
fn work(commands: &[String]) -> Vec<String> {
    commands
        .iter()
        .filter(|c| c.starts_with("bind_pipeline") || c.starts_with("draw") || c.starts_with("dispatch"))
        .cloned()
        .collect()
}

fn last_submission(fixture: &Fixture) -> Vec<String> {
    fixture.mock.lock().unwrap().submitted_commands().last().cloned().unwrap_or_default()
}

// ============================================================================
// Command sequence
// ============================================================================

#[test]
fn test_frame_command_sequence() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut renderer = Renderer::new(Arc::clone(&fixture.device), RendererConfig::default()).unwrap();
    let camera = fixture.constants::<[f32; 16]>("camera", 1);
    let graph = renderer.graph_mut();
    let pass = graph
        .add_pass(RenderPass::new("scene", fixture.layout()).with_binding(Binding::constants("camera", 0, camera)))
        .unwrap();
    let sim = graph.add_compute_layer(pass, ComputeLayer::new("sim", compute_pipeline("sim")).unwrap()).unwrap();
    graph.add_compute_item(sim, ComputeItem::new("step", [4, 1, 1])).unwrap();
    let layer = graph
        .add_layer(
            pass,
            RenderLayer::new("particles", graphics_pipeline("lit"), fixture.mesh("m"), PrimitiveTopology::TriangleList)
                .unwrap(),
        )
        .unwrap();
    graph.add_item(layer, RenderItem::new("spheres", 0, 1)).unwrap();

    let mut swapchain = MockSwapchain::new(800, 600);
    renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    assert_eq!(
        last_submission(&fixture),
        vec![
            "begin",
            "bind_pipeline(sim)",
            "bind_binding_layout(Compute)",
            "dispatch(4,1,1)",
            "begin_rendering(0)",
            "set_viewport(800x600)",
            "set_scissor(800x600)",
            "bind_binding_layout(Graphics)",
            "bind_constants(0,0,256)",
            "bind_pipeline(lit)",
            "bind_vertex_buffer(0)",
            "bind_index_buffer(0,U16)",
            "set_primitive_topology(TriangleList)",
            "draw_indexed(36,1,0,0,0)",
            "end_rendering",
            "end",
        ]
    );
    assert_eq!(swapchain.presented, vec![0]);
}

#[test]
fn test_pass_bindings_follow_frame_index() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    for frame in 0..4 {
        scene.renderer.draw_frame(&time(frame), &mut swapchain).unwrap();
        let offset = (frame as u64 % 3) * 256;
        let expected = format!("bind_constants(0,{},256)", offset);
        assert!(last_submission(&fixture).contains(&expected), "frame {}", frame);
    }
}

#[test]
fn test_traversal_is_deterministic() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();
    scene.renderer.draw_frame(&time(1), &mut swapchain).unwrap();

    let submitted = fixture.mock.lock().unwrap().submitted_commands();
    assert_eq!(work(&submitted[0]), work(&submitted[1]));
    assert_eq!(
        work(&submitted[0]),
        vec![
            "bind_pipeline(simulate)",
            "dispatch(4,1,1)",
            "bind_pipeline(lit)",
            "draw_indexed(36,1,0,0,0)",
            "bind_pipeline(stencil_write)",
            "draw_indexed(36,1,0,0,0)",
            "bind_pipeline(stencil_test)",
            "draw_indexed(36,1,0,0,0)",
            "bind_pipeline(lines)",
            "draw_indexed(24,1,36,8,0)",
        ]
    );
}

// ============================================================================
// Activation
// ============================================================================

#[test]
fn test_inactive_layer_contributes_no_draws() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.graph_mut().set_layer_active(scene.particles, false).unwrap();

    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let commands = last_submission(&fixture);
    assert!(!commands.contains(&"bind_pipeline(lit)".to_string()));
    assert_eq!(scene.renderer.stats().last_draw_count, 3);

    // Item state does not matter while the layer is off
    scene.renderer.graph_mut().set_item_active(scene.spheres, true).unwrap();
    scene.renderer.graph_mut().set_instance_count(scene.spheres, 50).unwrap();
    scene.renderer.draw_frame(&time(1), &mut swapchain).unwrap();
    assert!(!last_submission(&fixture).iter().any(|c| c.starts_with("draw_indexed(36,50")));
}

#[test]
fn test_disabled_stencil_writer_leaves_tester_drawing() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.graph_mut().set_layer_active(scene.selection, false).unwrap();

    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let work = work(&last_submission(&fixture));
    assert!(!work.contains(&"bind_pipeline(stencil_write)".to_string()));
    let test_at = work.iter().position(|c| c == "bind_pipeline(stencil_test)").unwrap();
    assert_eq!(work[test_at + 1], "draw_indexed(36,1,0,0,0)");
}

#[test]
fn test_stencil_writer_precedes_tester() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let commands = last_submission(&fixture);
    let write = commands.iter().position(|c| c == "bind_pipeline(stencil_write)").unwrap();
    let test = commands.iter().position(|c| c == "bind_pipeline(stencil_test)").unwrap();
    assert!(write < test);
    assert_eq!(commands.iter().filter(|c| *c == "set_stencil_reference(1)").count(), 2);
    let outline = scene.renderer.graph().layer(scene.outline).unwrap();
    assert_eq!(outline.stencil_reference(), Some(1));
}

#[test]
fn test_inactive_pass_records_only_rendering_scope() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.graph_mut().set_pass_active(scene.pass, false).unwrap();

    let counts_before = scene.renderer.stats();
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    assert!(work(&last_submission(&fixture)).is_empty());
    assert_eq!(scene.renderer.stats().frames_submitted, counts_before.frames_submitted + 1);
}

#[test]
fn test_compute_item_toggle_and_thread_groups() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    scene.renderer.graph_mut().set_thread_groups(scene.integrate, [2, 1, 1]).unwrap();
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();
    assert!(last_submission(&fixture).contains(&"dispatch(2,1,1)".to_string()));

    scene.renderer.graph_mut().set_compute_item_active(scene.integrate, false).unwrap();
    scene.renderer.draw_frame(&time(1), &mut swapchain).unwrap();
    assert!(!last_submission(&fixture).iter().any(|c| c.starts_with("dispatch")));
    assert_eq!(scene.renderer.stats().last_dispatch_count, 0);
}

#[test]
fn test_pass_pre_work_skip() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    let post_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&post_runs);
    {
        let pass = scene.renderer.graph_mut().pass_mut(scene.pass).unwrap();
        pass.hooks_mut().set_pre_work(|_, _| Ok(HookFlow::Skip));
        pass.hooks_mut().set_post_work(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    // Compute layers still run; the graphics part of the pass is skipped
    assert_eq!(work(&last_submission(&fixture)), vec!["bind_pipeline(simulate)", "dispatch(4,1,1)"]);
    assert_eq!(post_runs.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Frame pacing
// ============================================================================

#[test]
fn test_fourth_frame_waits_for_first() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    for frame in 0..3 {
        scene.renderer.draw_frame(&time(frame), &mut swapchain).unwrap();
    }
    assert!(fixture.mock.lock().unwrap().waits().is_empty());

    scene.renderer.draw_frame(&time(3), &mut swapchain).unwrap();
    assert_eq!(fixture.mock.lock().unwrap().waits(), vec![1]);

    fixture.mock.lock().unwrap().complete_all();
    scene.renderer.draw_frame(&time(4), &mut swapchain).unwrap();
    fixture.mock.lock().unwrap().complete_all();
    scene.renderer.draw_frame(&time(5), &mut swapchain).unwrap();
    assert_eq!(fixture.mock.lock().unwrap().waits(), vec![1]);

    let stats = scene.renderer.stats();
    assert_eq!(stats.frames_submitted, 6);
    assert_eq!(stats.fence_waits, 1);
    assert_eq!(stats.last_fence_value, 6);
    assert_eq!(scene.renderer.frame_index(), 0);
}

#[test]
fn test_update_writes_current_replica_only() {
    let fixture = Fixture::with_device(MockGraphicsDevice::with_auto_complete());
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    scene.renderer.draw_frame(&time(3), &mut swapchain).unwrap();

    let bytes = {
        let mock = fixture.mock.lock().unwrap();
        mock.buffers.iter().find(|b| b.name == "camera").unwrap().bytes()
    };
    let replica0: [f32; 4] = bytemuck::pod_read_unaligned(&bytes[0..16]);
    assert_eq!(replica0, [1.5, 0.5, 0.0, 0.0]);
    assert!(bytes[256..].iter().all(|&b| b == 0));
}

#[test]
fn test_update_and_render_require_recording_frame() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let swapchain = MockSwapchain::new(64, 64);

    assert!(scene.renderer.update(&time(0), 0).is_err());
    let frame = scene.renderer.begin_frame().unwrap();
    assert!(scene.renderer.update(&time(0), frame + 1).is_err());
    assert!(scene.renderer.render(frame + 1, &swapchain, 0).is_err());
    assert_eq!(scene.renderer.update(&time(0), frame).unwrap(), 1);
    let counts = scene.renderer.render(frame, &swapchain, 0).unwrap();
    assert_eq!(counts, RecordCounts { draws: 4, dispatches: 1 });
}

#[test]
fn test_submit_failure_propagates_from_draw_frame() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    fixture.mock.lock().unwrap().fail_next_submit();

    assert!(scene.renderer.draw_frame(&time(0), &mut swapchain).is_err());
    assert!(swapchain.presented.is_empty());
}

#[test]
fn test_instance_count_over_capacity_rejected() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    assert!(matches!(
        scene.renderer.graph_mut().set_instance_count(scene.spheres, 101),
        Err(Error::CapacityExceeded { .. })
    ));
}

// ============================================================================
// Deferred reclamation
// ============================================================================

#[test]
fn test_replaced_mesh_freed_after_fence() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let weak = {
        let old = scene.renderer.graph().layer(scene.particles).unwrap().mesh();
        Arc::downgrade(old)
    };
    scene.renderer.replace_layer_mesh(scene.particles, fixture.mesh("refined")).unwrap();
    assert_eq!(scene.renderer.reclaimer().pending_fence_values(), vec![2]);

    // Other layers still share the old collection
    assert!(weak.upgrade().is_some());

    // Frame 2 signals fence 2; nothing has completed yet
    scene.renderer.draw_frame(&time(1), &mut swapchain).unwrap();
    assert_eq!(scene.renderer.reclaimer().pending(), 1);

    fixture.mock.lock().unwrap().set_completed_fence_value(2);
    assert_eq!(scene.renderer.sweep().unwrap(), 1);
    assert_eq!(scene.renderer.stats().resources_reclaimed, 1);
}

#[test]
fn test_retired_buffer_dropped_when_fence_completes() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);

    let buffer: Arc<dyn Buffer> = fixture.constants::<[f32; 4]>("scratch", 1).buffer().clone();
    let weak = Arc::downgrade(&buffer);
    scene.renderer.retire(buffer);
    fixture.mock.lock().unwrap().buffers.retain(|b| b.name != "scratch");

    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();
    assert!(weak.upgrade().is_some());

    fixture.mock.lock().unwrap().complete_all();
    scene.renderer.draw_frame(&time(1), &mut swapchain).unwrap();
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_replace_mesh_missing_submesh_rejected() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let box_layer = scene.renderer.graph().find_layer(scene.pass, "box").unwrap();
    assert!(scene.renderer.replace_layer_mesh(box_layer, fixture.quad_mesh()).is_err());
    assert!(scene.renderer.reclaimer().is_empty());
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn test_shutdown_drains_queue_and_blocks_new_frames() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();
    scene.renderer.retire(graphics_pipeline("old"));

    scene.renderer.shutdown().unwrap();
    assert!(scene.renderer.reclaimer().is_empty());
    assert_eq!(fixture.mock.lock().unwrap().timeline.lock().unwrap().completed, 1);
    assert!(scene.renderer.begin_frame().is_err());

    // Idempotent
    scene.renderer.shutdown().unwrap();
}

#[test]
fn test_shutdown_abandons_failed_frame() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let frame = scene.renderer.begin_frame().unwrap();
    assert!(scene.renderer.update(&time(1), frame + 1).is_err());
    assert!(scene.renderer.frame_synchronizer().is_recording());

    scene.renderer.shutdown().unwrap();
    assert!(!scene.renderer.frame_synchronizer().is_recording());
    assert_eq!(fixture.mock.lock().unwrap().submitted(), vec![1]);
    assert_eq!(fixture.mock.lock().unwrap().timeline.lock().unwrap().completed, 1);
}

#[test]
fn test_drop_after_failed_frame_waits_before_freeing() {
    let fixture = Fixture::new();
    let mut scene = scene(&fixture);
    let mut swapchain = MockSwapchain::new(64, 64);
    scene.renderer.draw_frame(&time(0), &mut swapchain).unwrap();

    let buffer: Arc<dyn Buffer> = fixture.constants::<[f32; 4]>("scratch", 1).buffer().clone();
    let weak = Arc::downgrade(&buffer);
    scene.renderer.retire(buffer);
    fixture.mock.lock().unwrap().buffers.retain(|b| b.name != "scratch");

    let frame = scene.renderer.begin_frame().unwrap();
    assert!(scene.renderer.update(&time(1), frame + 1).is_err());

    // Fence 1 is still pending, so the buffer must survive until the drop waits
    assert_eq!(fixture.mock.lock().unwrap().timeline.lock().unwrap().completed, 0);
    assert!(weak.upgrade().is_some());

    drop(scene);
    assert_eq!(fixture.mock.lock().unwrap().timeline.lock().unwrap().completed, 1);
    assert_eq!(fixture.mock.lock().unwrap().submitted(), vec![1]);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_invalid_config_rejected() {
    let fixture = Fixture::new();
    let config = RendererConfig { frames_in_flight: 0, ..RendererConfig::default() };
    assert!(Renderer::new(Arc::clone(&fixture.device), config).is_err());
}
