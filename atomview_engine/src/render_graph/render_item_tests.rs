//! Tests for RenderItem and ComputeItem state

use super::*;
use crate::test_fixtures::recording;

// ============================================================================
// RenderItem
// ============================================================================

#[test]
fn test_render_item_defaults() {
    let item = RenderItem::new("spheres", 0, 64);
    assert_eq!(item.name(), "spheres");
    assert_eq!(item.submesh(), 0);
    assert_eq!(item.instance_count(), 1);
    assert_eq!(item.max_instances(), 64);
    assert!(item.is_active());
    assert!(item.bindings().is_empty());
}

#[test]
fn test_render_item_zero_capacity_draws_nothing() {
    let item = RenderItem::new("empty", 0, 0);
    assert_eq!(item.instance_count(), 0);
}

#[test]
fn test_set_instance_count_within_capacity() {
    let mut item = RenderItem::new("spheres", 0, 64);
    item.set_instance_count(64).unwrap();
    assert_eq!(item.instance_count(), 64);
    item.set_instance_count(0).unwrap();
    assert_eq!(item.instance_count(), 0);
}

#[test]
fn test_set_instance_count_over_capacity_rejected() {
    let mut item = RenderItem::new("spheres", 0, 64);
    item.set_instance_count(10).unwrap();

    match item.set_instance_count(65) {
        Err(Error::CapacityExceeded { requested, capacity, .. }) => {
            assert_eq!(requested, 65);
            assert_eq!(capacity, 64);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other.err()),
    }
    assert_eq!(item.instance_count(), 10);
}

#[test]
fn test_render_item_hooks_receive_owner_name() {
    let mut item = RenderItem::new("spheres", 0, 1)
        .with_pre_work(|cmd, ctx| {
            assert_eq!(ctx.owner, "spheres");
            cmd.set_stencil_reference(ctx.frame_index as u32)?;
            Ok(HookFlow::Continue)
        })
        .with_post_work(|cmd, _| cmd.set_stencil_reference(99));

    let mut cmd = recording();
    assert_eq!(item.pre_work(&mut cmd, 2).unwrap(), HookFlow::Continue);
    item.post_work(&mut cmd, 2).unwrap();
    assert_eq!(cmd.commands[1..], ["set_stencil_reference(2)", "set_stencil_reference(99)"]);
}

// ============================================================================
// ComputeItem
// ============================================================================

#[test]
fn test_compute_item_starts_at_max_extent() {
    let item = ComputeItem::new("integrate", [16, 1, 1]);
    assert_eq!(item.thread_groups(), [16, 1, 1]);
    assert_eq!(item.max_thread_groups(), [16, 1, 1]);
    assert!(item.is_active());
}

#[test]
fn test_set_thread_groups_per_axis_limit() {
    let mut item = ComputeItem::new("integrate", [16, 4, 1]);
    item.set_thread_groups([8, 4, 0]).unwrap();
    assert_eq!(item.thread_groups(), [8, 4, 0]);

    match item.set_thread_groups([8, 5, 1]) {
        Err(Error::CapacityExceeded { requested, capacity, .. }) => {
            assert_eq!(requested, 5);
            assert_eq!(capacity, 4);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other.err()),
    }
    assert_eq!(item.thread_groups(), [8, 4, 0]);
}

#[test]
fn test_compute_item_toggle_active() {
    let mut item = ComputeItem::new("integrate", [1, 1, 1]);
    item.set_active(false);
    assert!(!item.is_active());
}
