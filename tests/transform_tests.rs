//! Transform and TransformSystem tests
//!
//! Tests for:
//! - Transform TRS operations and dirty checking
//! - Hierarchical matrix propagation (full and subtree)
//! - Deep hierarchies

use glam::{Affine3A, Mat4, Quat, Vec3};
use rigview::scene::transform::Transform;
use rigview::scene::transform_system::{update_hierarchy, update_subtree};
use rigview::scene::{Node, NodeHandle, Scene};
use std::f32::consts::FRAC_PI_2;

// ============================================================================
// Helper
// ============================================================================

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
}

fn world_position(scene: &Scene, handle: NodeHandle) -> Vec3 {
    scene.get_node(handle).unwrap().world_matrix().translation.into()
}

// ============================================================================
// Transform Unit Tests
// ============================================================================

#[test]
fn transform_default_is_identity() {
    let t = Transform::new();
    assert_eq!(t.position, Vec3::ZERO);
    assert_eq!(t.rotation, Quat::IDENTITY);
    assert_eq!(t.scale, Vec3::ONE);
}

#[test]
fn transform_update_local_matrix_dirty_check() {
    let mut t = Transform::new();

    // First call always updates
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.position = Vec3::new(1.0, 2.0, 3.0);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.rotation = Quat::from_rotation_y(FRAC_PI_2);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());

    t.scale = Vec3::splat(2.0);
    assert!(t.update_local_matrix());
    assert!(!t.update_local_matrix());
}

#[test]
fn transform_local_matrix_reflects_trs() {
    let mut t = Transform::from_trs(Vec3::new(10.0, 20.0, 30.0), Quat::IDENTITY, Vec3::splat(2.0));
    t.update_local_matrix();

    let mat = Mat4::from(*t.local_matrix());
    let translation = mat.w_axis.truncate();
    assert!(vec3_approx(translation, Vec3::new(10.0, 20.0, 30.0)));
    assert!(approx_eq(mat.x_axis.x, 2.0));
}

#[test]
fn transform_mark_dirty_forces_update() {
    let mut t = Transform::new();
    t.update_local_matrix();
    assert!(!t.update_local_matrix());

    t.mark_dirty();
    assert!(t.update_local_matrix());
}

// ============================================================================
// Hierarchy Setup Helpers
// ============================================================================

/// A chain of `length` nodes, each translated +1 on X from its parent.
fn create_chain(length: usize) -> (Scene, Vec<NodeHandle>) {
    let mut scene = Scene::new();
    let mut handles: Vec<NodeHandle> = Vec::new();
    for i in 0..length {
        let mut builder = scene.build_node(&format!("n{i}")).with_position(1.0, 0.0, 0.0);
        if let Some(&parent) = handles.last() {
            builder = builder.with_parent(parent);
        }
        handles.push(builder.build());
    }
    (scene, handles)
}

// ============================================================================
// TransformSystem Hierarchy Tests
// ============================================================================

#[test]
fn hierarchy_chain_world_positions() {
    let (mut scene, handles) = create_chain(5);
    update_hierarchy(&mut scene.nodes, &scene.root_nodes.clone());

    for (i, &handle) in handles.iter().enumerate() {
        let expected_x = (i + 1) as f32;
        let x = world_position(&scene, handle).x;
        assert!(approx_eq(x, expected_x), "Node {i}: expected x={expected_x}, got x={x}");
    }
}

#[test]
fn hierarchy_with_rotation_and_scale() {
    let mut scene = Scene::new();

    // Parent: translate (5,0,0), rotate 90° around Y, scale 2x
    let parent = scene
        .build_node("parent")
        .with_position(5.0, 0.0, 0.0)
        .with_rotation(Quat::from_rotation_y(FRAC_PI_2))
        .with_scale(2.0)
        .build();
    let child = scene
        .build_node("child")
        .with_position(1.0, 0.0, 0.0)
        .with_parent(parent)
        .build();

    scene.update_matrix_world();

    // (1,0,0) -> rotated (0,0,-1) -> scaled (0,0,-2) -> translated (5,0,-2)
    let child_world = world_position(&scene, child);
    assert!(approx_eq(child_world.x, 5.0), "child world x: expected 5.0, got {}", child_world.x);
    assert!(approx_eq(child_world.z, -2.0), "child world z: expected -2.0, got {}", child_world.z);
}

#[test]
fn hierarchy_subtree_update() {
    let (mut scene, handles) = create_chain(5);
    scene.update_matrix_world();

    scene.get_node_mut(handles[2]).unwrap().transform.position = Vec3::new(10.0, 0.0, 0.0);
    update_subtree(&mut scene.nodes, handles[2]);

    // parent(2) + 10
    assert!(approx_eq(world_position(&scene, handles[2]).x, 12.0));
    assert!(approx_eq(world_position(&scene, handles[3]).x, 13.0));
    // Ancestors untouched
    assert!(approx_eq(world_position(&scene, handles[1]).x, 2.0));
}

#[test]
fn hierarchy_reparent_marks_dirty() {
    let (mut scene, handles) = create_chain(3);
    scene.update_matrix_world();

    let other = scene.build_node("other").with_position(0.0, 5.0, 0.0).build();
    scene.attach(handles[2], other);
    scene.update_matrix_world();

    assert!(vec3_approx(world_position(&scene, handles[2]), Vec3::new(1.0, 5.0, 0.0)));
}

// ============================================================================
// Edge Cases
// ============================================================================

#[test]
fn identity_hierarchy_produces_identity_world() {
    let mut scene = Scene::new();
    let a = scene.add_node(Node::new(), "a");
    let b = scene.add_to_parent(Node::new(), "b", a);
    scene.update_matrix_world();

    assert_eq!(*scene.get_node(b).unwrap().world_matrix(), Affine3A::IDENTITY);
}

#[test]
fn deeply_nested_hierarchy_no_stack_overflow() {
    let (mut scene, handles) = create_chain(5_000);
    scene.update_matrix_world();

    let last = *handles.last().unwrap();
    assert!(approx_eq(world_position(&scene, last).x, 5_000.0));
}
