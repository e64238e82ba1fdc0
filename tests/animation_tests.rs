//! Animation System Tests
//!
//! Tests for:
//! - KeyframeTrack linear/step/cubic interpolation
//! - KeyframeCursor sequential scan and binary search fallback
//! - AnimationAction loop modes, fades and pausing
//! - AnimationClip duration and identity
//! - Binder name resolution
//! - AnimationMixer weighted blending and rest-pose fill

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::{Quat, Vec3};

use rigview::animation::{
    AnimationAction, AnimationClip, AnimationMixer, Binder, InterpolationMode, KeyframeCursor, KeyframeTrack,
    LoopMode, TargetPath, Track, TrackData, TrackMeta,
};
use rigview::scene::{NodeHandle, Scene};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

fn quat_approx(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

fn translation_track(bone: &str, times: Vec<f32>, values: Vec<Vec3>) -> Track {
    Track {
        meta: TrackMeta {
            node_name: bone.to_string(),
            target: TargetPath::Translation,
        },
        data: TrackData::Vector3(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
    }
}

fn rotation_track(bone: &str, times: Vec<f32>, values: Vec<Quat>) -> Track {
    Track {
        meta: TrackMeta {
            node_name: bone.to_string(),
            target: TargetPath::Rotation,
        },
        data: TrackData::Quaternion(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
    }
}

/// One-second clip moving `bone` from the origin to `(10, 0, 0)`.
fn slide_clip(name: &str, bone: &str) -> Arc<AnimationClip> {
    Arc::new(AnimationClip::new(
        name,
        vec![translation_track(bone, vec![0.0, 1.0], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)])],
    ))
}

// ============================================================================
// KeyframeTrack: Linear Interpolation
// ============================================================================

#[test]
fn track_linear_f32_midpoint() {
    let track = KeyframeTrack::new(vec![0.0, 1.0], vec![0.0_f32, 10.0], InterpolationMode::Linear);

    let val = track.sample(0.5).unwrap();
    assert!(approx(val, 5.0), "Expected 5.0, got {val}");
}

#[test]
fn track_linear_f32_exact_keyframes() {
    let track = KeyframeTrack::new(vec![0.0, 1.0, 2.0], vec![0.0_f32, 10.0, 20.0], InterpolationMode::Linear);

    assert!(approx(track.sample(0.0).unwrap(), 0.0));
    assert!(approx(track.sample(1.0).unwrap(), 10.0));
    assert!(approx(track.sample(2.0).unwrap(), 20.0));
}

#[test]
fn track_linear_clamps_outside_range() {
    let track = KeyframeTrack::new(vec![1.0, 2.0], vec![5.0_f32, 15.0], InterpolationMode::Linear);

    assert!(approx(track.sample(0.0).unwrap(), 5.0));
    assert!(approx(track.sample(10.0).unwrap(), 15.0));
}

#[test]
fn track_linear_vec3() {
    let track = KeyframeTrack::new(
        vec![0.0, 2.0],
        vec![Vec3::ZERO, Vec3::new(2.0, 4.0, -6.0)],
        InterpolationMode::Linear,
    );

    assert!(vec3_approx(track.sample(1.0).unwrap(), Vec3::new(1.0, 2.0, -3.0)));
}

#[test]
fn track_linear_quat_slerp() {
    let track = KeyframeTrack::new(
        vec![0.0, 1.0],
        vec![Quat::IDENTITY, Quat::from_rotation_y(FRAC_PI_2)],
        InterpolationMode::Linear,
    );

    let q = track.sample(0.5).unwrap();
    let expected = Quat::from_rotation_y(FRAC_PI_2 * 0.5);
    assert!(quat_approx(q, expected));
}

#[test]
fn track_empty_samples_none() {
    let track: KeyframeTrack<f32> = KeyframeTrack::new(vec![], vec![], InterpolationMode::Linear);
    assert!(track.is_empty());
    assert!(track.sample(0.5).is_none());
    assert!(track.sample_with_cursor(0.5, &mut KeyframeCursor::default()).is_none());
    assert!(approx(track.end_time(), 0.0));
}

// ============================================================================
// KeyframeTrack: Step and CubicSpline
// ============================================================================

#[test]
fn track_step_holds_value() {
    let track = KeyframeTrack::new(vec![0.0, 1.0, 2.0], vec![1.0_f32, 2.0, 3.0], InterpolationMode::Step);

    assert!(approx(track.sample(0.0).unwrap(), 1.0));
    assert!(approx(track.sample(0.99).unwrap(), 1.0));
    assert!(approx(track.sample(1.5).unwrap(), 2.0));
    assert!(approx(track.sample(2.5).unwrap(), 3.0));
}

#[test]
fn track_cubic_f32_endpoints_and_zero_tangent_midpoint() {
    // [in, value, out] per keyframe
    let track = KeyframeTrack::new(
        vec![0.0, 1.0],
        vec![0.0_f32, 0.0, 0.0, 0.0, 10.0, 0.0],
        InterpolationMode::CubicSpline,
    );

    assert!(approx(track.sample(0.0).unwrap(), 0.0));
    assert!(approx(track.sample(1.0).unwrap(), 10.0));
    // Hermite with flat tangents is symmetric around the midpoint
    assert!(approx(track.sample(0.5).unwrap(), 5.0));
    assert_eq!(track.keyframe_value(1), Some(10.0));
}

// ============================================================================
// KeyframeCursor
// ============================================================================

#[test]
fn cursor_sequential_forward_matches_stateless() {
    let times: Vec<f32> = (0..20).map(|i| i as f32 * 0.1).collect();
    let values: Vec<f32> = (0..20).map(|i| (i * i) as f32).collect();
    let track = KeyframeTrack::new(times, values, InterpolationMode::Linear);

    let mut cursor = KeyframeCursor::default();
    let mut t = 0.0;
    while t < 2.0 {
        let a = track.sample_with_cursor(t, &mut cursor).unwrap();
        let b = track.sample(t).unwrap();
        assert!(approx(a, b), "t={t}: cursor {a} vs stateless {b}");
        t += 0.037;
    }
}

#[test]
fn cursor_jump_back_falls_back_to_search() {
    let times: Vec<f32> = (0..100).map(|i| i as f32).collect();
    let values: Vec<f32> = (0..100).map(|i| i as f32).collect();
    let track = KeyframeTrack::new(times, values, InterpolationMode::Linear);

    let mut cursor = KeyframeCursor::default();
    assert!(approx(track.sample_with_cursor(90.5, &mut cursor).unwrap(), 90.5));
    assert_eq!(cursor.last_index, 90);
    assert!(approx(track.sample_with_cursor(3.25, &mut cursor).unwrap(), 3.25));
    assert_eq!(cursor.last_index, 3);
}

#[test]
fn cursor_single_keyframe() {
    let track = KeyframeTrack::new(vec![0.5], vec![7.0_f32], InterpolationMode::Linear);
    let mut cursor = KeyframeCursor::default();
    assert!(approx(track.sample_with_cursor(0.0, &mut cursor).unwrap(), 7.0));
    assert!(approx(track.sample_with_cursor(9.0, &mut cursor).unwrap(), 7.0));
}

// ============================================================================
// AnimationClip
// ============================================================================

#[test]
fn clip_duration_is_latest_keyframe() {
    let clip = AnimationClip::new(
        "walk",
        vec![
            translation_track("Hips", vec![0.0, 1.5], vec![Vec3::ZERO, Vec3::ONE]),
            rotation_track("Spine", vec![0.0, 2.5], vec![Quat::IDENTITY, Quat::IDENTITY]),
        ],
    );
    assert!(approx(clip.duration, 2.5));
    assert_eq!(clip.bone_names(), vec!["Hips", "Spine"]);
}

#[test]
fn clip_derive_issues_new_identity() {
    let clip = slide_clip("a", "Hips");
    let copy = clip.derive("b");

    assert_ne!(clip.id, copy.id);
    assert_eq!(copy.name, "b");
    assert!(clip.same_tracks(&copy));
}

// ============================================================================
// AnimationAction
// ============================================================================

#[test]
fn action_loop_wraps() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.loop_mode = LoopMode::Loop;

    action.update(1.25);
    assert!(approx(action.time, 0.25));
}

#[test]
fn action_once_clamps_and_pauses() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.loop_mode = LoopMode::Once;

    action.update(3.0);
    assert!(approx(action.time, 1.0));
    assert!(action.paused);
}

#[test]
fn action_pingpong_reflects() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.loop_mode = LoopMode::PingPong;

    action.update(1.25);
    assert!(approx(action.time, 0.75));

    // Still heading back toward the start
    action.update(0.25);
    assert!(approx(action.time, 0.5));

    // Bounces off the start and heads forward again
    action.update(0.75);
    assert!(approx(action.time, 0.25));
    action.update(0.25);
    assert!(approx(action.time, 0.5));
}

#[test]
fn action_pingpong_reset_restarts_forward() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.loop_mode = LoopMode::PingPong;
    action.update(1.5);
    assert!(approx(action.time, 0.5));

    action.reset();
    action.update(0.25);
    assert!(approx(action.time, 0.25));
}

#[test]
fn action_paused_holds_time() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.update(0.3);
    action.paused = true;
    action.update(0.5);
    assert!(approx(action.time, 0.3));
}

#[test]
fn action_fade_in_ramps_weight() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.fade_in(1.0);
    assert!(approx(action.effective_weight(), 0.0));

    action.update(0.5);
    assert!(approx(action.effective_weight(), 0.5));

    action.update(0.6);
    assert!(approx(action.effective_weight(), 1.0));
    assert!(!action.is_fading());
}

#[test]
fn action_fade_out_disables() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.fade_out(0.2);
    action.update(0.1);
    assert!(approx(action.effective_weight(), 0.5));

    action.update(0.2);
    assert!(!action.enabled);
    assert!(approx(action.effective_weight(), 0.0));
}

#[test]
fn action_fade_progresses_while_paused() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.paused = true;
    action.fade_out(0.5);
    action.update(1.0);
    assert!(!action.enabled);
    assert!(approx(action.time, 0.0));
}

#[test]
fn action_zero_duration_fade_is_immediate() {
    let mut action = AnimationAction::new(slide_clip("a", "Hips"));
    action.fade_in(0.0);
    assert!(approx(action.effective_weight(), 1.0));
    assert!(!action.is_fading());
}

// ============================================================================
// Binder
// ============================================================================

fn two_bone_scene() -> (Scene, NodeHandle, NodeHandle, NodeHandle) {
    let mut scene = Scene::new();
    let root = scene.build_node("Character").build();
    let hips = scene.build_node("Hips").with_position(0.0, 1.0, 0.0).with_parent(root).build();
    let spine = scene.build_node("Spine").with_position(0.0, 0.5, 0.0).with_parent(hips).build();
    (scene, root, hips, spine)
}

#[test]
fn binder_resolves_by_name_and_skips_missing() {
    let (scene, root, hips, _) = two_bone_scene();
    let clip = AnimationClip::new(
        "c",
        vec![
            translation_track("Hips", vec![0.0], vec![Vec3::ZERO]),
            rotation_track("Tail", vec![0.0], vec![Quat::IDENTITY]),
        ],
    );

    let bindings = Binder::bind(&scene, root, &clip);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].node_handle, hips);
    assert_eq!(bindings[0].track_index, 0);
    assert_eq!(bindings[0].target, TargetPath::Translation);
}

#[test]
fn binder_first_preorder_match_wins() {
    let mut scene = Scene::new();
    let root = scene.build_node("root").build();
    let a = scene.build_node("a").with_parent(root).build();
    let first = scene.build_node("Bone").with_parent(a).build();
    let _second = scene.build_node("Bone").with_parent(root).build();

    let clip = AnimationClip::new("c", vec![translation_track("Bone", vec![0.0], vec![Vec3::ZERO])]);
    let bindings = Binder::bind(&scene, root, &clip);
    assert_eq!(bindings[0].node_handle, first);
}

// ============================================================================
// AnimationMixer
// ============================================================================

#[test]
fn mixer_single_action_poses_bone() {
    let (mut scene, root, hips, _) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);
    mixer.clip_action(&scene, slide_clip("a", "Hips"));

    mixer.update(0.5, &mut scene);
    let pos = scene.get_node(hips).unwrap().transform.position;
    assert!(vec3_approx(pos, Vec3::new(5.0, 0.0, 0.0)));
}

#[test]
fn mixer_partial_weight_fills_from_rest_pose() {
    let (mut scene, root, hips, _) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);
    let key = mixer.clip_action(&scene, slide_clip("a", "Hips"));
    mixer.action_mut(key).unwrap().weight = 0.5;

    mixer.update(1.0 - 1e-4, &mut scene);
    // 0.5 * ~(10,0,0) + 0.5 * rest (0,1,0)
    let pos = scene.get_node(hips).unwrap().transform.position;
    assert!((pos.x - 5.0).abs() < 1e-2, "x = {}", pos.x);
    assert!(approx(pos.y, 0.5));
}

#[test]
fn mixer_blends_two_actions_by_weight() {
    let (mut scene, root, _, spine) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);

    let up = Arc::new(AnimationClip::new(
        "up",
        vec![translation_track("Spine", vec![0.0, 1.0], vec![Vec3::Y, Vec3::Y])],
    ));
    let side = Arc::new(AnimationClip::new(
        "side",
        vec![translation_track("Spine", vec![0.0, 1.0], vec![Vec3::X, Vec3::X])],
    ));
    let a = mixer.clip_action(&scene, up);
    let b = mixer.clip_action(&scene, side);
    mixer.action_mut(a).unwrap().weight = 0.5;
    mixer.action_mut(b).unwrap().weight = 0.5;

    mixer.update(0.1, &mut scene);
    let pos = scene.get_node(spine).unwrap().transform.position;
    assert!(vec3_approx(pos, Vec3::new(0.5, 0.5, 0.0)));
}

#[test]
fn mixer_rotation_blend_is_normalized() {
    let (mut scene, root, hips, _) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);
    let clip = Arc::new(AnimationClip::new(
        "turn",
        vec![rotation_track(
            "Hips",
            vec![0.0, 1.0],
            vec![Quat::from_rotation_y(FRAC_PI_2), Quat::from_rotation_y(FRAC_PI_2)],
        )],
    ));
    let key = mixer.clip_action(&scene, clip);
    mixer.action_mut(key).unwrap().weight = 0.5;

    mixer.update(0.1, &mut scene);
    let q = scene.get_node(hips).unwrap().transform.rotation;
    assert!(approx(q.length(), 1.0));
    assert!(quat_approx(q, Quat::from_rotation_y(FRAC_PI_2 * 0.5)));
}

#[test]
fn mixer_restore_rest_pose() {
    let (mut scene, root, hips, _) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);
    mixer.clip_action(&scene, slide_clip("a", "Hips"));
    mixer.update(0.5, &mut scene);

    mixer.restore_rest_pose(&mut scene);
    let pos = scene.get_node(hips).unwrap().transform.position;
    assert!(vec3_approx(pos, Vec3::new(0.0, 1.0, 0.0)));
}

#[test]
fn mixer_ignores_disabled_actions() {
    let (mut scene, root, hips, _) = two_bone_scene();
    let mut mixer = AnimationMixer::new(root);
    let key = mixer.clip_action(&scene, slide_clip("a", "Hips"));
    mixer.action_mut(key).unwrap().enabled = false;

    mixer.update(0.5, &mut scene);
    let pos = scene.get_node(hips).unwrap().transform.position;
    assert!(vec3_approx(pos, Vec3::new(0.0, 1.0, 0.0)));
}
