//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use glam::{Affine3A, Quat, Vec3, Vec4};

use rigview::animation::{AnimationClip, InterpolationMode, KeyframeTrack, TargetPath, Track, TrackData, TrackMeta};
use rigview::assets::{Prefab, PrefabNode, PrefabSkeleton};
use rigview::scene::{Mesh, Transform};

pub const EPSILON: f32 = 1e-5;

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

pub fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

/// Same rotation, either sign.
pub fn quat_approx(a: Quat, b: Quat) -> bool {
    a.dot(b).abs() > 1.0 - EPSILON
}

/// Two-joint BVH: Hips at y = 1 with a Spine above it, two frames 0.5s apart.
pub const WALK_BVH: &str = "HIERARCHY
ROOT Hips
{
  OFFSET 0 1 0
  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
  JOINT Spine
  {
    OFFSET 0 0.5 0
    CHANNELS 3 Zrotation Xrotation Yrotation
    End Site
    {
      OFFSET 0 0.3 0
    }
  }
}
MOTION
Frames: 2
Frame Time: 0.5
0 0 0 0 0 0 0 0 0
1 2 3 0 90 0 0 0 45
";

/// A box spanning `min..max`, every vertex fully weighted to `joint`.
pub fn skinned_box(name: &str, min: Vec3, max: Vec3, joint: u16) -> Mesh {
    let positions: Vec<Vec3> = (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
        .collect();
    let count = positions.len();
    Mesh {
        name: name.to_string(),
        positions,
        joints: vec![[joint, 0, 0, 0]; count],
        weights: vec![Vec4::new(1.0, 0.0, 0.0, 0.0); count],
        indices: vec![0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6],
    }
}

pub fn translation_track(bone: &str, times: Vec<f32>, values: Vec<Vec3>) -> Track {
    Track {
        meta: TrackMeta {
            node_name: bone.to_string(),
            target: TargetPath::Translation,
        },
        data: TrackData::Vector3(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
    }
}

pub fn rotation_track(bone: &str, times: Vec<f32>, values: Vec<Quat>) -> Track {
    Track {
        meta: TrackMeta {
            node_name: bone.to_string(),
            target: TargetPath::Rotation,
        },
        data: TrackData::Quaternion(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
    }
}

pub fn scale_track(bone: &str, times: Vec<f32>, values: Vec<Vec3>) -> Track {
    Track {
        meta: TrackMeta {
            node_name: bone.to_string(),
            target: TargetPath::Scale,
        },
        data: TrackData::Vector3(KeyframeTrack::new(times, values, InterpolationMode::Linear)),
    }
}

/// One-second clip turning `bone` a quarter turn around Y.
pub fn turn_clip(name: &str, bone: &str) -> AnimationClip {
    AnimationClip::new(
        name,
        vec![rotation_track(
            bone,
            vec![0.0, 1.0],
            vec![Quat::IDENTITY, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)],
        )],
    )
}

/// A skinned character:
///
/// ```text
/// Armature (1, 0.5, 0)
/// ├── Hips (0, 1, 0)       bone 0
/// │   └── Spine (0, 0.5, 0) bone 1
/// └── Body                 skinned box (-0.3, 0, -0.2)..(0.3, 1.8, 0.2) on Hips
/// ```
///
/// Carries two embedded clips, `Wave` (Spine) and `Idle` (Hips).
pub fn character_prefab() -> Prefab {
    let mut prefab = Prefab::new();

    let armature = prefab.add_node(PrefabNode {
        transform: Transform::from_trs(Vec3::new(1.0, 0.5, 0.0), Quat::IDENTITY, Vec3::ONE),
        ..PrefabNode::named("Armature")
    });
    let hips = prefab.add_node(PrefabNode {
        transform: Transform::from_trs(Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
        is_bone: true,
        ..PrefabNode::named("Hips")
    });
    let spine = prefab.add_node(PrefabNode {
        transform: Transform::from_trs(Vec3::new(0.0, 0.5, 0.0), Quat::IDENTITY, Vec3::ONE),
        is_bone: true,
        ..PrefabNode::named("Spine")
    });
    let body = prefab.add_node(PrefabNode {
        mesh: Some(skinned_box("Body", Vec3::new(-0.3, 0.0, -0.2), Vec3::new(0.3, 1.8, 0.2), 0)),
        skin_index: Some(0),
        ..PrefabNode::named("Body")
    });

    prefab.nodes[armature].children_indices = vec![hips, body];
    prefab.nodes[hips].children_indices = vec![spine];
    prefab.root_indices = vec![armature];

    prefab.skeletons.push(PrefabSkeleton {
        name: "Armature".to_string(),
        root_bone_index: 0,
        bone_indices: vec![hips, spine],
        inverse_bind_matrices: vec![
            Affine3A::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            Affine3A::from_translation(Vec3::new(0.0, -1.5, 0.0)),
        ],
    });

    prefab.animations.push(turn_clip("Wave", "Spine"));
    prefab.animations.push(AnimationClip::new(
        "Idle",
        vec![translation_track(
            "Hips",
            vec![0.0, 2.0],
            vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.1, 0.0)],
        )],
    ));

    prefab
}

/// A static prop: one rigid box, no bones, no clips.
pub fn prop_prefab() -> Prefab {
    let mut prefab = Prefab::new();
    let mut mesh = skinned_box("Crate", Vec3::splat(-2.0), Vec3::splat(2.0), 0);
    mesh.joints.clear();
    mesh.weights.clear();
    let node = prefab.add_node(PrefabNode {
        mesh: Some(mesh),
        ..PrefabNode::named("Crate")
    });
    prefab.root_indices = vec![node];
    prefab
}
