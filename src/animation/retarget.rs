//! Maps clips authored for one bone naming onto another skeleton.
//!
//! Matching is name based: exact, case-insensitive, namespace-stripped, then
//! through a humanoid alias table. Rotations are copied as-is (rest poses are
//! assumed to agree), only the hip/root bone keeps its translation, and scale
//! tracks are dropped.

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::animation::Interpolatable;
use crate::animation::binding::TargetPath;
use crate::animation::clip::{AnimationClip, Track, TrackData, TrackMeta};
use crate::scene::{NodeHandle, Scene, SkeletonKey};

/// Humanoid bone groups: canonical name first, then common spellings.
const BONE_ALIASES: &[(&str, &[&str])] = &[
    ("Hips", &["Hips", "Pelvis", "Root", "Hip"]),
    ("Spine", &["Spine", "Spine1", "Spine_01"]),
    ("Spine1", &["Spine1", "Spine2", "Spine_02", "Chest"]),
    ("Spine2", &["Spine2", "Spine3", "Spine_03", "UpperChest"]),
    ("Neck", &["Neck", "Neck1"]),
    ("Head", &["Head"]),
    ("LeftUpLeg", &["LeftUpLeg", "L_Hip", "Left_Thigh", "L_Thigh", "Thigh_L"]),
    ("LeftLeg", &["LeftLeg", "L_Knee", "Left_Knee", "L_Calf", "Calf_L"]),
    ("LeftFoot", &["LeftFoot", "L_Ankle", "Left_Ankle", "L_Foot", "Foot_L"]),
    ("RightUpLeg", &["RightUpLeg", "R_Hip", "Right_Thigh", "R_Thigh", "Thigh_R"]),
    ("RightLeg", &["RightLeg", "R_Knee", "Right_Knee", "R_Calf", "Calf_R"]),
    ("RightFoot", &["RightFoot", "R_Ankle", "Right_Ankle", "R_Foot", "Foot_R"]),
    ("LeftShoulder", &["LeftShoulder", "L_Clavicle", "Left_Clavicle", "Clavicle_L"]),
    ("LeftArm", &["LeftArm", "L_Shoulder", "Left_Shoulder", "L_UpperArm", "UpperArm_L"]),
    ("LeftForeArm", &["LeftForeArm", "L_Elbow", "Left_Elbow", "L_Forearm", "Forearm_L"]),
    ("LeftHand", &["LeftHand", "L_Wrist", "Left_Wrist", "L_Hand", "Hand_L"]),
    ("RightShoulder", &["RightShoulder", "R_Clavicle", "Right_Clavicle", "Clavicle_R"]),
    ("RightArm", &["RightArm", "R_Shoulder", "Right_Shoulder", "R_UpperArm", "UpperArm_R"]),
    ("RightForeArm", &["RightForeArm", "R_Elbow", "Right_Elbow", "R_Forearm", "Forearm_R"]),
    ("RightHand", &["RightHand", "R_Wrist", "Right_Wrist", "R_Hand", "Hand_R"]),
];

/// Hip translation is only rescaled when both heights exceed this.
const MIN_HIP_HEIGHT: f32 = 0.1;

// ============================================================================
// Target skeleton
// ============================================================================

/// Where a rig's bone list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkeletonSource {
    /// Bones of the skeleton bound to the first skinned mesh.
    Skin(SkeletonKey),
    /// Bare bone nodes, identified by the first one in pre-order.
    Bones(NodeHandle),
}

/// Identity of a target skeleton, stable for the lifetime of its scene instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkeletonId {
    pub scene_id: u32,
    pub source: SkeletonSource,
}

#[derive(Debug, Clone)]
pub struct RigBone {
    pub name: String,
    pub handle: NodeHandle,
    /// Local translation at the time the rig was located.
    pub rest_translation: Vec3,
}

/// A retarget target: ordered, named bones with their rest translations.
#[derive(Debug, Clone)]
pub struct RigSkeleton {
    pub id: SkeletonId,
    pub bones: Vec<RigBone>,
}

impl RigSkeleton {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[must_use]
    pub fn bone_names(&self) -> Vec<&str> {
        self.bones.iter().map(|b| b.name.as_str()).collect()
    }

    /// Resolves a source bone name to a target bone.
    #[must_use]
    pub fn match_bone(&self, source_name: &str) -> Option<&RigBone> {
        if let Some(bone) = self.find_bone(source_name) {
            return Some(bone);
        }

        let stripped = strip_namespace(source_name);
        let lower = stripped.to_lowercase();

        // Exact alias membership first, then loose containment.
        let group = BONE_ALIASES
            .iter()
            .find(|(canonical, aliases)| {
                canonical.eq_ignore_ascii_case(stripped) || aliases.iter().any(|a| a.eq_ignore_ascii_case(stripped))
            })
            .or_else(|| {
                BONE_ALIASES
                    .iter()
                    .find(|(_, aliases)| aliases.iter().any(|a| lower.contains(&a.to_lowercase())))
            })?;

        let (canonical, aliases) = group;
        std::iter::once(canonical)
            .chain(aliases.iter())
            .find_map(|candidate| self.find_bone(candidate))
    }

    /// Exact, case-insensitive, then namespace-stripped lookup.
    fn find_bone(&self, name: &str) -> Option<&RigBone> {
        if let Some(bone) = self.bones.iter().find(|b| b.name == name) {
            return Some(bone);
        }
        if let Some(bone) = self.bones.iter().find(|b| b.name.eq_ignore_ascii_case(name)) {
            return Some(bone);
        }
        let stripped = strip_namespace(name);
        self.bones
            .iter()
            .find(|b| strip_namespace(&b.name).eq_ignore_ascii_case(stripped))
    }

    /// Hip/root test used to decide whether a translation track survives.
    #[must_use]
    pub fn is_hip(&self, bone: &RigBone) -> bool {
        let lower = bone.name.to_lowercase();
        lower.contains("hip") || lower.contains("root") || self.bones.first().is_some_and(|b| b.handle == bone.handle)
    }
}

/// `"mixamorig:Hips"` -> `"Hips"`.
fn strip_namespace(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Finds the skeleton to retarget onto below `root`.
///
/// The first node in depth-first pre-order (children in insertion order)
/// carrying both a mesh and a skin binding wins. Without one, every node
/// flagged as a bone is used, in pre-order. Returns `None` when neither exists.
#[must_use]
pub fn locate_skeleton(scene: &Scene, root: NodeHandle) -> Option<RigSkeleton> {
    let order = scene.traverse(root);

    let skinned = order.iter().find_map(|&h| {
        let binding = scene.skins.get(h)?;
        scene.mesh_of(h)?;
        let skeleton = scene.skeletons.get(binding.skeleton)?;
        (!skeleton.bones.is_empty()).then_some((binding.skeleton, skeleton))
    });

    let (source, handles): (SkeletonSource, Vec<NodeHandle>) = match skinned {
        Some((key, skeleton)) => (SkeletonSource::Skin(key), skeleton.bones.clone()),
        None => {
            let bones: Vec<NodeHandle> = order.iter().copied().filter(|&h| scene.is_bone(h)).collect();
            let first = *bones.first()?;
            (SkeletonSource::Bones(first), bones)
        }
    };

    let bones = handles
        .into_iter()
        .filter_map(|h| {
            let node = scene.get_node(h)?;
            Some(RigBone {
                name: scene.name(h).unwrap_or_default().to_string(),
                handle: h,
                rest_translation: node.transform.position,
            })
        })
        .collect();

    Some(RigSkeleton {
        id: SkeletonId {
            scene_id: scene.id,
            source,
        },
        bones,
    })
}

// ============================================================================
// Retargeting
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetargetOptions {
    /// Name of the produced clip; defaults to the source clip's name.
    pub name: Option<String>,
    pub hip_scale: bool,
}

impl Default for RetargetOptions {
    fn default() -> Self {
        Self {
            name: None,
            hip_scale: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RetargetOutcome {
    Retargeted(AnimationClip),
    /// No usable target skeleton; carries an unmodified copy of the source.
    Skipped(AnimationClip),
}

impl RetargetOutcome {
    #[must_use]
    pub fn clip(&self) -> &AnimationClip {
        match self {
            RetargetOutcome::Retargeted(c) | RetargetOutcome::Skipped(c) => c,
        }
    }

    #[must_use]
    pub fn into_clip(self) -> AnimationClip {
        match self {
            RetargetOutcome::Retargeted(c) | RetargetOutcome::Skipped(c) => c,
        }
    }

    #[must_use]
    pub fn was_skipped(&self) -> bool {
        matches!(self, RetargetOutcome::Skipped(_))
    }
}

/// Produces a new clip addressing `target`'s bones. `source` is never modified.
#[must_use]
pub fn retarget(target: Option<&RigSkeleton>, source: &AnimationClip, options: &RetargetOptions) -> RetargetOutcome {
    let Some(target) = target.filter(|t| !t.is_empty()) else {
        log::info!("Retarget skipped for '{}': target has no skeleton", source.name);
        return RetargetOutcome::Skipped(source.clone());
    };

    let mut bone_map: FxHashMap<&str, Option<&RigBone>> = FxHashMap::default();
    let mut tracks = Vec::with_capacity(source.tracks.len());

    for track in &source.tracks {
        let source_name = track.meta.node_name.as_str();
        let matched = *bone_map
            .entry(source_name)
            .or_insert_with(|| target.match_bone(source_name));

        let Some(bone) = matched else {
            log::debug!("Retarget '{}': no target bone for '{}'", source.name, source_name);
            continue;
        };

        let data = match (track.meta.target, &track.data) {
            (TargetPath::Rotation, TrackData::Quaternion(t)) => TrackData::Quaternion(t.clone()),
            (TargetPath::Translation, TrackData::Vector3(t)) => {
                if !target.is_hip(bone) {
                    continue;
                }
                let ratio = if options.hip_scale { hip_ratio(t.keyframe_value(0), bone) } else { 1.0 };
                if (ratio - 1.0).abs() > f32::EPSILON {
                    TrackData::Vector3(t.map_values(|v| v.scaled(ratio)))
                } else {
                    TrackData::Vector3(t.clone())
                }
            }
            _ => continue,
        };

        tracks.push(Track {
            meta: TrackMeta {
                node_name: bone.name.clone(),
                target: track.meta.target,
            },
            data,
        });
    }

    let name = options.name.clone().unwrap_or_else(|| source.name.clone());
    RetargetOutcome::Retargeted(AnimationClip::with_duration(name, source.duration, tracks))
}

/// `|target_rest_y / source_first_frame_y|`, or 1 when either is too small.
fn hip_ratio(first_frame: Option<Vec3>, bone: &RigBone) -> f32 {
    let Some(first) = first_frame else {
        return 1.0;
    };
    let source_y = first.y;
    let target_y = bone.rest_translation.y;
    if source_y.abs() > MIN_HIP_HEIGHT && target_y.abs() > MIN_HIP_HEIGHT {
        (target_y / source_y).abs()
    } else {
        1.0
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Retargeted clips per (source clip, target skeleton, hip scaling).
///
/// The requested name is not part of the key: a hit asked for under another
/// name comes back as a renamed copy.
#[derive(Default)]
pub struct RetargetCache {
    entries: FxHashMap<(Uuid, SkeletonId, bool), Arc<AnimationClip>>,
}

impl RetargetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result or retargets and stores it. The flag is
    /// true when retargeting was skipped; skipped outcomes are not cached.
    pub fn get_or_retarget(
        &mut self,
        target: Option<&RigSkeleton>,
        source: &AnimationClip,
        options: &RetargetOptions,
    ) -> (Arc<AnimationClip>, bool) {
        let key = target.map(|t| (source.id, t.id, options.hip_scale));

        if let Some(hit) = key.and_then(|k| self.entries.get(&k)) {
            return match &options.name {
                Some(name) if *name != hit.name => (Arc::new(hit.derive(name.clone())), false),
                _ => (hit.clone(), false),
            };
        }

        match retarget(target, source, options) {
            RetargetOutcome::Retargeted(clip) => {
                let clip = Arc::new(clip);
                if let Some(k) = key {
                    self.entries.insert(k, clip.clone());
                }
                (clip, false)
            }
            RetargetOutcome::Skipped(clip) => (Arc::new(clip), true),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
