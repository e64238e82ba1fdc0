use std::sync::Arc;

use glam::{Quat, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::animation::action::{AnimationAction, TrackValue};
use crate::animation::binder::Binder;
use crate::animation::binding::TargetPath;
use crate::animation::clip::AnimationClip;
use crate::scene::{NodeHandle, Scene};

new_key_type! {
    pub struct ActionKey;
}

/// Per-property blend accumulator.
#[derive(Debug, Clone, Copy)]
enum Accum {
    Vector3 { sum: Vec3, weight: f32 },
    Quaternion { sum: Quat, weight: f32 },
}

/// Drives the nodes below one target root from any number of actions.
///
/// Each property is the weighted sum of the actions that animate it. Weight
/// left over below 1.0 is filled from the rest pose recorded when the
/// property was first bound, so a fading-out clip eases back to rest instead
/// of freezing. Bound properties no enabled action animates sit at rest.
pub struct AnimationMixer {
    root: NodeHandle,
    actions: SlotMap<ActionKey, AnimationAction>,
    rest_pose: FxHashMap<(NodeHandle, TargetPath), TrackValue>,
}

impl AnimationMixer {
    #[must_use]
    pub fn new(root: NodeHandle) -> Self {
        Self {
            root,
            actions: SlotMap::with_key(),
            rest_pose: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Creates an action for `clip` bound against the mixer's root.
    ///
    /// The action starts enabled at weight 1.
    pub fn clip_action(&mut self, scene: &Scene, clip: Arc<AnimationClip>) -> ActionKey {
        let mut action = AnimationAction::new(clip);
        action.bindings = Binder::bind(scene, self.root, action.clip());

        for binding in &action.bindings {
            let key = (binding.node_handle, binding.target);
            if self.rest_pose.contains_key(&key) {
                continue;
            }
            if let Some(node) = scene.get_node(binding.node_handle) {
                let t = &node.transform;
                let value = match binding.target {
                    TargetPath::Translation => TrackValue::Vector3(t.position),
                    TargetPath::Rotation => TrackValue::Quaternion(t.rotation),
                    TargetPath::Scale => TrackValue::Vector3(t.scale),
                };
                self.rest_pose.insert(key, value);
            }
        }

        self.actions.insert(action)
    }

    pub fn add_action(&mut self, action: AnimationAction) -> ActionKey {
        self.actions.insert(action)
    }

    #[must_use]
    pub fn action(&self, key: ActionKey) -> Option<&AnimationAction> {
        self.actions.get(key)
    }

    pub fn action_mut(&mut self, key: ActionKey) -> Option<&mut AnimationAction> {
        self.actions.get_mut(key)
    }

    pub fn remove_action(&mut self, key: ActionKey) -> Option<AnimationAction> {
        self.actions.remove(key)
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionKey, &AnimationAction)> {
        self.actions.iter()
    }

    /// Drops every action. The rest pose is kept for the next clip.
    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Puts every bound property back to its rest value.
    pub fn restore_rest_pose(&self, scene: &mut Scene) {
        for (&(handle, target), value) in &self.rest_pose {
            if let Some(node) = scene.get_node_mut(handle) {
                apply(&mut node.transform, target, *value);
            }
        }
    }

    /// Advances every action by `dt` and writes the blended pose.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        for (_, action) in &mut self.actions {
            action.update(dt);
        }

        let mut accum: FxHashMap<(NodeHandle, TargetPath), Accum> = FxHashMap::default();

        for (_, action) in &mut self.actions {
            let weight = action.effective_weight();
            if weight <= 0.0 {
                continue;
            }

            for i in 0..action.bindings.len() {
                let binding = action.bindings[i].clone();
                let Some(value) = action.sample_track(binding.track_index) else {
                    continue;
                };
                let key = (binding.node_handle, binding.target);

                match (value, binding.target) {
                    (TrackValue::Vector3(v), TargetPath::Translation | TargetPath::Scale) => {
                        let entry = accum.entry(key).or_insert(Accum::Vector3 {
                            sum: Vec3::ZERO,
                            weight: 0.0,
                        });
                        if let Accum::Vector3 { sum, weight: w } = entry {
                            *sum += v * weight;
                            *w += weight;
                        }
                    }
                    (TrackValue::Quaternion(q), TargetPath::Rotation) => {
                        let entry = accum.entry(key).or_insert(Accum::Quaternion {
                            sum: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
                            weight: 0.0,
                        });
                        if let Accum::Quaternion { sum, weight: w } = entry {
                            accumulate_quat(sum, q, weight);
                            *w += weight;
                        }
                    }
                    _ => {}
                }
            }
        }

        // Properties no active action drives go back to rest.
        for (key @ &(handle, target), value) in &self.rest_pose {
            if !accum.contains_key(key)
                && let Some(node) = scene.get_node_mut(handle)
            {
                apply(&mut node.transform, target, *value);
            }
        }

        for (key @ (handle, target), acc) in accum {
            let rest = self.rest_pose.get(&key).copied();
            let value = match acc {
                Accum::Vector3 { mut sum, weight } => {
                    if weight < 1.0 {
                        if let Some(TrackValue::Vector3(r)) = rest {
                            sum += r * (1.0 - weight);
                        } else {
                            sum /= weight;
                        }
                    } else {
                        sum /= weight;
                    }
                    TrackValue::Vector3(sum)
                }
                Accum::Quaternion { mut sum, weight } => {
                    if weight < 1.0
                        && let Some(TrackValue::Quaternion(r)) = rest
                    {
                        accumulate_quat(&mut sum, r, 1.0 - weight);
                    }
                    TrackValue::Quaternion(sum.normalize())
                }
            };

            if let Some(node) = scene.get_node_mut(handle) {
                apply(&mut node.transform, target, value);
            }
        }
    }
}

/// Adds `q * weight` to `sum`, flipping `q` into the hemisphere of `sum`.
fn accumulate_quat(sum: &mut Quat, q: Quat, weight: f32) {
    let q = if sum.dot(q) < 0.0 { -q } else { q };
    *sum = Quat::from_vec4(glam::Vec4::from(*sum) + glam::Vec4::from(q) * weight);
}

fn apply(transform: &mut crate::scene::Transform, target: TargetPath, value: TrackValue) {
    match (target, value) {
        (TargetPath::Translation, TrackValue::Vector3(v)) => transform.position = v,
        (TargetPath::Scale, TrackValue::Vector3(v)) => transform.scale = v,
        (TargetPath::Rotation, TrackValue::Quaternion(q)) => transform.rotation = q,
        _ => {}
    }
}
