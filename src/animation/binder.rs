use rustc_hash::FxHashMap;

use crate::animation::binding::PropertyBinding;
use crate::animation::clip::AnimationClip;
use crate::scene::{NodeHandle, Scene};

pub struct Binder;

impl Binder {
    /// Resolves each track's bone name against the subtree of `root`.
    ///
    /// When several nodes share a name the first in pre-order wins. Tracks
    /// naming a bone that does not exist are left unbound.
    #[must_use]
    pub fn bind(scene: &Scene, root: NodeHandle, clip: &AnimationClip) -> Vec<PropertyBinding> {
        let lookup = name_lookup(scene, root);
        let mut bindings = Vec::with_capacity(clip.tracks.len());

        for (track_index, track) in clip.tracks.iter().enumerate() {
            match lookup.get(track.meta.node_name.as_str()) {
                Some(&node_handle) => bindings.push(PropertyBinding {
                    track_index,
                    node_handle,
                    target: track.meta.target,
                }),
                None => log::debug!(
                    "Clip '{}': no node named '{}' for {} track",
                    clip.name,
                    track.meta.node_name,
                    track.meta.target.as_str()
                ),
            }
        }

        bindings
    }
}

fn name_lookup(scene: &Scene, root: NodeHandle) -> FxHashMap<&str, NodeHandle> {
    let mut map = FxHashMap::default();
    for handle in scene.traverse(root) {
        if let Some(name) = scene.name(handle) {
            map.entry(name).or_insert(handle);
        }
    }
    map
}
