use std::sync::Arc;

use glam::Affine3A;

use crate::animation::clip::AnimationClip;
use crate::scene::mesh::Mesh;
use crate::scene::transform::Transform;

/// Prefab node: plain data, children referenced by index.
#[derive(Debug, Clone)]
pub struct PrefabNode {
    pub name: Option<String>,
    pub transform: Transform,
    /// Indices into `Prefab::nodes`
    pub children_indices: Vec<usize>,
    pub mesh: Option<Mesh>,
    /// Index into `Prefab::skeletons`
    pub skin_index: Option<usize>,
    /// Part of a bone hierarchy (joint of a skin, or a motion-capture joint)
    pub is_bone: bool,
}

impl PrefabNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: None,
            transform: Transform::new(),
            children_indices: Vec::new(),
            mesh: None,
            skin_index: None,
            is_bone: false,
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }
}

impl Default for PrefabNode {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct PrefabSkeleton {
    pub name: String,
    /// Index into `bone_indices` of the root bone
    pub root_bone_index: usize,
    /// Indices into `Prefab::nodes`
    pub bone_indices: Vec<usize>,
    pub inverse_bind_matrices: Vec<Affine3A>,
}

/// Decoded asset template.
///
/// A prefab holds no scene handles and is never mutated after decoding, so
/// one instance can be shared between views and instantiated into each of
/// them with [`Scene::instantiate`](crate::scene::Scene::instantiate).
#[derive(Debug, Clone, Default)]
pub struct Prefab {
    pub nodes: Vec<PrefabNode>,
    pub root_indices: Vec<usize>,
    pub skeletons: Vec<PrefabSkeleton>,
    pub animations: Vec<AnimationClip>,
}

impl Prefab {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a node and returns its index.
    pub fn add_node(&mut self, node: PrefabNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.mesh.is_some()).count()
    }

    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_bone).count()
    }

    #[must_use]
    pub fn has_skinned_mesh(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n.skin_index.is_some() && n.mesh.as_ref().is_some_and(Mesh::is_skinned))
    }

    #[must_use]
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.as_deref() == Some(name))
    }
}

/// Thread-safe prefab reference.
pub type SharedPrefab = Arc<Prefab>;
