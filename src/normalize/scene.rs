use crate::assets::{AssetKind, Prefab};
use crate::errors::{Result, RigError};
use crate::scene::{Mesh, NodeHandle, Scene, Skeleton, SkeletonKey};

/// Name of the synthesized mesh node of a bone-only rig.
pub const PLACEHOLDER_NODE_NAME: &str = "Placeholder";

/// A working copy of an asset inside a view's scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedScene {
    /// Root of the instance; the node that gets fitted.
    pub root: NodeHandle,
    /// Node whose subtree the animation mixer drives.
    pub mixer_target: NodeHandle,
    /// Skeleton synthesized for a bone-only rig.
    pub synthesized_skeleton: Option<SkeletonKey>,
}

/// Turns a decoded template into something the mixer can drive.
pub struct SceneNormalizer {
    placeholder_size: f32,
}

impl SceneNormalizer {
    #[must_use]
    pub fn new(placeholder_size: f32) -> Self {
        Self { placeholder_size }
    }

    /// Instantiates `prefab` into `scene` below a new root named `name`.
    ///
    /// Skinned kinds are deep-cloned as-is and the clone root is the mixer
    /// target. Hierarchy-only kinds get a placeholder box whose vertices are
    /// fully weighted to the root bone, with the bone tree re-parented under
    /// it; the placeholder node is the mixer target.
    pub fn normalize(&self, scene: &mut Scene, prefab: &Prefab, kind: AssetKind, name: &str) -> Result<NormalizedScene> {
        let root = scene.instantiate(prefab, name);

        let normalized = if kind.is_hierarchy_only() {
            match self.synthesize_placeholder(scene, root) {
                Ok(n) => n,
                Err(e) => {
                    scene.remove_node(root);
                    return Err(e);
                }
            }
        } else {
            NormalizedScene {
                root,
                mixer_target: root,
                synthesized_skeleton: None,
            }
        };

        if !has_animatable_rig(scene, normalized.mixer_target) {
            log::warn!("'{name}' has no skin binding or bones; clips will not animate it");
        }

        Ok(normalized)
    }

    fn synthesize_placeholder(&self, scene: &mut Scene, root: NodeHandle) -> Result<NormalizedScene> {
        let bone_roots: Vec<NodeHandle> = scene
            .get_node(root)
            .map(|n| n.children().to_vec())
            .unwrap_or_default();
        if bone_roots.is_empty() {
            return Err(RigError::InvalidSkeleton("hierarchy has no bones".to_string()));
        }

        let mesh_node = scene.build_node(PLACEHOLDER_NODE_NAME).with_parent(root).build();
        for bone_root in bone_roots {
            scene.attach(bone_root, mesh_node);
        }
        scene.set_mesh(mesh_node, Mesh::placeholder_box(self.placeholder_size));

        // Pre-order puts the root bone first, which is the joint the box is weighted to.
        let bones: Vec<NodeHandle> = scene
            .traverse(mesh_node)
            .into_iter()
            .filter(|&h| scene.is_bone(h))
            .collect();

        scene.update_subtree(root);
        let mesh_world = scene
            .get_node(mesh_node)
            .map(|n| *n.world_matrix())
            .unwrap_or_default();
        let skeleton = Skeleton::from_bind_pose("Skeleton", bones, &scene.nodes, mesh_world)?;
        if skeleton.root_bone_index() != 0 {
            return Err(RigError::InvalidSkeleton("root bone is not the first joint".to_string()));
        }

        let key = scene.add_skeleton(skeleton);
        scene.bind_skeleton(mesh_node, key);

        Ok(NormalizedScene {
            root,
            mixer_target: mesh_node,
            synthesized_skeleton: Some(key),
        })
    }
}

/// True if the subtree of `target` holds a skin binding or at least one bone.
#[must_use]
pub fn has_animatable_rig(scene: &Scene, target: NodeHandle) -> bool {
    scene
        .traverse(target)
        .into_iter()
        .any(|h| scene.skins.contains_key(h) || scene.is_bone(h))
}
