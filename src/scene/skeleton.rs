use glam::{Affine3A, Vec3};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::errors::{Result, RigError};
use crate::scene::bounds::BoundingBox;
use crate::scene::{Node, NodeHandle, SkeletonKey};

/// Attaches a mesh node to a skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinBinding {
    pub skeleton: SkeletonKey,
}

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub id: Uuid,
    pub name: String,

    // Ordered bone list; bones[i] is joint index i of the skinned vertices.
    pub bones: Vec<NodeHandle>,

    // Transforms a vertex from bind-pose mesh space into bone local space.
    pub(crate) inverse_bind_matrices: Vec<Affine3A>,

    pub(crate) root_bone_index: usize,
}

impl Skeleton {
    #[must_use]
    pub fn new(
        name: &str,
        bones: Vec<NodeHandle>,
        inverse_bind_matrices: Vec<Affine3A>,
        root_bone_index: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            bones,
            inverse_bind_matrices,
            root_bone_index,
        }
    }

    /// Builds a skeleton from the current pose of `bones`.
    ///
    /// World matrices must be up to date. `mesh_world` is the world matrix of
    /// the skinned mesh at bind time.
    pub fn from_bind_pose(
        name: &str,
        bones: Vec<NodeHandle>,
        nodes: &SlotMap<NodeHandle, Node>,
        mesh_world: Affine3A,
    ) -> Result<Self> {
        let root = Self::resolve_root(&bones, nodes)?;
        let ibms = bones
            .iter()
            .map(|&b| {
                nodes
                    .get(b)
                    .map(|n| n.transform.world_matrix.inverse() * mesh_world)
                    .ok_or_else(|| RigError::InvalidSkeleton(format!("bone {b:?} is not in the scene")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(name, bones, ibms, root))
    }

    /// Index of the single bone whose parent is not itself a bone.
    ///
    /// Fails when the list is empty or the bones form more than one tree.
    pub fn resolve_root(bones: &[NodeHandle], nodes: &SlotMap<NodeHandle, Node>) -> Result<usize> {
        let mut roots = bones.iter().enumerate().filter(|&(_, b)| {
            nodes
                .get(*b)
                .and_then(|n| n.parent)
                .is_none_or(|p| !bones.contains(&p))
        });

        let Some((root, _)) = roots.next() else {
            return Err(RigError::InvalidSkeleton("skeleton has no root bone".to_string()));
        };
        if let Some((other, _)) = roots.next() {
            return Err(RigError::InvalidSkeleton(format!(
                "skeleton has more than one root bone (indices {root} and {other})"
            )));
        }
        Ok(root)
    }

    #[inline]
    #[must_use]
    pub fn root_bone(&self) -> Option<NodeHandle> {
        self.bones.get(self.root_bone_index).copied()
    }

    #[inline]
    #[must_use]
    pub fn root_bone_index(&self) -> usize {
        self.root_bone_index
    }

    #[inline]
    #[must_use]
    pub fn inverse_bind_matrices(&self) -> &[Affine3A] {
        &self.inverse_bind_matrices
    }

    #[inline]
    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Current skinning matrix per joint: `bone_world * inverse_bind`.
    ///
    /// Missing bones yield identity.
    #[must_use]
    pub fn joint_matrices(&self, nodes: &SlotMap<NodeHandle, Node>) -> Vec<Affine3A> {
        self.bones
            .iter()
            .zip(&self.inverse_bind_matrices)
            .map(|(&bone, ibm)| {
                nodes
                    .get(bone)
                    .map_or(Affine3A::IDENTITY, |n| n.transform.world_matrix * *ibm)
            })
            .collect()
    }

    /// World positions of every bone joint.
    pub fn joint_positions<'a>(&'a self, nodes: &'a SlotMap<NodeHandle, Node>) -> impl Iterator<Item = Vec3> + 'a {
        self.bones
            .iter()
            .filter_map(|&b| nodes.get(b))
            .map(|n| n.transform.world_position())
    }

    /// Tight box around the current joint positions.
    #[must_use]
    pub fn compute_tight_world_bounds(&self, nodes: &SlotMap<NodeHandle, Node>) -> Option<BoundingBox> {
        BoundingBox::from_points(self.joint_positions(nodes))
    }
}
