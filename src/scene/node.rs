use crate::scene::NodeHandle;
use crate::scene::transform::Transform;
use glam::Affine3A;
use smallvec::SmallVec;

/// A minimal scene node containing only essential hot data.
///
/// Names, meshes, skin bindings and the bone flag live in [`Scene`](crate::scene::Scene)'s
/// component maps so that nodes stay small and cheap to copy when a subtree
/// is cloned.
#[derive(Debug, Clone)]
pub struct Node {
    /// Parent node handle (None for root nodes)
    pub(crate) parent: Option<NodeHandle>,
    /// Child node handles, in insertion order
    pub(crate) children: SmallVec<[NodeHandle; 4]>,

    pub transform: Transform,

    pub visible: bool,
}

impl Node {
    /// Creates a new node with default transform and visibility.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: None,
            children: SmallVec::new(),
            transform: Transform::new(),
            visible: true,
        }
    }

    /// Creates a detached node with the given local transform.
    #[must_use]
    pub fn with_transform(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::new()
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Returns a reference to the world transformation matrix.
    ///
    /// Valid after the last [`Scene::update_matrix_world`](crate::scene::Scene::update_matrix_world).
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.transform.world_matrix
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}
