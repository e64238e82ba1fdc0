use glam::{Affine3A, Quat, Vec3};

/// Local pose of a node.
///
/// Animation writes `position`, `rotation` and `scale` directly. The local
/// matrix is rebuilt lazily by [`update_local_matrix`](Self::update_local_matrix),
/// which compares the pose against the one it last baked. The world matrix is
/// owned by the transform system.
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    baked: Option<(Vec3, Quat, Vec3)>,
}

impl Transform {
    #[must_use]
    pub fn new() -> Self {
        Self::from_trs(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
    }

    #[must_use]
    pub fn from_trs(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,
            baked: None,
        }
    }

    /// Rebakes the local matrix when the pose moved. Returns whether it did.
    pub fn update_local_matrix(&mut self) -> bool {
        let pose = (self.position, self.rotation, self.scale);
        if self.baked == Some(pose) {
            return false;
        }
        self.local_matrix = Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);
        self.baked = Some(pose);
        true
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    pub fn set_world_matrix(&mut self, mat: Affine3A) {
        self.world_matrix = mat;
    }

    /// Forces the next [`update_local_matrix`](Self::update_local_matrix) to rebake,
    /// e.g. after a reparent.
    pub fn mark_dirty(&mut self) {
        self.baked = None;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
