use glam::Vec3;

use crate::scene::{NodeHandle, Scene};

/// Outcome of fitting an instance to the target height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationResult {
    /// Uniform scale applied to the root.
    pub scale_factor: f32,
    /// Position applied to the root.
    pub offset: Vec3,
}

impl Default for NormalizationResult {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            offset: Vec3::ZERO,
        }
    }
}

/// Scales an instance so its largest dimension equals `target_height`, then
/// centres it on X/Z and puts it on the floor.
///
/// The result is remembered per scene identity and root, so fitting the
/// same instance again (e.g. after animation moved the bones) is a no-op.
pub struct BoundsNormalizer {
    target_height: f32,
    fitted: Option<((u32, NodeHandle), NormalizationResult)>,
}

impl BoundsNormalizer {
    #[must_use]
    pub fn new(target_height: f32) -> Self {
        Self {
            target_height,
            fitted: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn target_height(&self) -> f32 {
        self.target_height
    }

    /// Result of the last fit, if any.
    #[must_use]
    pub fn last_result(&self) -> Option<NormalizationResult> {
        self.fitted.map(|(_, r)| r)
    }

    /// Fits `root` unless this exact instance was already fitted.
    pub fn fit(&mut self, scene: &mut Scene, root: NodeHandle) -> NormalizationResult {
        let identity = (scene.id, root);
        if let Some((key, result)) = self.fitted
            && key == identity
        {
            return result;
        }

        let result = self.refit(scene, root);
        self.fitted = Some((identity, result));
        result
    }

    /// Fits `root` unconditionally.
    pub fn refit(&self, scene: &mut Scene, root: NodeHandle) -> NormalizationResult {
        let Some(node) = scene.get_node_mut(root) else {
            return NormalizationResult::default();
        };
        node.transform.position = Vec3::ZERO;
        node.transform.scale = Vec3::ONE;
        scene.update_subtree(root);

        let Some(bbox) = scene.world_bounds(root) else {
            log::debug!("Nothing to fit below {root:?}");
            return NormalizationResult::default();
        };

        let max_dim = bbox.max_dimension();
        let scale_factor = if max_dim > 0.0 {
            self.target_height / max_dim
        } else {
            1.0
        };

        let center = bbox.center();
        let offset = Vec3::new(-center.x, -bbox.min.y, -center.z) * scale_factor;

        if let Some(node) = scene.get_node_mut(root) {
            node.transform.position = offset;
            node.transform.scale = Vec3::splat(scale_factor);
        }
        scene.update_subtree(root);

        log::debug!("Fitted {root:?}: scale {scale_factor}, offset {offset}");

        NormalizationResult { scale_factor, offset }
    }

    /// Forgets the remembered instance; the next [`fit`](Self::fit) recomputes.
    pub fn invalidate(&mut self) {
        self.fitted = None;
    }
}
