//! Normalization of freshly loaded assets.
//!
//! [`SceneNormalizer`] produces an animatable working copy of a template,
//! [`BoundsNormalizer`] fits that copy to a fixed height on the floor.

pub mod fit;
pub mod scene;

pub use fit::{BoundsNormalizer, NormalizationResult};
pub use scene::{NormalizedScene, PLACEHOLDER_NODE_NAME, SceneNormalizer, has_animatable_rig};
