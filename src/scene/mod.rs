//! Scene graph
//!
//! - Node: hierarchy entry (parent/children and a transform)
//! - Transform: local TRS with cached matrices
//! - Scene: node storage plus mesh, skin and bone components
//! - Skeleton: ordered bones and inverse bind matrices
//! - TransformSystem: world matrix propagation

pub mod bounds;
pub mod mesh;
pub mod node;
pub mod scene;
pub mod skeleton;
pub mod transform;
pub mod transform_system;

pub use bounds::BoundingBox;
pub use mesh::Mesh;
pub use node::Node;
pub use scene::{NodeBuilder, Scene};
pub use skeleton::{Skeleton, SkinBinding};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct MeshKey;
    pub struct SkeletonKey;
}
