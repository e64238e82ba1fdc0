pub mod bvh;
pub mod gltf;

pub use bvh::BvhLoader;
pub use gltf::{GLB_MAGIC, GltfLoader};
