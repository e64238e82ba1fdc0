use serde::{Deserialize, Serialize};

use crate::errors::{Result, RigError};

/// Declared encoding of an asset.
///
/// The kind always comes from the caller (a tag or the file extension);
/// bytes are never sniffed to pick a decoder, only to reject a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// Binary glTF container (`.glb`).
    SkinnedMeshBinary,
    /// JSON glTF with external or embedded buffers (`.gltf`).
    SkinnedMeshText,
    /// Bone hierarchy plus motion, no geometry (`.bvh`).
    HierarchyMotion,
}

impl AssetKind {
    /// Maps a bare extension (`"glb"`, `".BVH"`) to a kind.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "glb" => Ok(AssetKind::SkinnedMeshBinary),
            "gltf" => Ok(AssetKind::SkinnedMeshText),
            "bvh" => Ok(AssetKind::HierarchyMotion),
            "fbx" => Err(RigError::UnsupportedFormat(
                "fbx cannot be decoded in-process; convert it through the remote export service".to_string(),
            )),
            other => Err(RigError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Accepts a caller tag such as `"glb"`, `"model/bvh"` or `"character.gltf"`.
    pub fn from_tag(tag: &str) -> Result<Self> {
        let tail = tag.rsplit(['/', '.']).next().unwrap_or(tag);
        Self::from_extension(tail)
    }

    /// Kind from the extension of a path or URL, ignoring query and fragment.
    pub fn from_path(path: &str) -> Result<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Err(RigError::UnsupportedFormat(format!("no extension in '{file}'"))),
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            AssetKind::SkinnedMeshBinary => "glb",
            AssetKind::SkinnedMeshText => "gltf",
            AssetKind::HierarchyMotion => "bvh",
        }
    }

    /// True for kinds that carry bones but no mesh.
    #[must_use]
    pub fn is_hierarchy_only(self) -> bool {
        matches!(self, AssetKind::HierarchyMotion)
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
