//! Asset decoding.
//!
//! A caller names a source and its [`AssetKind`]; [`AssetLoader`] reads the
//! bytes through an [`AssetReaderVariant`], hands them to the matching
//! decoder and returns an [`Asset`] whose [`Prefab`] is a scene-independent
//! template.

pub mod io;
pub mod kind;
pub mod loader;
pub mod loaders;
pub mod prefab;

pub use io::{AssetReader, AssetReaderVariant, FileAssetReader};
#[cfg(feature = "http")]
pub use io::HttpAssetReader;
pub use kind::AssetKind;
pub use loader::{Asset, AssetLoader, LoadTicket, LoadTickets};
pub use loaders::{BvhLoader, GltfLoader};
pub use prefab::{Prefab, PrefabNode, PrefabSkeleton, SharedPrefab};
