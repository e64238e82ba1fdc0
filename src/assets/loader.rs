use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::animation::clip::AnimationClip;
use crate::assets::io::AssetReaderVariant;
use crate::assets::kind::AssetKind;
use crate::assets::loaders::{BvhLoader, GltfLoader};
use crate::assets::prefab::{Prefab, SharedPrefab};
use crate::errors::{Result, RigError};

/// A decoded asset: the shared template plus where it came from.
#[derive(Debug, Clone)]
pub struct Asset {
    pub source: String,
    pub kind: AssetKind,
    pub prefab: SharedPrefab,
}

impl Asset {
    /// Clips bundled with the asset. Hierarchy-only assets carry exactly one.
    #[inline]
    #[must_use]
    pub fn clips(&self) -> &[AnimationClip] {
        &self.prefab.animations
    }
}

/// Dispatches a source to the decoder of its declared kind.
///
/// Decoded templates are cached per `(source, kind)` and shared between
/// every view that loads the same source; each view instantiates its own
/// working copy from the template.
#[derive(Clone, Default)]
pub struct AssetLoader {
    templates: Arc<Mutex<FxHashMap<(String, AssetKind), SharedPrefab>>>,
}

impl AssetLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `source` (a path or an `http(s)://` URL) as `kind`.
    pub async fn load(&self, source: &str, kind: AssetKind) -> Result<Asset> {
        let key = (source.to_string(), kind);
        if let Some(prefab) = self.templates.lock().get(&key).cloned() {
            log::debug!("Template cache hit: {source} ({kind})");
            return Ok(Asset {
                source: source.to_string(),
                kind,
                prefab,
            });
        }

        log::debug!("Loading {source} as {kind}");
        let reader = AssetReaderVariant::from_source(source)?;
        let filename = AssetReaderVariant::source_filename(source);
        let bytes = reader.read_bytes(filename).await?;

        let prefab = Self::decode(kind, bytes, Some(&reader), AssetReaderVariant::source_stem(source))
            .await
            .inspect_err(|e| log::warn!("Failed to decode {source}: {e}"))?;
        let prefab: SharedPrefab = Arc::new(prefab);

        self.templates.lock().insert(key, prefab.clone());
        log::debug!(
            "Loaded {source}: {} nodes, {} clips",
            prefab.nodes.len(),
            prefab.animations.len()
        );

        Ok(Asset {
            source: source.to_string(),
            kind,
            prefab,
        })
    }

    /// Decodes bytes that did not come from a readable source (uploads, tests).
    ///
    /// Nothing is cached. External glTF buffers cannot be resolved here.
    pub async fn load_from_bytes(&self, name: &str, bytes: Vec<u8>, kind: AssetKind) -> Result<Asset> {
        let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
        let prefab = Self::decode(kind, bytes, None, stem)
            .await
            .inspect_err(|e| log::warn!("Failed to decode {name}: {e}"))?;
        Ok(Asset {
            source: name.to_string(),
            kind,
            prefab: Arc::new(prefab),
        })
    }

    /// Drops every cached template.
    pub fn clear_cache(&self) {
        self.templates.lock().clear();
    }

    #[must_use]
    pub fn cached_templates(&self) -> usize {
        self.templates.lock().len()
    }

    /// Picks the decoder by the declared kind. Content is never sniffed.
    ///
    /// `clip_name` names the single clip of a hierarchy-only asset.
    pub async fn decode(
        kind: AssetKind,
        bytes: Vec<u8>,
        reader: Option<&AssetReaderVariant>,
        clip_name: &str,
    ) -> Result<Prefab> {
        match kind {
            AssetKind::SkinnedMeshBinary | AssetKind::SkinnedMeshText => GltfLoader::load(&bytes, kind, reader).await,
            AssetKind::HierarchyMotion => {
                let clip_name = clip_name.to_string();
                // Text parsing runs off the async threads
                tokio::task::spawn_blocking(move || {
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| RigError::decode(AssetKind::HierarchyMotion, e.to_string()))?;
                    BvhLoader::parse(text, &clip_name)
                })
                .await?
            }
        }
    }
}

/// Ticket identifying one load request of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

/// Monotonic load tickets. A decode that resolves after a newer request was
/// issued holds a stale ticket and must be discarded.
#[derive(Debug, Default)]
pub struct LoadTickets {
    latest: AtomicU64,
}

impl LoadTickets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket that supersedes every earlier one.
    pub fn issue(&self) -> LoadTicket {
        LoadTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    #[must_use]
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }
}
