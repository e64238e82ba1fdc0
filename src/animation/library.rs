use std::sync::Arc;

use crate::animation::clip::AnimationClip;

/// How a clip entered the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrigin {
    /// Shipped inside the loaded asset.
    Embedded,
    /// Uploaded and mapped onto the asset's skeleton.
    Retargeted,
    /// Uploaded but used unmodified (no skeleton to map onto).
    Uploaded,
}

#[derive(Debug, Clone)]
pub struct ClipEntry {
    pub name: String,
    pub clip: Arc<AnimationClip>,
    pub origin: ClipOrigin,
}

/// Selectable clips of one view, in insertion order, with unique names.
#[derive(Debug, Default)]
pub struct ClipLibrary {
    entries: Vec<ClipEntry>,
}

impl ClipLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `base` if free, otherwise `"base (1)"`, `"base (2)"`, ...
    #[must_use]
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Adds `clip` under `name` (made unique) and returns the name used.
    pub fn insert(&mut self, name: &str, clip: Arc<AnimationClip>, origin: ClipOrigin) -> String {
        let name = self.unique_name(name);
        self.entries.push(ClipEntry {
            name: name.clone(),
            clip,
            origin,
        });
        name
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClipEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.entries.first().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
