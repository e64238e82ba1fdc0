use glam::{Quat, Vec3};
use uuid::Uuid;

use crate::animation::binding::TargetPath;
use crate::animation::tracks::KeyframeTrack;

/// Which bone a track drives and which channel of it.
///
/// The bone is referenced by name only; it is resolved against a concrete
/// skeleton when the clip is bound, never when the clip is built.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMeta {
    pub node_name: String,
    pub target: TargetPath,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackData {
    Vector3(KeyframeTrack<Vec3>),
    Quaternion(KeyframeTrack<Quat>),
}

impl TrackData {
    #[must_use]
    pub fn end_time(&self) -> f32 {
        match self {
            TrackData::Vector3(track) => track.end_time(),
            TrackData::Quaternion(track) => track.end_time(),
        }
    }

    /// Stored values and the count the keyframes call for.
    #[must_use]
    pub fn value_counts(&self) -> (usize, usize) {
        match self {
            TrackData::Vector3(track) => (track.values.len(), track.expected_value_count()),
            TrackData::Quaternion(track) => (track.values.len(), track.expected_value_count()),
        }
    }

    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        match self {
            TrackData::Vector3(track) => track.times.len(),
            TrackData::Quaternion(track) => track.times.len(),
        }
    }
}

/// One animated channel: metadata plus keyframes.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub meta: TrackMeta,
    pub data: TrackData,
}

/// A named set of tracks.
///
/// `id` identifies this clip object for caching purposes; cloning keeps it,
/// deriving a new clip through [`AnimationClip::new`] or
/// [`AnimationClip::derive`] issues a fresh one.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub id: Uuid,
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    /// Builds a clip; the duration is the latest keyframe of any track.
    #[must_use]
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .map(|t| t.data.end_time())
            .fold(0.0_f32, f32::max);

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// Builds a clip with an explicit duration (e.g. one inherited from the
    /// clip it was derived from).
    #[must_use]
    pub fn with_duration(name: impl Into<String>, duration: f32, tracks: Vec<Track>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            duration,
            tracks,
        }
    }

    /// Deep copy with a new identity.
    #[must_use]
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            duration: self.duration,
            tracks: self.tracks.clone(),
        }
    }

    /// Distinct bone names addressed by the tracks, in first-seen order.
    #[must_use]
    pub fn bone_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for track in &self.tracks {
            if !names.contains(&track.meta.node_name.as_str()) {
                names.push(&track.meta.node_name);
            }
        }
        names
    }

    /// Track data equality, ignoring identity and name.
    #[must_use]
    pub fn same_tracks(&self, other: &AnimationClip) -> bool {
        self.tracks == other.tracks && (self.duration - other.duration).abs() <= f32::EPSILON
    }
}
