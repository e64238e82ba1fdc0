mod values;
pub mod tracks;
pub mod clip;
pub mod action;
pub mod binding;
pub mod binder;
pub mod mixer;
pub mod retarget;
pub mod library;
pub mod playback;

pub use values::Interpolatable;
pub use clip::{AnimationClip, Track, TrackData, TrackMeta};
pub use action::{AnimationAction, LoopMode, TrackValue};
pub use mixer::{ActionKey, AnimationMixer};
pub use binder::Binder;
pub use binding::{PropertyBinding, TargetPath};
pub use tracks::{InterpolationMode, KeyframeCursor, KeyframeTrack};
pub use retarget::{
    RetargetCache, RetargetOptions, RetargetOutcome, RigBone, RigSkeleton, SkeletonId, SkeletonSource,
    locate_skeleton, retarget,
};
pub use library::{ClipEntry, ClipLibrary, ClipOrigin};
pub use playback::{PlaybackController, PlaybackState};
