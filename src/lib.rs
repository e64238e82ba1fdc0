#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Skeletal asset normalization, animation retargeting and playback.
//!
//! A [`ModelViewer`] loads a character (glTF, GLB or a bone-only BVH),
//! turns it into an animatable, fitted working copy, retargets uploaded
//! motion onto whatever skeleton it has, plays clips with crossfades and
//! exports the result locally or through a remote conversion service.

pub mod animation;
pub mod assets;
pub mod config;
pub mod errors;
pub mod export;
pub mod normalize;
pub mod scene;
pub mod viewer;

pub use animation::{
    AnimationClip, AnimationMixer, ClipOrigin, PlaybackController, PlaybackState, RetargetOptions, RetargetOutcome,
    retarget,
};
pub use assets::{Asset, AssetKind, AssetLoader};
pub use config::{ExportConfig, ViewerConfig};
pub use errors::{Result, RigError};
pub use export::{ExportBlob, ExportOptions};
pub use normalize::NormalizationResult;
pub use scene::{NodeHandle, Scene};
pub use viewer::{ExportHandle, LoadedModel, ModelViewer};
