//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`RigError`] covers all failure modes including:
//! - Asset decoding errors (bytes that do not match the declared kind)
//! - Skeleton and clip lookup errors
//! - Local export encoding failures
//! - Remote conversion jobs (submission, failed jobs, polling give-up)
//!
//! Retargeting against a target without a skeleton is deliberately *not* an
//! error; see [`RetargetOutcome`](crate::animation::retarget::RetargetOutcome).
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, RigError>`.
//!
//! ```rust,ignore
//! use rigview::errors::{RigError, Result};
//!
//! fn load_asset() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::assets::AssetKind;

/// The main error type for rigview.
#[derive(Error, Debug)]
pub enum RigError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The byte stream does not match the declared asset kind.
    #[error("Failed to decode {kind:?} asset: {reason}")]
    Decode {
        /// The kind the caller declared
        kind: AssetKind,
        /// What went wrong
        reason: String,
    },

    /// The file extension or tag names an encoding this crate cannot decode.
    #[error("Unsupported asset format: {0}")]
    UnsupportedFormat(String),

    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    // ========================================================================
    // HTTP & Network Errors
    // ========================================================================
    /// HTTP request error.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing error.
    #[cfg(feature = "http")]
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// HTTP response error with status code.
    #[error("HTTP response error: status {status}")]
    HttpResponseError {
        /// HTTP status code
        status: u16,
    },

    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    GltfError(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    // ========================================================================
    // Rig & Animation Errors
    // ========================================================================
    /// The bone set does not form a single-rooted tree.
    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    /// No clip with that name is registered.
    #[error("Unknown animation clip: {0}")]
    UnknownClip(String),

    /// Playback was requested before any asset provided a mixer target.
    #[error("No animation target loaded")]
    NoAnimationTarget,

    // ========================================================================
    // Export Errors
    // ========================================================================
    /// Local container encoding failed.
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// The remote service rejected the file before queueing a job.
    #[error("Invalid export input: {0}")]
    InvalidExportInput(String),

    /// The remote job reached the `failed` state. The reason is the service's own.
    #[error("Remote job failed: {0}")]
    RemoteJobFailed(String),

    /// Status polling gave up after too many consecutive transport failures.
    #[error("Polling gave up after {attempts} consecutive failures: {last_error}")]
    PollFailed {
        /// Number of consecutive failed polls
        attempts: u32,
        /// The last transport error observed
        last_error: String,
    },

    /// The operation was cancelled by its owner.
    #[error("Operation cancelled")]
    Cancelled,

    // ========================================================================
    // Async & Threading Errors
    // ========================================================================
    /// Task join error (when async tasks fail to complete).
    #[error("Task join error: {0}")]
    TaskJoinError(String),
}

impl RigError {
    /// Shorthand for a [`RigError::Decode`].
    pub fn decode(kind: AssetKind, reason: impl Into<String>) -> Self {
        RigError::Decode {
            kind,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<gltf::Error> for RigError {
    fn from(err: gltf::Error) -> Self {
        RigError::GltfError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RigError {
    fn from(err: tokio::task::JoinError) -> Self {
        RigError::TaskJoinError(err.to_string())
    }
}

/// Alias for `Result<T, RigError>`.
pub type Result<T> = std::result::Result<T, RigError>;
