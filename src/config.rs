//! Viewer Configuration
//!
//! All tunables of the pipeline live in [`ViewerConfig`]. The struct is
//! serde-(de)serializable so applications can keep it in a JSON file; every
//! field has a default, so a partial file (or `{}`) is valid.
//!
//! ```rust,ignore
//! let config = ViewerConfig::load("rigview.json")?;
//! assert_eq!(config.target_height, 2.0);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Top-level configuration of a [`ModelViewer`](crate::viewer::ModelViewer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Largest dimension of a fitted asset, in world units.
    pub target_height: f32,
    /// Fade-out / fade-in duration used when switching clips, in seconds.
    pub crossfade_seconds: f32,
    /// Edge length of the placeholder box synthesized for bone-only rigs.
    pub placeholder_size: f32,
    /// Rescale hip/root translation tracks when retargeting uploaded clips.
    pub hip_scale: bool,
    /// Start the first clip as soon as an asset is loaded.
    pub autoplay: bool,
    pub export: ExportConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            target_height: 2.0,
            crossfade_seconds: 0.3,
            placeholder_size: 0.5,
            hip_scale: true,
            autoplay: true,
            export: ExportConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Settings of the remote conversion service client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Base URL of the service API, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    pub poll_interval_ms: u64,
    /// Consecutive transport failures tolerated before polling gives up.
    pub max_consecutive_poll_failures: u32,
    /// Upper bound of the exponential back-off between failed polls.
    pub max_backoff_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            poll_interval_ms: 2000,
            max_consecutive_poll_failures: 5,
            max_backoff_ms: 16_000,
            request_timeout_secs: 30,
        }
    }
}

impl ExportConfig {
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Delay before the next poll after `failures` consecutive failures.
    ///
    /// Doubles per failure starting from the poll interval, capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.poll_interval();
        }
        let factor = 1u64 << failures.min(16);
        let ms = self
            .poll_interval_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms.max(self.poll_interval_ms));
        Duration::from_millis(ms)
    }

    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = ViewerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ViewerConfig::from_json_str(
            r#"{ "target_height": 1.5, "export": { "base_url": "http://svc/api" } }"#,
        )
        .unwrap();

        assert!((config.target_height - 1.5).abs() < 1e-6);
        assert!((config.crossfade_seconds - 0.3).abs() < 1e-6);
        assert_eq!(config.export.base_url, "http://svc/api");
        assert_eq!(config.export.poll_interval_ms, 2000);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ViewerConfig::from_json_str("{ target_height: ").is_err());
    }
}
