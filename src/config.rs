//! Pipeline configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::capture::traits::SourceKind;
use crate::utils::error::CaptureResult;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration shared by the orchestrator, capture surface and delivery surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Internal resource loaded by the capture surface
    pub capture_surface_url: String,

    /// Mime type of the recorded container
    pub container_mime_type: String,

    /// File extension used for downloads
    pub container_extension: String,

    /// Prefix of the download filename
    pub filename_prefix: String,

    /// How long the delivery surface waits for a playback signal
    pub playback_timeout_ms: u64,

    /// How long the capture surface lingers after sending the artifact
    pub close_delay_ms: u64,

    /// Source kinds offered by the legacy desktop chooser
    pub chooser_sources: Vec<SourceKind>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_surface_url: "recording_screen.html".to_string(),
            container_mime_type: "video/webm".to_string(),
            container_extension: "webm".to_string(),
            filename_prefix: "screen-recording".to_string(),
            playback_timeout_ms: 3000,
            close_delay_ms: 1000,
            chooser_sources: vec![SourceKind::Screen, SourceKind::Window],
        }
    }
}

impl CaptureConfig {
    /// Parse a config from JSON
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> CaptureResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load a config file, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path).with_context(|| format!("Failed to load config from {:?}", path))
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_millis(self.playback_timeout_ms)
    }

    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}
