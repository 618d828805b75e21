//! Capture strategy engine
//!
//! Acquires a live stream by trying the native display picker first and
//! falling back to the legacy desktop chooser when it is unavailable,
//! rejected or dismissed.

use super::traits::{
    CapturePlatform, DesktopStreamConstraints, DisplayMediaOptions, MediaStream, SourceKind,
};
use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which platform mechanism produced the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyUsed {
    /// Native screen/tab picker
    DisplayMedia,
    /// Desktop source chooser plus a constrained stream request
    DesktopChooser,
}

impl std::fmt::Display for StrategyUsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyUsed::DisplayMedia => write!(f, "display-media"),
            StrategyUsed::DesktopChooser => write!(f, "desktop-chooser"),
        }
    }
}

/// Ordered fallback over the platform capture strategies
pub struct CaptureStrategyEngine {
    platform: Arc<dyn CapturePlatform>,
    chooser_sources: Vec<SourceKind>,
}

impl CaptureStrategyEngine {
    pub fn new(platform: Arc<dyn CapturePlatform>, chooser_sources: Vec<SourceKind>) -> Self {
        Self {
            platform,
            chooser_sources,
        }
    }

    /// Acquire a stream, first success wins.
    ///
    /// The chooser is only shown when the primary picker fails, and each
    /// strategy is attempted at most once.
    pub async fn acquire_stream(
        &self,
        audio_requested: bool,
    ) -> CaptureResult<(MediaStream, StrategyUsed)> {
        let options = DisplayMediaOptions {
            audio: audio_requested,
            preferred_source: SourceKind::Tab,
        };

        match self.platform.get_display_media(options).await {
            Ok(stream) => {
                tracing::info!(
                    "Acquired stream {} via {} ({} tracks)",
                    stream.id(),
                    StrategyUsed::DisplayMedia,
                    stream.track_count()
                );
                return Ok((stream, StrategyUsed::DisplayMedia));
            }
            Err(e) => {
                tracing::warn!("Display media capture failed ({}), trying desktop chooser", e);
            }
        }

        let source_id = match self.platform.choose_desktop_source(&self.chooser_sources).await {
            Some(id) if !id.is_empty() => id,
            _ => {
                tracing::info!("Desktop chooser dismissed");
                return Err(CaptureError::UserCancelled);
            }
        };

        let constraints = DesktopStreamConstraints {
            source_id,
            audio: audio_requested,
        };
        let stream = self
            .platform
            .get_desktop_stream(constraints)
            .await
            .map_err(|e| CaptureError::CaptureDenied(e.to_string()))?;

        tracing::info!(
            "Acquired stream {} via {} ({} tracks)",
            stream.id(),
            StrategyUsed::DesktopChooser,
            stream.track_count()
        );
        Ok((stream, StrategyUsed::DesktopChooser))
    }
}
