//! Capture trait definitions
//!
//! Platform-agnostic traits for acquiring media streams and encoding them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error surfaced by a platform capture call (permission prompt, encoder, ...)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct PlatformError {
    /// Platform error name (e.g., "NotAllowedError")
    pub name: String,

    /// Human readable message
    pub message: String,
}

impl PlatformError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Kind of source a capture picker may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
    Tab,
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single live track of a platform media stream
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Stop the track and release the underlying device
    fn stop(&self);
}

/// Live media stream handed out by the platform
///
/// The stream owns its tracks. They are stopped exactly once: either through
/// [`MediaStream::stop_all_tracks`] or, as a last resort, when the stream is dropped.
pub struct MediaStream {
    id: String,
    tracks: Vec<Arc<dyn MediaTrack>>,
    released: bool,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Audio)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Stop every track. Returns false if the tracks were already stopped.
    pub fn stop_all_tracks(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        for track in &self.tracks {
            track.stop();
        }
        tracing::debug!("Stopped {} track(s) of stream {}", self.tracks.len(), self.id);
        true
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!("Stream {} dropped with live tracks, stopping them", self.id);
            self.stop_all_tracks();
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.released)
            .finish()
    }
}

/// Options for the primary display/tab capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMediaOptions {
    /// Request an audio track alongside video
    pub audio: bool,

    /// Source the native picker should preselect
    pub preferred_source: SourceKind,
}

/// Constraints binding a stream to a source picked in the desktop chooser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopStreamConstraints {
    /// Source identifier returned by the chooser
    pub source_id: String,

    /// Request desktop audio bound to the same source
    pub audio: bool,
}

/// Event emitted by a platform encoder while recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// An encoded chunk. Size and cadence are platform-determined.
    DataAvailable(Vec<u8>),

    /// The encoder failed and will produce no more data
    Error(String),

    /// The encoder flushed its last chunk and stopped
    Stopped,
}

/// Platform encoder recording one stream into a container
pub trait MediaEncoder: Send {
    /// Begin recording; events are pushed into `events` as they arrive
    fn start(
        &mut self,
        stream: &MediaStream,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), PlatformError>;

    /// Ask the encoder to flush and stop. Ends with [`EncoderEvent::Stopped`].
    fn stop(&mut self);
}

/// Capture capabilities consumed by the strategy engine and the capture surface
#[async_trait]
pub trait CapturePlatform: Send + Sync {
    /// Primary capture: native screen/tab picker returning a video(+audio) stream
    async fn get_display_media(
        &self,
        options: DisplayMediaOptions,
    ) -> Result<MediaStream, PlatformError>;

    /// Legacy desktop chooser. `None` means the user dismissed the picker.
    async fn choose_desktop_source(&self, sources: &[SourceKind]) -> Option<String>;

    /// Bind a stream to a source id returned by the desktop chooser
    async fn get_desktop_stream(
        &self,
        constraints: DesktopStreamConstraints,
    ) -> Result<MediaStream, PlatformError>;

    /// Create an encoder producing the given container mime type
    fn create_encoder(&self, mime_type: &str) -> Box<dyn MediaEncoder>;
}
