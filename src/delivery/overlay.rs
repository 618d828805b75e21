//! Delivery overlay
//!
//! The modal shown in the requesting page: a playback element, a hidden
//! fallback panel, a download control and a close control.

use super::verifier::{MediaEvent, PlaybackVerdict};
use crate::codec::Artifact;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// DOM operations of the requesting page
pub trait PageRenderer: Send + Sync {
    /// Mount the overlay. With a source, a playback element bound to it is
    /// rendered and its events are returned; the fallback panel starts hidden.
    fn mount_overlay(&self, video_src: Option<&str>) -> mpsc::UnboundedReceiver<MediaEvent>;

    /// Hide the playback element and reveal the fallback panel
    fn show_fallback(&self);

    /// Click a temporary download link
    fn trigger_download(&self, href: &str, filename: &str);

    /// Tear the whole overlay down
    fn remove_overlay(&self);
}

/// What the overlay currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayView {
    Video,
    Fallback,
    Closed,
}

/// Where a click landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// The dimmed area around the modal
    Backdrop,
    /// Anywhere inside the modal
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayAction {
    Download,
    Close,
    Click(ClickTarget),
}

/// `<prefix>-<UTC ISO8601 to whole seconds, ':' as '-'>.<extension>`
pub fn download_filename(prefix: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}.{}", prefix, at.format("%Y-%m-%dT%H-%M-%S"), extension)
}

pub struct DeliveryOverlay {
    renderer: Arc<dyn PageRenderer>,
    artifact: Artifact,
    verdict: PlaybackVerdict,
    view: OverlayView,
    filename_prefix: String,
    extension: String,
}

impl DeliveryOverlay {
    pub(crate) fn new(
        renderer: Arc<dyn PageRenderer>,
        artifact: Artifact,
        verdict: PlaybackVerdict,
        filename_prefix: String,
        extension: String,
    ) -> Self {
        let view = if verdict.is_healthy() {
            OverlayView::Video
        } else {
            OverlayView::Fallback
        };
        Self {
            renderer,
            artifact,
            verdict,
            view,
            filename_prefix,
            extension,
        }
    }

    pub fn view(&self) -> OverlayView {
        self.view
    }

    pub fn verdict(&self) -> &PlaybackVerdict {
        &self.verdict
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn handle(&mut self, action: OverlayAction) {
        if self.view == OverlayView::Closed {
            tracing::debug!("Overlay already closed, ignoring {:?}", action);
            return;
        }
        match action {
            OverlayAction::Download => {
                self.download_at(Utc::now());
            }
            OverlayAction::Close | OverlayAction::Click(ClickTarget::Backdrop) => self.close(),
            OverlayAction::Click(ClickTarget::Modal) => {}
        }
    }

    /// Offer the artifact as a file; always available while the overlay is open
    pub fn download_at(&self, at: DateTime<Utc>) -> Option<String> {
        if self.view == OverlayView::Closed {
            return None;
        }
        let filename = download_filename(&self.filename_prefix, &self.extension, at);
        tracing::info!("Downloading recording as {}", filename);
        self.renderer
            .trigger_download(&self.artifact.encoded_data, &filename);
        Some(filename)
    }

    fn close(&mut self) {
        self.renderer.remove_overlay();
        self.view = OverlayView::Closed;
    }
}
