//! Delivery surface
//!
//! Runs inside the requesting page. Receives `captureEnded`, renders the
//! artifact and decides between inline playback and the download-only panel.

use super::overlay::{DeliveryOverlay, PageRenderer};
use super::verifier::{drain_late_events, BlockReason, HealthFlag, PlaybackVerdict, PlaybackVerifier};
use crate::codec::{self, Artifact};
use crate::config::CaptureConfig;
use crate::protocol::{Envelope, Message};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct DeliverySurface {
    renderer: Arc<dyn PageRenderer>,
    config: CaptureConfig,
}

impl DeliverySurface {
    pub fn new(renderer: Arc<dyn PageRenderer>, config: CaptureConfig) -> Self {
        Self { renderer, config }
    }

    /// Render the artifact and settle its playback health.
    ///
    /// Artifacts with no recorded bytes go straight to the fallback panel
    /// without attempting playback.
    pub async fn present(&self, artifact: Artifact) -> DeliveryOverlay {
        let precheck = match codec::decode(&artifact) {
            Ok(bytes) if bytes.is_empty() => Some(BlockReason::EmptyArtifact),
            Ok(_) => None,
            Err(e) => Some(BlockReason::Undecodable(e.to_string())),
        };

        let verdict = match precheck {
            Some(reason) => {
                tracing::warn!("Skipping inline playback: {:?}", reason);
                drop(self.renderer.mount_overlay(None));
                PlaybackVerdict::Blocked(reason)
            }
            None => {
                let mut events = self.renderer.mount_overlay(Some(artifact.encoded_data.as_str()));
                let flag = Arc::new(HealthFlag::new());
                let verifier = PlaybackVerifier::new(self.config.playback_timeout());
                let verdict = verifier.verify(&flag, &mut events).await;
                tokio::spawn(drain_late_events(flag, events));
                verdict
            }
        };

        if let Err(e) = verdict.check() {
            tracing::warn!("{} ({:?}), offering download only", e, verdict);
            self.renderer.show_fallback();
        }

        DeliveryOverlay::new(
            self.renderer.clone(),
            artifact,
            verdict,
            self.config.filename_prefix.clone(),
            self.config.container_extension.clone(),
        )
    }

    /// Wait for the next `captureEnded` and present it
    pub async fn next_delivery(
        &self,
        inbox: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> Option<DeliveryOverlay> {
        while let Some(envelope) = inbox.recv().await {
            match envelope.message {
                Message::CaptureEnded { artifact } => return Some(self.present(artifact).await),
                other => tracing::trace!("Delivery surface ignoring {}", other.name()),
            }
        }
        None
    }
}
