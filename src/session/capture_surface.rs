//! Capture surface
//!
//! The dedicated context that acquires the stream, records it until the user
//! presses stop, and sends the finished artifact back to the orchestrator.

use super::host::BrowserHost;
use super::state::SessionState;
use crate::capture::{CapturePlatform, CaptureStrategyEngine, StrategyUsed};
use crate::codec;
use crate::config::CaptureConfig;
use crate::protocol::{Envelope, Message, PageId, PageRef};
use crate::recorder::{Recorder, RecorderState, StopControl};
use crate::utils::error::{CaptureError, CaptureResult, ErrorResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// The user-visible status line of the capture surface
pub struct StatusBoard {
    current: watch::Sender<String>,
    history: Mutex<Vec<String>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (current, _) = watch::channel(String::new());
        Self {
            current,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("Status: {}", text);
        self.history.lock().push(text.clone());
        self.current.send_replace(text);
    }

    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CaptureSurface {
    id: PageId,
    host: Arc<dyn BrowserHost>,
    platform: Arc<dyn CapturePlatform>,
    config: CaptureConfig,
    status: Arc<StatusBoard>,
    stop: StopControl,
}

impl CaptureSurface {
    pub fn new(
        id: PageId,
        host: Arc<dyn BrowserHost>,
        platform: Arc<dyn CapturePlatform>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            id,
            host,
            platform,
            config,
            status: Arc::new(StatusBoard::new()),
            stop: StopControl::new(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    /// The stop button shown while recording
    pub fn stop_control(&self) -> StopControl {
        self.stop.clone()
    }

    pub fn status(&self) -> Arc<StatusBoard> {
        self.status.clone()
    }

    /// Wait for `startCapture` and run the one session this surface exists for
    pub async fn run(self, mut inbox: mpsc::UnboundedReceiver<Envelope>) -> CaptureResult<()> {
        while let Some(envelope) = inbox.recv().await {
            match envelope.message {
                Message::StartCapture {
                    requesting_page_ref,
                    record_audio,
                } => {
                    // Later startCapture messages have nobody reading the inbox.
                    drop(inbox);
                    return self.capture(requesting_page_ref, record_audio).await;
                }
                other => tracing::debug!("Capture surface ignoring {}", other.name()),
            }
        }
        tracing::warn!("Capture surface {} closed before startCapture", self.id);
        Ok(())
    }

    async fn capture(&self, page: PageRef, record_audio: bool) -> CaptureResult<()> {
        self.status.set("Starting screen capture...");
        self.report(SessionState::Capturing, None).await;

        let engine = CaptureStrategyEngine::new(self.platform.clone(), self.config.chooser_sources.clone());
        let (stream, strategy) = match engine.acquire_stream(record_audio).await {
            Ok(acquired) => acquired,
            Err(e) => {
                if e.is_silent() {
                    tracing::info!("Capture cancelled by the user");
                } else {
                    let response = ErrorResponse::from(&e);
                    self.status.set(format!("Error with screen capture: {}", response.message));
                }
                self.report(SessionState::Failed, Some(&e)).await;
                return Err(e);
            }
        };

        self.status.set("Screen capture successful, starting recording...");
        let encoder = self.platform.create_encoder(&self.config.container_mime_type);
        let recorder = Recorder::start(stream, encoder, self.config.container_mime_type.clone());

        if recorder.state() == RecorderState::Recording {
            self.status.set("Recording in progress... Click stop when done.");
            self.report_with_strategy(SessionState::Recording, strategy).await;

            if let Err(e) = self.host.focus(page.id).await {
                tracing::warn!("Could not refocus {}: {}", page.id, e);
            }
        } else if let Some(error) = recorder.error() {
            self.status.set(format!("Error starting recording: {}", error));
        }

        let output = recorder.run(self.stop.subscribe()).await;
        if let Some(error) = &output.error {
            let e = CaptureError::RecorderFailure(error.clone());
            tracing::warn!("{}; delivering {} captured bytes", e, output.blob.len());
            self.status.set(format!("Recording error: {}", error));
        }
        self.report_with_strategy(SessionState::Stopping, strategy).await;

        self.status.set("Processing recording...");
        let artifact = match codec::encode_blocking(output.blob).await {
            Ok(artifact) => artifact,
            Err(e) => {
                self.status.set(format!("Error processing recording: {}", e));
                self.report(SessionState::Failed, Some(&e)).await;
                return Err(e);
            }
        };

        self.status.set("Sending recording to original tab...");
        if let Err(e) = self
            .host
            .send_runtime_message(Some(self.id), Message::CaptureEnded { artifact })
            .await
        {
            tracing::error!("Failed to send captureEnded: {}", e);
            self.status.set(format!("Error sending recording: {}", e));
            let error = CaptureError::Platform(e.to_string());
            self.report(SessionState::Failed, Some(&error)).await;
            return Err(error);
        }

        self.status.set("Recording complete!");
        tokio::time::sleep(self.config.close_delay()).await;
        if let Err(e) = self.host.close(self.id).await {
            tracing::warn!("Capture surface {} failed to close: {}", self.id, e);
        }
        Ok(())
    }

    async fn report(&self, state: SessionState, error: Option<&CaptureError>) {
        let detail = match error {
            Some(e) => ErrorResponse::from(e).code,
            None => self.status.current(),
        };
        self.send_status(state, detail, None).await;
    }

    async fn report_with_strategy(&self, state: SessionState, strategy: StrategyUsed) {
        self.send_status(state, self.status.current(), Some(strategy)).await;
    }

    async fn send_status(&self, state: SessionState, detail: String, strategy: Option<StrategyUsed>) {
        let message = Message::CaptureStatus {
            state,
            detail,
            strategy,
        };
        if let Err(e) = self.host.send_runtime_message(Some(self.id), message).await {
            tracing::debug!("Status update not delivered: {}", e);
        }
    }
}
