//! Initiator surface
//!
//! The popup only reads the audio preference and asks the orchestrator to start.

use super::host::BrowserHost;
use crate::protocol::Message;
use crate::utils::error::{CaptureError, CaptureResult};
use std::sync::Arc;

pub struct Initiator {
    host: Arc<dyn BrowserHost>,
}

impl Initiator {
    pub fn new(host: Arc<dyn BrowserHost>) -> Self {
        Self { host }
    }

    /// Send `startRecording` to the orchestrator
    pub async fn start_recording(&self, record_audio: bool) -> CaptureResult<()> {
        tracing::debug!("Requesting recording (audio: {})", record_audio);
        self.host
            .send_runtime_message(None, Message::StartRecording { record_audio })
            .await
            .map_err(|e| CaptureError::Platform(e.to_string()))
    }
}
