//! Recorder state management
//!
//! Defines the recorder state machine, the stop control and the recorder output.

use crate::codec::Blob;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Current state of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// Not started yet
    #[default]
    Idle,
    /// Chunks are arriving from the encoder
    Recording,
    /// Stop requested, waiting for the encoder to flush
    Stopping,
    /// Finished, successfully or not
    Stopped,
}

/// The visible stop control of the capture surface
///
/// Pressing it more than once has no further effect.
#[derive(Debug, Clone)]
pub struct StopControl {
    tx: Arc<watch::Sender<bool>>,
}

impl StopControl {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Press the control. Returns true only for the first press.
    pub fn press(&self) -> bool {
        let already = self.tx.send_replace(true);
        if already {
            tracing::debug!("Stop control pressed again, ignoring");
        }
        !already
    }

    pub fn is_pressed(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a finished recording
#[derive(Debug, Clone)]
pub struct RecordingOutput {
    /// All chunks concatenated into one container
    pub blob: Blob,

    /// Number of non-empty chunks received
    pub chunk_count: usize,

    /// Encoder error that ended the recording, if any
    pub error: Option<String>,
}

impl RecordingOutput {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
