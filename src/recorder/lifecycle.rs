//! Recorder lifecycle
//!
//! Wraps a stream in an encoder session: `Idle -> Recording -> Stopping -> Stopped`.
//! Only the stop control ends a healthy recording; encoder errors jump straight
//! to `Stopped`. Tracks are released on every exit path.

use super::state::{RecorderState, RecordingOutput};
use crate::capture::traits::{EncoderEvent, MediaEncoder, MediaStream};
use crate::codec::Blob;
use tokio::sync::{mpsc, watch};

/// A single recording over one stream
pub struct Recorder {
    state: RecorderState,
    encoder: Box<dyn MediaEncoder>,
    stream: Option<MediaStream>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
    chunks: Vec<Vec<u8>>,
    error: Option<String>,
    mime_type: String,
}

impl Recorder {
    /// Start recording `stream` immediately.
    ///
    /// If the encoder refuses to start, the recorder is returned already
    /// `Stopped` with its error recorded.
    pub fn start(
        stream: MediaStream,
        mut encoder: Box<dyn MediaEncoder>,
        mime_type: impl Into<String>,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let (state, error) = match encoder.start(&stream, tx) {
            Ok(()) => {
                tracing::info!("Recording stream {}", stream.id());
                (RecorderState::Recording, None)
            }
            Err(e) => {
                tracing::error!("Encoder failed to start: {}", e);
                (RecorderState::Stopped, Some(e.to_string()))
            }
        };

        Self {
            state,
            encoder,
            stream: Some(stream),
            events,
            chunks: Vec::new(),
            error,
            mime_type: mime_type.into(),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Ask the encoder to stop. Only has an effect while recording.
    pub fn request_stop(&mut self) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        tracing::info!("Stopping recorder ({} chunks so far)", self.chunks.len());
        self.state = RecorderState::Stopping;
        self.encoder.stop();
        true
    }

    fn handle_event(&mut self, event: Option<EncoderEvent>) {
        match event {
            Some(EncoderEvent::DataAvailable(chunk)) => {
                if !chunk.is_empty() {
                    tracing::trace!("Chunk {} ({} bytes)", self.chunks.len(), chunk.len());
                    self.chunks.push(chunk);
                }
            }
            Some(EncoderEvent::Error(message)) => {
                tracing::error!("Recorder error: {}", message);
                self.error = Some(message);
                self.state = RecorderState::Stopped;
            }
            Some(EncoderEvent::Stopped) => {
                self.state = RecorderState::Stopped;
            }
            None => {
                if self.state != RecorderState::Stopped {
                    tracing::warn!("Encoder went away without stopping");
                    self.state = RecorderState::Stopped;
                }
            }
        }
    }

    /// Drive the recorder until it stops, then produce the output.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> RecordingOutput {
        let mut stop_open = true;

        while self.state != RecorderState::Stopped {
            if self.state == RecorderState::Recording && *stop.borrow_and_update() {
                self.request_stop();
            }

            tokio::select! {
                changed = stop.changed(), if stop_open && self.state == RecorderState::Recording => {
                    if changed.is_err() {
                        tracing::warn!("Stop control dropped, stopping recorder");
                        stop_open = false;
                        self.request_stop();
                    }
                }
                event = self.events.recv() => self.handle_event(event),
            }
        }

        self.finish()
    }

    /// Release the stream and concatenate the chunks.
    ///
    /// Called once the state is `Stopped`; consumes the recorder so the
    /// chunk sequence is finalized exactly once.
    pub fn finish(mut self) -> RecordingOutput {
        self.release_stream();

        let chunks = std::mem::take(&mut self.chunks);
        let blob = Blob::from_chunks(&chunks, self.mime_type.clone());
        tracing::info!(
            "Recording finished: {} chunks, {} bytes{}",
            chunks.len(),
            blob.len(),
            if self.error.is_some() { " (with error)" } else { "" }
        );

        RecordingOutput {
            blob,
            chunk_count: chunks.len(),
            error: self.error.take(),
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.release_stream();
    }
}
