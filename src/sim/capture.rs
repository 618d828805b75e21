//! Scripted capture platform

use crate::capture::traits::{
    CapturePlatform, DesktopStreamConstraints, DisplayMediaOptions, EncoderEvent, MediaEncoder,
    MediaStream, MediaTrack, PlatformError, SourceKind, TrackKind,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Track that counts how often it was stopped
#[derive(Debug)]
pub struct SimTrack {
    kind: TrackKind,
    stops: AtomicUsize,
}

impl SimTrack {
    pub fn new(kind: TrackKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            stops: AtomicUsize::new(0),
        })
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl MediaTrack for SimTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a simulated encoder emits
#[derive(Debug, Clone, Default)]
pub struct SimEncoderScript {
    /// Chunks delivered right after start
    pub chunks: Vec<Vec<u8>>,
    /// Last chunk flushed when stopped
    pub flush_on_stop: Option<Vec<u8>>,
    /// Refuse to start
    pub start_error: Option<String>,
    /// Fail after delivering `chunks`
    pub runtime_error: Option<String>,
}

pub struct SimEncoder {
    script: SimEncoderScript,
    events: Option<mpsc::UnboundedSender<EncoderEvent>>,
    stop_calls: Arc<AtomicUsize>,
}

impl SimEncoder {
    pub fn new(script: SimEncoderScript) -> Self {
        Self::with_counter(script, Arc::new(AtomicUsize::new(0)))
    }

    fn with_counter(script: SimEncoderScript, stop_calls: Arc<AtomicUsize>) -> Self {
        Self {
            script,
            events: None,
            stop_calls,
        }
    }
}

impl MediaEncoder for SimEncoder {
    fn start(
        &mut self,
        _stream: &MediaStream,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<(), PlatformError> {
        if let Some(error) = &self.script.start_error {
            return Err(PlatformError::new("EncoderError", error.clone()));
        }
        for chunk in &self.script.chunks {
            let _ = events.send(EncoderEvent::DataAvailable(chunk.clone()));
        }
        if let Some(error) = &self.script.runtime_error {
            let _ = events.send(EncoderEvent::Error(error.clone()));
            return Ok(());
        }
        self.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(events) = self.events.take() {
            if let Some(chunk) = &self.script.flush_on_stop {
                let _ = events.send(EncoderEvent::DataAvailable(chunk.clone()));
            }
            let _ = events.send(EncoderEvent::Stopped);
        }
    }
}

struct PlatformScript {
    display: Result<(), PlatformError>,
    chooser: Option<String>,
    desktop: Result<(), PlatformError>,
    encoder: SimEncoderScript,
}

/// Capture platform driven by a script instead of real permission prompts
pub struct SimCapturePlatform {
    script: Mutex<PlatformScript>,
    calls: Mutex<Vec<&'static str>>,
    chooser_requests: Mutex<Vec<Vec<SourceKind>>>,
    tracks: Mutex<Vec<Arc<SimTrack>>>,
    streams: AtomicUsize,
    encoder_stops: Arc<AtomicUsize>,
}

impl SimCapturePlatform {
    /// Grants the primary picker and dismisses the chooser by default
    pub fn new() -> Self {
        Self {
            script: Mutex::new(PlatformScript {
                display: Ok(()),
                chooser: None,
                desktop: Ok(()),
                encoder: SimEncoderScript::default(),
            }),
            calls: Mutex::new(Vec::new()),
            chooser_requests: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
            streams: AtomicUsize::new(0),
            encoder_stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reject_display_media(&self, name: &str, message: &str) {
        self.script.lock().display = Err(PlatformError::new(name, message));
    }

    pub fn choose_source(&self, source_id: Option<&str>) {
        self.script.lock().chooser = source_id.map(str::to_string);
    }

    pub fn reject_desktop_stream(&self, name: &str, message: &str) {
        self.script.lock().desktop = Err(PlatformError::new(name, message));
    }

    pub fn set_encoder_script(&self, script: SimEncoderScript) {
        self.script.lock().encoder = script;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn chooser_requests(&self) -> Vec<Vec<SourceKind>> {
        self.chooser_requests.lock().clone()
    }

    pub fn streams_created(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    /// Every track handed out so far
    pub fn tracks(&self) -> Vec<Arc<SimTrack>> {
        self.tracks.lock().clone()
    }

    pub fn encoder_stop_calls(&self) -> usize {
        self.encoder_stops.load(Ordering::SeqCst)
    }

    fn make_stream(&self, audio: bool) -> MediaStream {
        let index = self.streams.fetch_add(1, Ordering::SeqCst);
        let mut tracks = vec![SimTrack::new(TrackKind::Video)];
        if audio {
            tracks.push(SimTrack::new(TrackKind::Audio));
        }
        self.tracks.lock().extend(tracks.iter().cloned());

        let tracks: Vec<Arc<dyn MediaTrack>> = tracks
            .into_iter()
            .map(|t| t as Arc<dyn MediaTrack>)
            .collect();
        MediaStream::new(format!("sim-stream-{}", index), tracks)
    }
}

impl Default for SimCapturePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapturePlatform for SimCapturePlatform {
    async fn get_display_media(
        &self,
        options: DisplayMediaOptions,
    ) -> Result<MediaStream, PlatformError> {
        self.calls.lock().push("getDisplayMedia");
        let outcome = self.script.lock().display.clone();
        outcome.map(|()| self.make_stream(options.audio))
    }

    async fn choose_desktop_source(&self, sources: &[SourceKind]) -> Option<String> {
        self.calls.lock().push("chooseDesktopMedia");
        self.chooser_requests.lock().push(sources.to_vec());
        self.script.lock().chooser.clone()
    }

    async fn get_desktop_stream(
        &self,
        constraints: DesktopStreamConstraints,
    ) -> Result<MediaStream, PlatformError> {
        self.calls.lock().push("getDesktopStream");
        let outcome = self.script.lock().desktop.clone();
        outcome.map(|()| self.make_stream(constraints.audio))
    }

    fn create_encoder(&self, mime_type: &str) -> Box<dyn MediaEncoder> {
        tracing::debug!("Creating simulated {} encoder", mime_type);
        let script = self.script.lock().encoder.clone();
        Box::new(SimEncoder::with_counter(script, self.encoder_stops.clone()))
    }
}
