//! Simulated requesting page

use crate::delivery::overlay::PageRenderer;
use crate::delivery::verifier::MediaEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct PageState {
    mounted: Vec<Option<String>>,
    fallback_shown: usize,
    downloads: Vec<(String, String)>,
    removed: usize,
    events: Option<mpsc::UnboundedSender<MediaEvent>>,
}

/// Page whose playback element replays a scripted event timeline
#[derive(Default)]
pub struct SimPage {
    state: Mutex<PageState>,
    playback: Vec<(Duration, MediaEvent)>,
}

impl SimPage {
    /// A page whose video element never reports anything
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A page whose video element emits `events` at the given offsets after mounting
    pub fn with_playback(events: Vec<(Duration, MediaEvent)>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState::default()),
            playback: events,
        })
    }

    /// Push an event into the mounted playback element
    pub fn emit(&self, event: MediaEvent) -> bool {
        match &self.state.lock().events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Sources of every mount, `None` when mounted without a playback element
    pub fn mounted(&self) -> Vec<Option<String>> {
        self.state.lock().mounted.clone()
    }

    pub fn fallback_shown(&self) -> usize {
        self.state.lock().fallback_shown
    }

    pub fn downloads(&self) -> Vec<(String, String)> {
        self.state.lock().downloads.clone()
    }

    pub fn overlay_removed(&self) -> bool {
        self.state.lock().removed > 0
    }

    pub fn remove_count(&self) -> usize {
        self.state.lock().removed
    }
}

impl PageRenderer for SimPage {
    fn mount_overlay(&self, video_src: Option<&str>) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.mounted.push(video_src.map(str::to_string));

        if video_src.is_some() {
            for (delay, event) in self.playback.iter().cloned() {
                let tx = tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(event);
                });
            }
            state.events = Some(tx);
        }
        rx
    }

    fn show_fallback(&self) {
        self.state.lock().fallback_shown += 1;
    }

    fn trigger_download(&self, href: &str, filename: &str) {
        self.state
            .lock()
            .downloads
            .push((href.to_string(), filename.to_string()));
    }

    fn remove_overlay(&self) {
        let mut state = self.state.lock();
        state.removed += 1;
        state.events = None;
    }
}
