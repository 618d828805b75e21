//! End-to-end capture flows over the simulated platform
//!
//! Initiator -> orchestrator -> capture surface -> orchestrator -> delivery
//! surface, each running as its own task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use screen_relay_lib::capture::StrategyUsed;
use screen_relay_lib::codec;
use screen_relay_lib::delivery::{
    BlockReason, DeliverySurface, MediaEvent, OverlayAction, OverlayView, PlaybackVerdict,
};
use screen_relay_lib::recorder::StopControl;
use screen_relay_lib::session::{
    BrowserHost, CaptureSurface, Initiator, SessionOrchestrator, SessionState, StatusBoard,
};
use screen_relay_lib::sim::{LoadMode, SimBrowser, SimCapturePlatform, SimEncoderScript, SimPage};
use screen_relay_lib::{CaptureConfig, CaptureError, CaptureResult, Envelope, Message, PageId};

struct Harness {
    browser: Arc<SimBrowser>,
    platform: Arc<SimCapturePlatform>,
    orchestrator: Arc<SessionOrchestrator>,
    config: CaptureConfig,
    page: PageId,
    page_inbox: mpsc::UnboundedReceiver<Envelope>,
}

struct RunningSurface {
    id: PageId,
    stop: StopControl,
    status: Arc<StatusBoard>,
    task: JoinHandle<CaptureResult<()>>,
}

impl Harness {
    fn new() -> Self {
        let browser = SimBrowser::new(LoadMode::Deferred(Duration::from_millis(50)));
        let page = browser.open_page("https://example.com/watch");
        let page_inbox = browser.take_inbox(page).unwrap();
        let config = CaptureConfig::default();

        let orchestrator = Arc::new(SessionOrchestrator::new(browser.clone(), config.clone()));
        tokio::spawn(orchestrator.clone().run(browser.background_inbox()));

        Self {
            browser,
            platform: Arc::new(SimCapturePlatform::new()),
            orchestrator,
            config,
            page,
            page_inbox,
        }
    }

    /// Click the initiator and bring up the capture surface it causes
    async fn start(&self, record_audio: bool) -> RunningSurface {
        let mut loads = self.browser.subscribe_loads();
        Initiator::new(self.browser.clone())
            .start_recording(record_audio)
            .await
            .unwrap();

        let loaded = loads.recv().await.unwrap();
        let inbox = self.browser.take_inbox(loaded.page).unwrap();
        let surface = CaptureSurface::new(
            loaded.page,
            self.browser.clone(),
            self.platform.clone(),
            self.config.clone(),
        );

        RunningSurface {
            id: surface.id(),
            stop: surface.stop_control(),
            status: surface.status(),
            task: tokio::spawn(surface.run(inbox)),
        }
    }

    async fn wait_for_session(&self, state: SessionState) {
        for _ in 0..500 {
            if self.orchestrator.session().map(|s| s.state) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "session never reached {:?}, last: {:?}",
            state,
            self.orchestrator.session().map(|s| s.state)
        );
    }

    fn captures_delivered_to_page(&self) -> usize {
        self.browser
            .sent_messages()
            .iter()
            .filter(|m| m.target == self.page && matches!(m.message, Message::CaptureEnded { .. }))
            .count()
    }
}

async fn wait_for_status(status: &StatusBoard, prefix: &str) {
    let mut rx = status.subscribe();
    rx.wait_for(|s| s.starts_with(prefix)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn records_and_delivers_playable_video() {
    let mut harness = Harness::new();
    harness.platform.set_encoder_script(SimEncoderScript {
        chunks: vec![vec![0x1a, 0x45, 0xdf, 0xa3], vec![0x42, 0x86, 0x81, 0x01]],
        ..Default::default()
    });

    let surface = harness.start(true).await;
    wait_for_status(&surface.status, "Recording in progress").await;
    harness.wait_for_session(SessionState::Recording).await;
    assert_eq!(harness.browser.focused(), vec![harness.page]);

    assert!(surface.stop.press());
    assert!(!surface.stop.press());

    let page = SimPage::with_playback(vec![(
        Duration::from_millis(500),
        MediaEvent::LoadedMetadata { duration: 1.5 },
    )]);
    let delivery = DeliverySurface::new(page.clone(), harness.config.clone());
    let started = tokio::time::Instant::now();
    let overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(3000));
    assert_eq!(overlay.verdict(), &PlaybackVerdict::Healthy);
    assert_eq!(overlay.view(), OverlayView::Video);
    assert_eq!(page.fallback_shown(), 0);

    let artifact = overlay.artifact();
    assert_eq!(artifact.mime_type, "video/webm");
    assert!(!artifact.encoded_data.is_empty());
    assert_eq!(
        codec::decode(artifact).unwrap(),
        vec![0x1a, 0x45, 0xdf, 0xa3, 0x42, 0x86, 0x81, 0x01]
    );

    surface.task.await.unwrap().unwrap();
    assert_eq!(harness.browser.closed(), vec![surface.id]);
    assert_eq!(surface.status.current(), "Recording complete!");

    harness.wait_for_session(SessionState::Delivered).await;
    let session = harness.orchestrator.session().unwrap();
    assert_eq!(session.strategy_used, Some(StrategyUsed::DisplayMedia));
    assert!(session.audio_requested);

    assert_eq!(harness.captures_delivered_to_page(), 1);
    let tracks = harness.platform.tracks();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.stop_count() == 1));
    assert_eq!(harness.platform.encoder_stop_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn chooser_fallback_records_after_picker_rejection() {
    let mut harness = Harness::new();
    harness
        .platform
        .reject_display_media("NotAllowedError", "Permission denied by user");
    harness.platform.choose_source(Some("screen:1:0"));
    harness.platform.set_encoder_script(SimEncoderScript {
        chunks: vec![vec![5; 16]],
        flush_on_stop: Some(vec![6; 4]),
        ..Default::default()
    });

    let surface = harness.start(false).await;
    wait_for_status(&surface.status, "Recording in progress").await;
    surface.stop.press();

    let page = SimPage::with_playback(vec![(Duration::from_millis(100), MediaEvent::LoadedData)]);
    let delivery = DeliverySurface::new(page, harness.config.clone());
    let overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();
    assert!(overlay.verdict().is_healthy());
    assert_eq!(codec::decode(overlay.artifact()).unwrap().len(), 20);

    surface.task.await.unwrap().unwrap();
    harness.wait_for_session(SessionState::Delivered).await;
    assert_eq!(
        harness.orchestrator.session().unwrap().strategy_used,
        Some(StrategyUsed::DesktopChooser)
    );
    assert_eq!(
        harness.platform.calls(),
        vec!["getDisplayMedia", "chooseDesktopMedia", "getDesktopStream"]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_chooser_ends_silently() {
    let harness = Harness::new();
    harness
        .platform
        .reject_display_media("NotAllowedError", "Permission dismissed");
    harness.platform.choose_source(None);

    let surface = harness.start(false).await;
    let result = surface.task.await.unwrap();
    assert!(matches!(result, Err(CaptureError::UserCancelled)));

    harness.wait_for_session(SessionState::Failed).await;
    assert!(surface
        .status
        .history()
        .iter()
        .all(|s| !s.starts_with("Error")));
    assert_eq!(harness.platform.streams_created(), 0);
    assert_eq!(harness.captures_delivered_to_page(), 0);
}

#[tokio::test(start_paused = true)]
async fn denied_capture_is_reported_in_status() {
    let harness = Harness::new();
    harness
        .platform
        .reject_display_media("NotSupportedError", "Display capture unavailable");
    harness.platform.choose_source(Some("window:7:0"));
    harness
        .platform
        .reject_desktop_stream("NotAllowedError", "Permission denied");

    let surface = harness.start(true).await;
    let result = surface.task.await.unwrap();
    assert!(matches!(result, Err(CaptureError::CaptureDenied(_))));

    harness.wait_for_session(SessionState::Failed).await;
    assert!(surface
        .status
        .current()
        .starts_with("Error with screen capture: Capture denied"));
    assert_eq!(harness.platform.streams_created(), 0);
    assert_eq!(harness.captures_delivered_to_page(), 0);
    assert!(harness.browser.closed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_recording_goes_straight_to_fallback() {
    let mut harness = Harness::new();

    let surface = harness.start(false).await;
    wait_for_status(&surface.status, "Recording in progress").await;
    surface.stop.press();

    let page = SimPage::with_playback(vec![(Duration::from_millis(10), MediaEvent::LoadedData)]);
    let delivery = DeliverySurface::new(page.clone(), harness.config.clone());
    let mut overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();

    assert_eq!(
        overlay.verdict(),
        &PlaybackVerdict::Blocked(BlockReason::EmptyArtifact)
    );
    assert_eq!(overlay.view(), OverlayView::Fallback);
    assert_eq!(page.mounted(), vec![None]);
    assert_eq!(page.fallback_shown(), 1);

    overlay.handle(OverlayAction::Download);
    let downloads = page.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].0, "data:video/webm;base64,");
    assert!(downloads[0].1.starts_with("screen-recording-"));
    assert!(downloads[0].1.ends_with(".webm"));

    surface.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn blocked_preview_falls_back_but_keeps_download() {
    let mut harness = Harness::new();
    harness.platform.set_encoder_script(SimEncoderScript {
        chunks: vec![vec![1, 2, 3]],
        ..Default::default()
    });

    let surface = harness.start(false).await;
    wait_for_status(&surface.status, "Recording in progress").await;
    surface.stop.press();

    // The page swallows every media event
    let page = SimPage::new();
    let delivery = DeliverySurface::new(page.clone(), harness.config.clone());
    let started = tokio::time::Instant::now();
    let mut overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(overlay.verdict(), &PlaybackVerdict::Blocked(BlockReason::Timeout));
    assert_eq!(page.fallback_shown(), 1);

    // A late success signal changes nothing
    assert!(page.emit(MediaEvent::LoadedData));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(overlay.view(), OverlayView::Fallback);

    overlay.handle(OverlayAction::Download);
    assert_eq!(page.downloads().len(), 1);
    overlay.handle(OverlayAction::Close);
    assert!(page.overlay_removed());

    surface.task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_still_delivers_and_releases_tracks() {
    let mut harness = Harness::new();
    harness.platform.set_encoder_script(SimEncoderScript {
        chunks: vec![vec![9, 9, 9]],
        runtime_error: Some("SecurityError: capture blocked by policy".to_string()),
        ..Default::default()
    });

    let surface = harness.start(false).await;

    let page = SimPage::with_playback(vec![(Duration::from_millis(200), MediaEvent::LoadedData)]);
    let delivery = DeliverySurface::new(page, harness.config.clone());
    let overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();
    assert_eq!(codec::decode(overlay.artifact()).unwrap(), vec![9, 9, 9]);

    surface.task.await.unwrap().unwrap();
    assert!(surface
        .status
        .history()
        .iter()
        .any(|s| s.starts_with("Recording error: SecurityError")));
    assert!(harness.platform.tracks().iter().all(|t| t.stop_count() == 1));
    assert_eq!(harness.captures_delivered_to_page(), 1);
}

#[tokio::test(start_paused = true)]
async fn stray_capture_ended_is_not_relayed() {
    let harness = Harness::new();
    let artifact = codec::encode(&screen_relay_lib::Blob::from_chunks(&[vec![1]], "video/webm"));

    harness
        .browser
        .send_runtime_message(Some(PageId(999)), Message::CaptureEnded { artifact })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(harness.captures_delivered_to_page(), 0);
}

#[tokio::test(start_paused = true)]
async fn encoder_start_failure_still_records_strategy() {
    let mut harness = Harness::new();
    harness.platform.set_encoder_script(SimEncoderScript {
        start_error: Some("NotSupportedError: video/webm".to_string()),
        ..Default::default()
    });

    let surface = harness.start(false).await;

    let page = SimPage::new();
    let delivery = DeliverySurface::new(page.clone(), harness.config.clone());
    let overlay = delivery
        .next_delivery(&mut harness.page_inbox)
        .await
        .unwrap();
    assert_eq!(
        overlay.verdict(),
        &PlaybackVerdict::Blocked(BlockReason::EmptyArtifact)
    );

    surface.task.await.unwrap().unwrap();
    assert!(surface
        .status
        .history()
        .iter()
        .any(|s| s.starts_with("Error starting recording: EncoderError")));
    assert!(harness.browser.focused().is_empty());

    harness.wait_for_session(SessionState::Delivered).await;
    assert_eq!(
        harness.orchestrator.session().unwrap().strategy_used,
        Some(StrategyUsed::DisplayMedia)
    );
    assert!(harness.platform.tracks().iter().all(|t| t.stop_count() == 1));
}

#[tokio::test(start_paused = true)]
async fn undeliverable_artifact_fails_session_and_allows_retry() {
    let harness = Harness::new();
    harness.browser.reject_runtime_message("captureEnded");

    let surface = harness.start(false).await;
    wait_for_status(&surface.status, "Recording in progress").await;
    surface.stop.press();

    let result = surface.task.await.unwrap();
    assert!(matches!(result, Err(CaptureError::Platform(_))));
    assert!(surface
        .status
        .current()
        .starts_with("Error sending recording"));

    harness.wait_for_session(SessionState::Failed).await;
    assert_eq!(harness.captures_delivered_to_page(), 0);

    let retry = harness.start(false).await;
    assert_ne!(retry.id, surface.id);
    harness.wait_for_session(SessionState::Recording).await;
}
