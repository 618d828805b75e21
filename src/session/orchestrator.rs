//! Session orchestrator
//!
//! Runs in the background context. Resolves the requesting page, opens the
//! capture surface, hands the session off once the surface has loaded, and
//! relays the finished artifact back to the requesting page.

use super::host::{BrowserHost, CreateSurfaceOptions, SurfaceClosed, SurfaceLoaded};
use super::state::{Session, SessionState};
use crate::codec::Artifact;
use crate::config::CaptureConfig;
use crate::protocol::{CaptureRequest, Envelope, Message, PageId, PageRef};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use uuid::Uuid;

/// Handle to a started session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub requesting_page: PageRef,
    pub capture_surface: PageId,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `Delivered` or `Failed`
    pub async fn wait_terminal(&mut self) -> SessionState {
        // A closed channel leaves the last published state in place.
        let _ = self.state.wait_for(|s| s.is_terminal()).await;
        *self.state.borrow()
    }
}

struct ActiveSession {
    session: Session,
    state_tx: watch::Sender<SessionState>,
}

impl ActiveSession {
    fn advance(&mut self, next: SessionState) -> CaptureResult<()> {
        self.session.advance(next)?;
        self.state_tx.send_replace(next);
        Ok(())
    }
}

pub struct SessionOrchestrator {
    host: Arc<dyn BrowserHost>,
    config: CaptureConfig,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl SessionOrchestrator {
    pub fn new(host: Arc<dyn BrowserHost>, config: CaptureConfig) -> Self {
        Self {
            host,
            config,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Snapshot of the current (or last) session
    pub fn session(&self) -> Option<Session> {
        self.active.lock().as_ref().map(|a| a.session.clone())
    }

    /// Process messages from the initiator and the capture surface until the
    /// inbox closes
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        tracing::info!("Orchestrator listening");
        while let Some(envelope) = inbox.recv().await {
            self.handle(envelope).await;
        }
        tracing::info!("Orchestrator inbox closed");
    }

    pub async fn handle(&self, envelope: Envelope) {
        tracing::debug!("Orchestrator received {}", envelope.message.name());
        match envelope.message {
            Message::StartRecording { record_audio } => {
                match self.initiate(CaptureRequest::for_active_page(record_audio)).await {
                    Ok(handle) => tracing::info!(
                        "Session {} started for {}",
                        handle.session_id,
                        handle.requesting_page.id
                    ),
                    Err(e) if e.is_silent() => tracing::info!("Session not started: {}", e),
                    Err(e) => tracing::error!("Failed to start session: {}", e),
                }
            }
            Message::CaptureStatus {
                state,
                detail,
                strategy,
            } => self.record_status(envelope.sender, state, detail, strategy),
            Message::CaptureEnded { artifact } => {
                if let Err(e) = self.relay(envelope.sender, artifact).await {
                    tracing::error!("Failed to relay artifact: {}", e);
                }
            }
            Message::StartCapture { .. } => {
                tracing::warn!("Ignoring startCapture addressed to the orchestrator");
            }
        }
    }

    /// Start a session for `request`.
    ///
    /// Returns as soon as the capture surface exists; the handoff completes in
    /// the background once the surface reports it has loaded.
    pub async fn initiate(&self, request: CaptureRequest) -> CaptureResult<SessionHandle> {
        if self.active.lock().as_ref().is_some_and(|a| a.session.is_active()) {
            return Err(CaptureError::AlreadyCapturing);
        }

        let requesting_page = self.resolve_page(request.requesting_page).await?;

        // Observers go in before the surface exists so neither event can be missed.
        let loads = self.host.subscribe_loads();
        let closes = self.host.subscribe_closes();

        let options = CreateSurfaceOptions {
            url: self.config.capture_surface_url.clone(),
            pinned: true,
            active: true,
        };
        let capture_surface = self
            .host
            .create_surface(options)
            .await
            .map_err(|e| CaptureError::SurfaceCreation(e.to_string()))?;

        let session = Session::new(requesting_page.clone(), capture_surface, request.audio_requested);
        let session_id = session.id;
        let (state_tx, state_rx) = watch::channel(SessionState::Opening);
        let progress = state_tx.subscribe();

        let raced = {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|a| a.session.is_active()) {
                true
            } else {
                let mut entry = ActiveSession { session, state_tx };
                entry.advance(SessionState::Handshaking)?;
                *active = Some(entry);
                false
            }
        };
        if raced {
            tracing::warn!("Another session started while opening {}", capture_surface);
            if let Err(e) = self.host.close(capture_surface).await {
                tracing::warn!("Failed to close surplus surface: {}", e);
            }
            return Err(CaptureError::AlreadyCapturing);
        }

        tracing::info!(
            "Opened capture surface {} for {} (audio: {})",
            capture_surface,
            requesting_page.id,
            request.audio_requested
        );

        let handoff = Handoff {
            host: self.host.clone(),
            active: self.active.clone(),
            session_id,
            capture_surface,
            message: Message::StartCapture {
                requesting_page_ref: requesting_page.clone(),
                record_audio: request.audio_requested,
            },
        };
        tokio::spawn(handoff.run(loads, closes, progress));

        Ok(SessionHandle {
            session_id,
            requesting_page,
            capture_surface,
            state: state_rx,
        })
    }

    async fn resolve_page(&self, requested: Option<PageId>) -> CaptureResult<PageRef> {
        let pages = self.host.query_active_pages().await;

        if let Some(id) = requested {
            return pages
                .into_iter()
                .find(|p| p.id == id)
                .ok_or(CaptureError::NoActivePage);
        }

        if pages.len() > 1 {
            tracing::warn!("{} active pages reported, using the first", pages.len());
        }
        pages.into_iter().next().ok_or(CaptureError::NoActivePage)
    }

    fn record_status(
        &self,
        sender: Option<PageId>,
        state: SessionState,
        detail: String,
        strategy: Option<crate::capture::StrategyUsed>,
    ) {
        let mut active = self.active.lock();
        let Some(entry) = active.as_mut() else {
            tracing::debug!("Status without a session: {}", detail);
            return;
        };
        if sender != Some(entry.session.capture_surface) {
            tracing::warn!("Ignoring status from unknown surface {:?}", sender);
            return;
        }

        if strategy.is_some() {
            entry.session.strategy_used = strategy;
        }
        entry.session.last_detail = Some(detail);

        if entry.session.state == state {
            return;
        }
        if let Err(e) = entry.advance(state) {
            tracing::debug!("Ignoring status update: {}", e);
        }
    }

    /// Forward the artifact unchanged to the requesting page
    async fn relay(&self, sender: Option<PageId>, artifact: Artifact) -> CaptureResult<()> {
        let target = {
            let active = self.active.lock();
            let entry = active
                .as_ref()
                .filter(|a| a.session.is_active())
                .ok_or_else(|| CaptureError::Platform("captureEnded without an active session".into()))?;
            if sender != Some(entry.session.capture_surface) {
                return Err(CaptureError::Platform(format!(
                    "captureEnded from unexpected sender {:?}",
                    sender
                )));
            }
            entry.session.requesting_page.id
        };

        tracing::info!(
            "Relaying {} artifact ({} chars) to {}",
            artifact.mime_type,
            artifact.encoded_data.len(),
            target
        );
        let outcome = self
            .host
            .send_message(target, Message::CaptureEnded { artifact })
            .await;

        let mut active = self.active.lock();
        if let Some(entry) = active.as_mut() {
            match &outcome {
                Ok(()) => entry.advance(SessionState::Delivered)?,
                Err(_) => entry.advance(SessionState::Failed)?,
            }
        }
        outcome.map_err(|e| CaptureError::Platform(e.to_string()))
    }
}

/// The race-free half of session start: wait for the surface's own load event,
/// then send `startCapture` exactly once. Afterwards it keeps watching the
/// surface until the session ends, failing the session if the surface goes away.
struct Handoff {
    host: Arc<dyn BrowserHost>,
    active: Arc<Mutex<Option<ActiveSession>>>,
    session_id: Uuid,
    capture_surface: PageId,
    message: Message,
}

impl Handoff {
    async fn run(
        self,
        loads: broadcast::Receiver<SurfaceLoaded>,
        mut closes: broadcast::Receiver<SurfaceClosed>,
        progress: watch::Receiver<SessionState>,
    ) {
        if !self.wait_for_load(loads, &mut closes).await {
            self.fail();
            return;
        }

        tracing::info!("Capture surface {} loaded, sending startCapture", self.capture_surface);
        if let Err(e) = self.host.send_message(self.capture_surface, self.message.clone()).await {
            tracing::error!("Failed to hand off to {}: {}", self.capture_surface, e);
            self.fail();
            return;
        }

        self.watch_surface(closes, progress).await;
    }

    /// True once the surface has loaded; false if it closed first or the host went away.
    /// The load observer is dropped on return, so it fires at most once.
    async fn wait_for_load(
        &self,
        mut loads: broadcast::Receiver<SurfaceLoaded>,
        closes: &mut broadcast::Receiver<SurfaceClosed>,
    ) -> bool {
        loop {
            tokio::select! {
                loaded = loads.recv() => match loaded {
                    Ok(event) if event.page == self.capture_surface => return true,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Load observer lagged by {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Load events closed before {} loaded", self.capture_surface);
                        return false;
                    }
                },
                closed = closes.recv() => match closed {
                    Ok(event) if event.page == self.capture_surface => {
                        tracing::warn!("Capture surface {} closed before loading", self.capture_surface);
                        return false;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Close observer lagged by {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::error!("Close events ended before {} loaded", self.capture_surface);
                        return false;
                    }
                },
            }
        }
    }

    async fn watch_surface(
        &self,
        mut closes: broadcast::Receiver<SurfaceClosed>,
        mut progress: watch::Receiver<SessionState>,
    ) {
        loop {
            tokio::select! {
                _ = progress.wait_for(|s| s.is_terminal()) => return,
                closed = closes.recv() => match closed {
                    Ok(event) if event.page == self.capture_surface => {
                        tracing::warn!("Capture surface {} closed mid-session", self.capture_surface);
                        self.fail();
                        return;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Close observer lagged by {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    fn fail(&self) {
        let mut active = self.active.lock();
        if let Some(entry) = active.as_mut().filter(|a| a.session.id == self.session_id) {
            if let Err(e) = entry.advance(SessionState::Failed) {
                tracing::debug!("Session already finished: {}", e);
            }
        }
    }
}
