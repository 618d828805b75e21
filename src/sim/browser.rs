//! In-memory browser host
//!
//! Routes messages between per-page inboxes and records everything it sends,
//! including whether the target had finished loading at the time.

use crate::capture::traits::PlatformError;
use crate::protocol::{Envelope, Message, PageId, PageRef};
use crate::session::host::{BrowserHost, CreateSurfaceOptions, SurfaceClosed, SurfaceLoaded};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// When a newly created surface reports load completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Before `create_surface` even returns
    Immediate,
    /// After a delay
    Deferred(Duration),
    /// Only when [`SimBrowser::complete_load`] is called
    Manual,
}

/// A message sent to a page or surface
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub target: PageId,
    pub message: Message,
    pub target_loaded: bool,
}

#[derive(Default)]
struct BrowserInner {
    next_id: u32,
    active_pages: Vec<PageRef>,
    inboxes: HashMap<PageId, mpsc::UnboundedSender<Envelope>>,
    unclaimed: HashMap<PageId, mpsc::UnboundedReceiver<Envelope>>,
    background: Option<mpsc::UnboundedSender<Envelope>>,
    loaded: HashSet<PageId>,
    closed: Vec<PageId>,
    focused: Vec<PageId>,
    created: Vec<(PageId, CreateSurfaceOptions)>,
    sent: Vec<SentMessage>,
    fail_create: Option<PlatformError>,
    rejected_runtime: HashSet<&'static str>,
}

pub struct SimBrowser {
    inner: Arc<Mutex<BrowserInner>>,
    loads: broadcast::Sender<SurfaceLoaded>,
    closes: broadcast::Sender<SurfaceClosed>,
    load_mode: LoadMode,
}

impl SimBrowser {
    pub fn new(load_mode: LoadMode) -> Arc<Self> {
        let (loads, _) = broadcast::channel(64);
        let (closes, _) = broadcast::channel(64);
        Arc::new(Self {
            inner: Arc::new(Mutex::new(BrowserInner {
                next_id: 1,
                ..Default::default()
            })),
            loads,
            closes,
            load_mode,
        })
    }

    /// Open an already-loaded page and make it the active one
    pub fn open_page(&self, url: &str) -> PageId {
        let mut inner = self.inner.lock();
        let id = Self::allocate(&mut inner);
        inner.loaded.insert(id);
        inner.active_pages = vec![PageRef {
            id,
            url: Some(url.to_string()),
        }];
        id
    }

    pub fn set_active_pages(&self, pages: Vec<PageRef>) {
        self.inner.lock().active_pages = pages;
    }

    /// Inbox of the background context
    pub fn background_inbox(&self) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().background = Some(tx);
        rx
    }

    /// Claim the inbox of a page or surface
    pub fn take_inbox(&self, page: PageId) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        self.inner.lock().unclaimed.remove(&page)
    }

    pub fn fail_surface_creation(&self, error: PlatformError) {
        self.inner.lock().fail_create = Some(error);
    }

    /// Make runtime messages with this name fail to deliver
    pub fn reject_runtime_message(&self, name: &'static str) {
        self.inner.lock().rejected_runtime.insert(name);
    }

    /// Report load completion of `page`
    pub fn complete_load(&self, page: PageId) {
        Self::mark_loaded(&self.inner, &self.loads, page);
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.lock().sent.clone()
    }

    pub fn created_surfaces(&self) -> Vec<(PageId, CreateSurfaceOptions)> {
        self.inner.lock().created.clone()
    }

    pub fn focused(&self) -> Vec<PageId> {
        self.inner.lock().focused.clone()
    }

    pub fn closed(&self) -> Vec<PageId> {
        self.inner.lock().closed.clone()
    }

    fn allocate(inner: &mut BrowserInner) -> PageId {
        let id = PageId(inner.next_id);
        inner.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        inner.inboxes.insert(id, tx);
        inner.unclaimed.insert(id, rx);
        id
    }

    fn mark_loaded(
        inner: &Mutex<BrowserInner>,
        loads: &broadcast::Sender<SurfaceLoaded>,
        page: PageId,
    ) {
        inner.lock().loaded.insert(page);
        tracing::debug!("{} finished loading", page);
        let _ = loads.send(SurfaceLoaded { page });
    }
}

#[async_trait]
impl BrowserHost for SimBrowser {
    async fn query_active_pages(&self) -> Vec<PageRef> {
        self.inner.lock().active_pages.clone()
    }

    fn subscribe_loads(&self) -> broadcast::Receiver<SurfaceLoaded> {
        self.loads.subscribe()
    }

    fn subscribe_closes(&self) -> broadcast::Receiver<SurfaceClosed> {
        self.closes.subscribe()
    }

    async fn create_surface(&self, options: CreateSurfaceOptions) -> Result<PageId, PlatformError> {
        let id = {
            let mut inner = self.inner.lock();
            if let Some(error) = inner.fail_create.clone() {
                return Err(error);
            }
            let id = Self::allocate(&mut inner);
            inner.created.push((id, options));
            id
        };

        match self.load_mode {
            LoadMode::Immediate => Self::mark_loaded(&self.inner, &self.loads, id),
            LoadMode::Deferred(delay) => {
                let inner = self.inner.clone();
                let loads = self.loads.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    Self::mark_loaded(&inner, &loads, id);
                });
            }
            LoadMode::Manual => {}
        }
        Ok(id)
    }

    async fn send_message(&self, target: PageId, message: Message) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        let target_loaded = inner.loaded.contains(&target);
        inner.sent.push(SentMessage {
            target,
            message: message.clone(),
            target_loaded,
        });

        let inbox = inner
            .inboxes
            .get(&target)
            .ok_or_else(|| PlatformError::new("Error", format!("No receiving end for {}", target)))?;
        inbox
            .send(Envelope {
                sender: None,
                message,
            })
            .map_err(|_| PlatformError::new("Error", format!("{} is gone", target)))
    }

    async fn send_runtime_message(
        &self,
        sender: Option<PageId>,
        message: Message,
    ) -> Result<(), PlatformError> {
        let inner = self.inner.lock();
        if inner.rejected_runtime.contains(message.name()) {
            return Err(PlatformError::new(
                "Error",
                "Could not establish connection. Receiving end does not exist.",
            ));
        }
        let background = inner
            .background
            .as_ref()
            .ok_or_else(|| PlatformError::new("Error", "No background context"))?;
        background
            .send(Envelope { sender, message })
            .map_err(|_| PlatformError::new("Error", "Background context is gone"))
    }

    async fn focus(&self, page: PageId) -> Result<(), PlatformError> {
        self.inner.lock().focused.push(page);
        Ok(())
    }

    async fn close(&self, page: PageId) -> Result<(), PlatformError> {
        {
            let mut inner = self.inner.lock();
            inner.inboxes.remove(&page);
            inner.unclaimed.remove(&page);
            inner.closed.push(page);
        }
        tracing::debug!("{} closed", page);
        let _ = self.closes.send(SurfaceClosed { page });
        Ok(())
    }
}
