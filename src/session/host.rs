//! Browser host capabilities
//!
//! The orchestrator and the surfaces only talk to the browser through this trait.

use crate::capture::traits::PlatformError;
use crate::protocol::{Message, PageId, PageRef};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A surface finished loading its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLoaded {
    pub page: PageId,
}

/// A surface was closed, by itself or by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceClosed {
    pub page: PageId,
}

/// How a new surface is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSurfaceOptions {
    /// Internal resource to load
    pub url: String,
    pub pinned: bool,
    /// Bring the surface to the foreground
    pub active: bool,
}

#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Active pages of the last focused window
    async fn query_active_pages(&self) -> Vec<PageRef>;

    /// Observe load completion of every surface.
    ///
    /// Dropping the receiver deregisters the observer.
    fn subscribe_loads(&self) -> broadcast::Receiver<SurfaceLoaded>;

    /// Observe every surface that goes away
    fn subscribe_closes(&self) -> broadcast::Receiver<SurfaceClosed>;

    /// Open a new, empty surface loading `options.url`
    async fn create_surface(&self, options: CreateSurfaceOptions) -> Result<PageId, PlatformError>;

    /// Deliver a message to one page or surface
    async fn send_message(&self, target: PageId, message: Message) -> Result<(), PlatformError>;

    /// Deliver a message to the background orchestrator
    async fn send_runtime_message(
        &self,
        sender: Option<PageId>,
        message: Message,
    ) -> Result<(), PlatformError>;

    /// Bring a page back to the foreground
    async fn focus(&self, page: PageId) -> Result<(), PlatformError>;

    /// Close a surface
    async fn close(&self, page: PageId) -> Result<(), PlatformError>;
}
