//! Capture sessions
//!
//! The orchestrator, the capture surface and the initiator, plus the browser
//! host capabilities they share.

pub mod capture_surface;
pub mod host;
pub mod initiator;
pub mod orchestrator;
pub mod state;

pub use capture_surface::{CaptureSurface, StatusBoard};
pub use host::{BrowserHost, CreateSurfaceOptions, SurfaceClosed, SurfaceLoaded};
pub use initiator::Initiator;
pub use orchestrator::{SessionHandle, SessionOrchestrator};
pub use state::{Session, SessionState};
