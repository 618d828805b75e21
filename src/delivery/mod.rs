//! Artifact delivery
//!
//! Presents the finished recording in the requesting page and verifies,
//! heuristically, that it actually plays there.

pub mod overlay;
pub mod surface;
pub mod verifier;

pub use overlay::{
    download_filename, ClickTarget, DeliveryOverlay, OverlayAction, OverlayView, PageRenderer,
};
pub use surface::DeliverySurface;
pub use verifier::{BlockReason, HealthFlag, MediaEvent, PlaybackVerdict, PlaybackVerifier};
