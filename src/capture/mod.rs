//! Stream acquisition
//!
//! This module defines the platform capture capabilities and the strategy
//! engine that picks one of them for a session.

pub mod strategy;
pub mod traits;

pub use strategy::{CaptureStrategyEngine, StrategyUsed};
pub use traits::{
    CapturePlatform, DesktopStreamConstraints, DisplayMediaOptions, EncoderEvent, MediaEncoder,
    MediaStream, MediaTrack, PlatformError, SourceKind, TrackKind,
};
