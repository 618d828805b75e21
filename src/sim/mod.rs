//! In-process platform
//!
//! Scripted implementations of the browser host, capture platform and page
//! renderer. They let a whole capture session run inside one tokio runtime.

pub mod browser;
pub mod capture;
pub mod page;

pub use browser::{LoadMode, SentMessage, SimBrowser};
pub use capture::{SimCapturePlatform, SimEncoder, SimEncoderScript, SimTrack};
pub use page::SimPage;
