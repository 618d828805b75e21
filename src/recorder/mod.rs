//! Recording system module
//!
//! This module implements the recorder half of a capture session:
//! - Recorder state machine and stop control
//! - Recorder lifecycle over a platform encoder

pub mod lifecycle;
pub mod state;

pub use lifecycle::Recorder;
pub use state::{RecorderState, RecordingOutput, StopControl};
