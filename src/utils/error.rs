//! Error types and handling
//!
//! Common error types used across the capture pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No active page to record")]
    NoActivePage,

    #[error("Capture cancelled by user")]
    UserCancelled,

    #[error("Capture denied: {0}")]
    CaptureDenied(String),

    #[error("Recorder failure: {0}")]
    RecorderFailure(String),

    #[error("Playback blocked by the host page")]
    PlaybackBlocked,

    #[error("Failed to create capture surface: {0}")]
    SurfaceCreation(String),

    #[error("A capture session is already active")]
    AlreadyCapturing,

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Artifact decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Platform error: {0}")]
    Platform(String),
}

impl CaptureError {
    /// Stable code for status text and logs
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::NoActivePage => "NO_ACTIVE_PAGE",
            CaptureError::UserCancelled => "USER_CANCELLED",
            CaptureError::CaptureDenied(_) => "CAPTURE_DENIED",
            CaptureError::RecorderFailure(_) => "RECORDER_FAILURE",
            CaptureError::PlaybackBlocked => "PLAYBACK_BLOCKED",
            CaptureError::SurfaceCreation(_) => "SURFACE_CREATION",
            CaptureError::AlreadyCapturing => "ALREADY_CAPTURING",
            CaptureError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CaptureError::Decode(_) => "DECODE_ERROR",
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
            CaptureError::Platform(_) => "PLATFORM_ERROR",
        }
    }

    /// Cancellation ends a session without anything to report
    pub fn is_silent(&self) -> bool {
        matches!(self, CaptureError::UserCancelled)
    }
}

/// Error payload shown to the user as status text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&CaptureError> for ErrorResponse {
    fn from(error: &CaptureError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response = ErrorResponse::from(CaptureError::CaptureDenied("Permission denied".into()));
        assert_eq!(response.code, "CAPTURE_DENIED");
        assert_eq!(response.message, "Capture denied: Permission denied");
    }

    #[test]
    fn test_only_cancellation_is_silent() {
        assert!(CaptureError::UserCancelled.is_silent());
        assert!(!CaptureError::NoActivePage.is_silent());
        assert!(!CaptureError::RecorderFailure("boom".into()).is_silent());
    }
}
