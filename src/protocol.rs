//! Cross-context message contracts
//!
//! Messages are structured, asynchronous and fire-and-forget. They serialize as
//! `{ "name": ..., "body": { ... } }`.

use crate::capture::StrategyUsed;
use crate::codec::Artifact;
use crate::session::state::SessionState;
use serde::{Deserialize, Serialize};

/// Identity of a page or surface in the host browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u32);

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page#{}", self.0)
    }
}

/// Reference to the page that asked for a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub id: PageId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PageRef {
    pub fn new(id: PageId) -> Self {
        Self { id, url: None }
    }
}

/// What the initiator wants captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Page to record; `None` resolves to the active page in the focused window
    pub requesting_page: Option<PageId>,

    pub audio_requested: bool,
}

impl CaptureRequest {
    pub fn for_active_page(audio_requested: bool) -> Self {
        Self {
            requesting_page: None,
            audio_requested,
        }
    }
}

/// Messages exchanged between the initiator, orchestrator, capture surface and
/// delivery surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "name",
    content = "body",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    /// initiator -> orchestrator
    StartRecording { record_audio: bool },

    /// orchestrator -> capture surface, once, after the surface has loaded
    StartCapture {
        requesting_page_ref: PageRef,
        record_audio: bool,
    },

    /// capture surface -> orchestrator, mirrors the visible status line
    CaptureStatus {
        state: SessionState,
        detail: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        strategy: Option<StrategyUsed>,
    },

    /// capture surface -> orchestrator -> delivery surface
    CaptureEnded { artifact: Artifact },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::StartRecording { .. } => "startRecording",
            Message::StartCapture { .. } => "startCapture",
            Message::CaptureStatus { .. } => "captureStatus",
            Message::CaptureEnded { .. } => "captureEnded",
        }
    }
}

/// A delivered message together with the surface that sent it
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// `None` for the initiator and the orchestrator
    pub sender: Option<PageId>,

    pub message: Message,
}
