//! Session state management
//!
//! A session moves forward only; `Failed` is absorbing and reachable from any
//! non-terminal state.

use crate::capture::StrategyUsed;
use crate::protocol::{PageId, PageRef};
use crate::utils::error::{CaptureError, CaptureResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Capture surface is being created
    Opening,
    /// Waiting for the capture surface to load before handing off
    Handshaking,
    /// Acquiring a stream
    Capturing,
    /// Encoder running
    Recording,
    /// Stop pressed, finishing the artifact
    Stopping,
    /// Artifact relayed to the requesting page
    Delivered,
    /// Ended without a delivered artifact
    Failed,
}

impl SessionState {
    fn rank(self) -> u8 {
        match self {
            SessionState::Opening => 0,
            SessionState::Handshaking => 1,
            SessionState::Capturing => 2,
            SessionState::Recording => 3,
            SessionState::Stopping => 4,
            SessionState::Delivered => 5,
            SessionState::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Delivered | SessionState::Failed)
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == SessionState::Failed || next.rank() > self.rank()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Opening => "opening",
            SessionState::Handshaking => "handshaking",
            SessionState::Capturing => "capturing",
            SessionState::Recording => "recording",
            SessionState::Stopping => "stopping",
            SessionState::Delivered => "delivered",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One end-to-end capture, owned by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,

    pub requesting_page: PageRef,

    pub capture_surface: PageId,

    pub audio_requested: bool,

    /// Filled in once the capture surface reports it
    pub strategy_used: Option<StrategyUsed>,

    pub state: SessionState,

    pub started_at: DateTime<Utc>,

    /// Last status detail reported by the capture surface
    pub last_detail: Option<String>,
}

impl Session {
    pub fn new(requesting_page: PageRef, capture_surface: PageId, audio_requested: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            requesting_page,
            capture_surface,
            audio_requested,
            strategy_used: None,
            state: SessionState::Opening,
            started_at: Utc::now(),
            last_detail: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Move to `next`, rejecting backward or post-terminal transitions
    pub fn advance(&mut self, next: SessionState) -> CaptureResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(CaptureError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!("Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }
}
