//! Playback health verification
//!
//! Some pages block embedded video without a reliable error, so health is a
//! race between media events and a fixed timer. The first qualifying outcome
//! is committed to a single-assignment flag; everything after is ignored.

use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;

/// Event reported by the playback element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// First frame decoded
    LoadedData,
    /// Metadata parsed; duration in seconds
    LoadedMetadata { duration: f64 },
    /// Platform playback error
    Error(String),
    /// Loading stalled; informational only
    Stalled,
}

/// Why inline playback was abandoned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "reason", content = "detail")]
pub enum BlockReason {
    /// The element reported an error
    MediaError(String),
    /// No success signal before the deadline
    Timeout,
    /// Nothing was recorded
    EmptyArtifact,
    /// The artifact could not be decoded
    Undecodable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackVerdict {
    Healthy,
    Blocked(BlockReason),
}

impl PlaybackVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, PlaybackVerdict::Healthy)
    }

    /// `PlaybackBlocked` for any blocked verdict
    pub fn check(&self) -> CaptureResult<()> {
        match self {
            PlaybackVerdict::Healthy => Ok(()),
            PlaybackVerdict::Blocked(_) => Err(CaptureError::PlaybackBlocked),
        }
    }
}

/// Single-assignment playback health flag
#[derive(Debug, Default)]
pub struct HealthFlag {
    verdict: OnceLock<PlaybackVerdict>,
}

impl HealthFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit `verdict` if nothing was committed yet. Returns whether it won.
    pub fn commit(&self, verdict: PlaybackVerdict) -> bool {
        let won = self.verdict.set(verdict.clone()).is_ok();
        if won {
            tracing::info!("Playback verdict: {:?}", verdict);
        } else {
            tracing::debug!("Playback outcome {:?} arrived after the verdict, ignoring", verdict);
        }
        won
    }

    pub fn verdict(&self) -> Option<PlaybackVerdict> {
        self.verdict.get().cloned()
    }
}

/// Map an event to the outcome it signals, if any
pub fn classify(event: &MediaEvent) -> Option<PlaybackVerdict> {
    match event {
        MediaEvent::LoadedData => Some(PlaybackVerdict::Healthy),
        MediaEvent::LoadedMetadata { duration } if !duration.is_nan() && *duration > 0.0 => {
            Some(PlaybackVerdict::Healthy)
        }
        MediaEvent::LoadedMetadata { duration } => {
            tracing::debug!("Metadata without a usable duration ({})", duration);
            None
        }
        MediaEvent::Error(message) => Some(PlaybackVerdict::Blocked(BlockReason::MediaError(
            message.clone(),
        ))),
        MediaEvent::Stalled => {
            tracing::debug!("Video loading stalled");
            None
        }
    }
}

pub struct PlaybackVerifier {
    timeout: Duration,
}

impl PlaybackVerifier {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Race the element's events against the timer until `flag` is committed
    pub async fn verify(
        &self,
        flag: &HealthFlag,
        events: &mut mpsc::UnboundedReceiver<MediaEvent>,
    ) -> PlaybackVerdict {
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut events_open = true;

        loop {
            if let Some(verdict) = flag.verdict() {
                return verdict;
            }

            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!("No playback signal within {:?}", self.timeout);
                    flag.commit(PlaybackVerdict::Blocked(BlockReason::Timeout));
                }
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if let Some(verdict) = classify(&event) {
                            flag.commit(verdict);
                        }
                    }
                    None => events_open = false,
                },
            }
        }
    }
}

/// Keep consuming events after the verdict so late signals are observed and dropped
pub async fn drain_late_events(flag: Arc<HealthFlag>, mut events: mpsc::UnboundedReceiver<MediaEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(verdict) = classify(&event) {
            flag.commit(verdict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> PlaybackVerifier {
        PlaybackVerifier::new(Duration::from_millis(3000))
    }

    fn send_at(tx: mpsc::UnboundedSender<MediaEvent>, after_ms: u64, event: MediaEvent) {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            let _ = tx.send(event);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_metadata_before_deadline_is_healthy() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_at(tx.clone(), 500, MediaEvent::LoadedMetadata { duration: 4.2 });

        let flag = HealthFlag::new();
        let start = tokio::time::Instant::now();
        let verdict = verifier().verify(&flag, &mut rx).await;

        assert_eq!(verdict, PlaybackVerdict::Healthy);
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(3000));

        // Timer expiry after the verdict changes nothing
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(flag.verdict(), Some(PlaybackVerdict::Healthy));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_event_after_timeout_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_at(tx.clone(), 3500, MediaEvent::LoadedData);

        let flag = Arc::new(HealthFlag::new());
        let verdict = verifier().verify(&flag, &mut rx).await;
        assert_eq!(verdict, PlaybackVerdict::Blocked(BlockReason::Timeout));

        let drain = tokio::spawn(drain_late_events(flag.clone(), rx));
        tokio::time::sleep(Duration::from_millis(1000)).await;
        drop(tx);
        drain.await.unwrap();

        assert_eq!(flag.verdict(), Some(PlaybackVerdict::Blocked(BlockReason::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_wins_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_at(tx.clone(), 100, MediaEvent::Stalled);
        send_at(tx.clone(), 200, MediaEvent::Error("MEDIA_ERR_SRC_NOT_SUPPORTED".into()));

        let flag = HealthFlag::new();
        let start = tokio::time::Instant::now();
        let verdict = verifier().verify(&flag, &mut rx).await;

        assert_eq!(
            verdict,
            PlaybackVerdict::Blocked(BlockReason::MediaError("MEDIA_ERR_SRC_NOT_SUPPORTED".into()))
        );
        assert!(start.elapsed() < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_duration_metadata_does_not_count() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_at(tx.clone(), 300, MediaEvent::LoadedMetadata { duration: 0.0 });
        send_at(tx.clone(), 400, MediaEvent::LoadedMetadata { duration: f64::NAN });

        let flag = HealthFlag::new();
        let verdict = verifier().verify(&flag, &mut rx).await;
        assert_eq!(verdict, PlaybackVerdict::Blocked(BlockReason::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_infinite_duration_metadata_is_healthy() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_at(tx.clone(), 250, MediaEvent::LoadedMetadata { duration: f64::INFINITY });

        let flag = HealthFlag::new();
        let start = tokio::time::Instant::now();
        let verdict = verifier().verify(&flag, &mut rx).await;

        assert_eq!(verdict, PlaybackVerdict::Healthy);
        assert!(start.elapsed() < Duration::from_millis(3000));
    }

    #[test]
    fn test_classify_metadata_durations() {
        let healthy = |duration: f64| classify(&MediaEvent::LoadedMetadata { duration });
        assert_eq!(healthy(f64::INFINITY), Some(PlaybackVerdict::Healthy));
        assert_eq!(healthy(0.04), Some(PlaybackVerdict::Healthy));
        assert_eq!(healthy(0.0), None);
        assert_eq!(healthy(-1.0), None);
        assert_eq!(healthy(f64::NAN), None);
    }

    #[test]
    fn test_blocked_verdict_maps_to_playback_blocked() {
        assert!(PlaybackVerdict::Healthy.check().is_ok());
        let err = PlaybackVerdict::Blocked(BlockReason::Timeout).check().unwrap_err();
        assert!(matches!(err, CaptureError::PlaybackBlocked));
        assert_eq!(err.code(), "PLAYBACK_BLOCKED");
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_event_source_waits_for_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel::<MediaEvent>();
        drop(tx);

        let flag = HealthFlag::new();
        let start = tokio::time::Instant::now();
        let verdict = verifier().verify(&flag, &mut rx).await;

        assert_eq!(verdict, PlaybackVerdict::Blocked(BlockReason::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[test]
    fn test_flag_is_single_assignment() {
        let flag = HealthFlag::new();
        assert!(flag.commit(PlaybackVerdict::Healthy));
        assert!(!flag.commit(PlaybackVerdict::Blocked(BlockReason::Timeout)));
        assert_eq!(flag.verdict(), Some(PlaybackVerdict::Healthy));
    }
}
