//! Screen Relay - capture a screen, tab or window and hand the video back.
//!
//! Four isolated contexts cooperate over fire-and-forget messages:
//! the initiator asks the background orchestrator to start, the orchestrator
//! opens a dedicated capture surface and hands the session off once it has
//! loaded, the capture surface records until the user stops, and the
//! requesting page receives the artifact and checks that it actually plays.

pub mod capture;
pub mod codec;
pub mod config;
pub mod delivery;
pub mod protocol;
pub mod recorder;
pub mod session;
pub mod sim;
pub mod utils;

pub use codec::{Artifact, Blob};
pub use config::CaptureConfig;
pub use protocol::{CaptureRequest, Envelope, Message, PageId, PageRef};
pub use utils::error::{CaptureError, CaptureResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to debug output for this crate. Safe to call
/// more than once.
pub fn init_tracing() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_relay_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Starting Screen Relay v{}", env!("CARGO_PKG_VERSION"));
    }
}
