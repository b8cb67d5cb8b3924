//! selfie-clip - short guided selfie video capture.
//!
//! Opens the user-facing camera, records a clip for a fixed duration (or
//! until stopped), speaks timed instructions while recording, and hands the
//! finished clip back through a completion callback.

pub mod capture;
pub mod config;
pub mod recorder;
pub mod speech;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{MediaDevices, MediaStream, PreviewSink, SyntheticCamera};
pub use config::{CaptureConfig, FailurePolicy};
pub use recorder::{
    Artifact, CaptureHandle, CaptureOrchestrator, CaptureOutcome, CaptureRequest, Instruction,
    SessionEvent, SessionState,
};
pub use speech::{Announcement, Announcer, InstructionAnnouncer};
pub use utils::error::{CaptureError, CaptureResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// `RUST_LOG` overrides the filter. Does nothing if a global subscriber is
/// already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "selfie_clip=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    tracing::debug!("selfie-clip v{} tracing initialized", env!("CARGO_PKG_VERSION"));
}

/// Orchestrator over the platform camera with default recorder and speech
#[cfg(feature = "native-camera")]
pub fn native_orchestrator(config: CaptureConfig) -> CaptureOrchestrator {
    CaptureOrchestrator::with_defaults(
        std::sync::Arc::new(capture::native::NativeCamera::new()),
        config,
    )
}
