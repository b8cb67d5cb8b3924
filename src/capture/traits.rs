//! Capture trait definitions
//!
//! Platform-agnostic traits for camera sources and preview sinks.

use super::stream::MediaStream;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user
    #[default]
    User,
    /// Rear camera
    Environment,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Direction the camera faces, when the backend can tell
    pub facing_mode: Option<FacingMode>,
}

/// Constraints for a video-only acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub resolution: Resolution,
    pub facing_mode: FacingMode,
    pub frame_rate: Option<u32>,
}

impl VideoConstraints {
    /// User-facing camera at the given size
    pub fn user_facing(width: u32, height: u32) -> Self {
        Self {
            resolution: Resolution { width, height },
            facing_mode: FacingMode::User,
            frame_rate: None,
        }
    }
}

/// Source of live camera streams
///
/// Implementations map permission problems to `CaptureError::PermissionDenied`
/// and missing hardware to `CaptureError::DeviceUnavailable`.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a video-only stream matching the constraints
    async fn acquire(&self, constraints: VideoConstraints) -> CaptureResult<Arc<MediaStream>>;
}

/// Live display for a stream while it is recorded
pub trait PreviewSink: Send + Sync {
    /// Point the sink at a stream
    fn bind(&self, stream: Arc<MediaStream>);

    /// Begin playback. Failures are not fatal for the capture.
    fn play(&self) -> CaptureResult<()>;
}
