//! Camera capture sources
//!
//! This module provides the stream model plus the camera backends.

pub mod preview;
pub mod stream;
pub mod synthetic;
pub mod traits;

#[cfg(feature = "native-camera")]
pub mod native;

pub use preview::ChannelPreview;
pub use stream::{
    MediaStream, MediaTrack, PixelFormat, StreamSettings, TrackKind, TrackSource, TrackState,
    VideoFrame,
};
pub use synthetic::SyntheticCamera;
pub use traits::{CameraInfo, FacingMode, MediaDevices, PreviewSink, Resolution, VideoConstraints};
