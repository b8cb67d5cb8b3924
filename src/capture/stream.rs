//! Live media streams and their tracks
//!
//! A `MediaStream` is what a `MediaDevices` backend hands back from a
//! successful acquisition. The session that acquired it is the only owner
//! allowed to end its tracks.

use super::traits::FacingMode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pixel layout of a raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgb24,
    Rgba,
    Yuyv422,
    Nv12,
}

impl PixelFormat {
    /// Name FFmpeg uses for this layout
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Yuyv422 => "yuyv422",
            PixelFormat::Nv12 => "nv12",
        }
    }
}

/// A raw video frame published by a track source
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
}

/// Settings the device actually granted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<u32>,
    pub facing_mode: FacingMode,
    pub device_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Live,
    Ended,
}

/// Backend half of a track
pub trait TrackSource: Send + Sync {
    /// Release the underlying device. Called at most once per track.
    fn stop(&self);

    /// Subscribe to raw frames, if this source publishes them
    fn subscribe_frames(&self) -> Option<broadcast::Receiver<Arc<VideoFrame>>> {
        None
    }
}

/// One track of a stream
pub struct MediaTrack {
    id: Uuid,
    kind: TrackKind,
    label: String,
    state: Mutex<TrackState>,
    source: Box<dyn TrackSource>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>, source: Box<dyn TrackSource>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            label: label.into(),
            state: Mutex::new(TrackState::Live),
            source,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TrackState {
        *self.state.lock()
    }

    /// End the track. Returns `true` only for the call that actually ended it.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TrackState::Ended {
            return false;
        }
        *state = TrackState::Ended;
        drop(state);

        self.source.stop();
        tracing::debug!("Track {} ({}) stopped", self.id, self.label);
        true
    }

    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<Arc<VideoFrame>>> {
        if self.state() == TrackState::Ended {
            return None;
        }
        self.source.subscribe_frames()
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}

/// A live stream made of one or more tracks
#[derive(Debug)]
pub struct MediaStream {
    id: Uuid,
    settings: StreamSettings,
    tracks: Vec<Arc<MediaTrack>>,
}

impl MediaStream {
    pub fn new(settings: StreamSettings, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            tracks: tracks.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    pub fn tracks(&self) -> &[Arc<MediaTrack>] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &Arc<MediaTrack>> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(|t| t.state() == TrackState::Live)
    }

    /// Stop every track that is still live; returns how many were stopped now
    pub fn stop_all(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }

    /// Subscribe to frames from the first video track that publishes them
    pub fn subscribe_frames(&self) -> Option<broadcast::Receiver<Arc<VideoFrame>>> {
        self.video_tracks().find_map(|t| t.subscribe_frames())
    }
}
