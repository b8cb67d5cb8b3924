//! Synthetic test-pattern camera
//!
//! Produces a moving RGB gradient at the requested size. Useful on machines
//! without a camera and as a frame source for recorder integration work.

use super::stream::{
    MediaStream, MediaTrack, PixelFormat, StreamSettings, TrackKind, TrackSource, VideoFrame,
};
use super::traits::{MediaDevices, VideoConstraints};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const DEFAULT_FPS: u32 = 30;
const FRAME_CHANNEL_CAPACITY: usize = 8;

/// Camera backend that renders frames in software
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    frame_rate: u32,
    label: String,
}

impl SyntheticCamera {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            label: "Synthetic Camera".to_string(),
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

struct SyntheticTrackSource {
    frames: Mutex<Option<broadcast::Sender<Arc<VideoFrame>>>>,
    cancel: CancellationToken,
}

impl TrackSource for SyntheticTrackSource {
    fn stop(&self) {
        self.cancel.cancel();
        // Dropping our sender lets subscribers observe the end of the stream
        self.frames.lock().take();
    }

    fn subscribe_frames(&self) -> Option<broadcast::Receiver<Arc<VideoFrame>>> {
        self.frames.lock().as_ref().map(|tx| tx.subscribe())
    }
}

/// Render one gradient frame; `tick` shifts the pattern
pub fn render_pattern(width: u32, height: u32, tick: u64) -> VideoFrame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    let shift = (tick % 256) as u32;
    for y in 0..height {
        for x in 0..width {
            let r = ((x * 255 / width.max(1)) + shift) % 256;
            let g = ((y * 255 / height.max(1)) + shift) % 256;
            let b = (r + g) / 2;
            data.extend_from_slice(&[r as u8, g as u8, b as u8]);
        }
    }
    VideoFrame {
        width,
        height,
        pixel_format: PixelFormat::Rgb24,
        data,
    }
}

#[async_trait]
impl MediaDevices for SyntheticCamera {
    async fn acquire(&self, constraints: VideoConstraints) -> CaptureResult<Arc<MediaStream>> {
        let width = constraints.resolution.width;
        let height = constraints.resolution.height;
        if width == 0 || height == 0 {
            return Err(CaptureError::DeviceUnavailable(format!(
                "no synthetic mode for {}x{}",
                width, height
            )));
        }

        let fps = constraints.frame_rate.unwrap_or(self.frame_rate).max(1);
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let tx = frames.clone();
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
            let mut tick: u64 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        // No receivers is fine; frames are simply dropped
                        let _ = tx.send(Arc::new(render_pattern(width, height, tick)));
                        tick += 1;
                    }
                }
            }
            tracing::debug!("Synthetic camera stopped after {} frames", tick);
        });

        tracing::info!("Synthetic camera started: {}x{} @ {}fps", width, height, fps);

        let settings = StreamSettings {
            width,
            height,
            frame_rate: Some(fps),
            facing_mode: constraints.facing_mode,
            device_label: self.label.clone(),
        };
        let track = MediaTrack::new(
            TrackKind::Video,
            self.label.clone(),
            Box::new(SyntheticTrackSource {
                frames: Mutex::new(Some(frames)),
                cancel,
            }),
        );
        Ok(Arc::new(MediaStream::new(settings, vec![track])))
    }
}
