//! Native webcam capture using nokhwa
//!
//! The camera is opened and read on a dedicated thread; decoded RGB frames
//! are broadcast to subscribers (recorder, preview).

use super::stream::{
    MediaStream, MediaTrack, PixelFormat, StreamSettings, TrackKind, TrackSource, VideoFrame,
};
use super::traits::{CameraInfo, FacingMode, MediaDevices, VideoConstraints};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
};
use nokhwa::{Camera, NokhwaError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{broadcast, oneshot};

const FRAME_CHANNEL_CAPACITY: usize = 8;
const DEFAULT_FPS: u32 = 30;

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name();
                CameraInfo {
                    facing_mode: guess_facing(&name),
                    id,
                    name,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Device names are the only hint desktop backends give about direction
fn guess_facing(name: &str) -> Option<FacingMode> {
    let lower = name.to_lowercase();
    if lower.contains("back") || lower.contains("rear") {
        Some(FacingMode::Environment)
    } else if lower.contains("front") || lower.contains("facetime") || lower.contains("user") {
        Some(FacingMode::User)
    } else {
        None
    }
}

/// Pick the camera matching the facing preference, falling back to the first one
fn select_camera(cameras: &[CameraInfo], facing: FacingMode) -> Option<CameraIndex> {
    let matches = |c: &&CameraInfo| match facing {
        FacingMode::User => c.facing_mode != Some(FacingMode::Environment),
        FacingMode::Environment => c.facing_mode == Some(FacingMode::Environment),
    };
    cameras
        .iter()
        .find(matches)
        .or_else(|| cameras.first())
        .map(|c| match c.id.parse::<u32>() {
            Ok(idx) => CameraIndex::Index(idx),
            Err(_) => CameraIndex::String(c.id.clone()),
        })
}

fn map_open_error(e: NokhwaError) -> CaptureError {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("authoriz") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

struct NativeTrackSource {
    running: Arc<AtomicBool>,
    frames: Mutex<Option<broadcast::Sender<Arc<VideoFrame>>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TrackSource for NativeTrackSource {
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.frames.lock().take();
        // The capture loop exits after the frame it is currently waiting on
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }

    fn subscribe_frames(&self) -> Option<broadcast::Receiver<Arc<VideoFrame>>> {
        self.frames.lock().as_ref().map(|tx| tx.subscribe())
    }
}

/// Camera backend using the platform's native capture API
#[derive(Debug, Clone, Default)]
pub struct NativeCamera;

impl NativeCamera {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaDevices for NativeCamera {
    async fn acquire(&self, constraints: VideoConstraints) -> CaptureResult<Arc<MediaStream>> {
        let cameras = list_cameras();
        let camera_index = select_camera(&cameras, constraints.facing_mode)
            .ok_or_else(|| CaptureError::DeviceUnavailable("No cameras found".to_string()))?;

        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel::<CaptureResult<StreamSettings>>();

        let tx = frames.clone();
        let is_running = running.clone();
        let requested = constraints;
        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || capture_loop(camera_index, requested, tx, is_running, ready_tx))?;

        let settings = match ready_rx.await {
            Ok(Ok(settings)) => settings,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::DeviceUnavailable(
                    "camera thread exited before opening".to_string(),
                ));
            }
        };

        let label = settings.device_label.clone();
        let track = MediaTrack::new(
            TrackKind::Video,
            label,
            Box::new(NativeTrackSource {
                running,
                frames: Mutex::new(Some(frames)),
                thread: Mutex::new(Some(handle)),
            }),
        );
        Ok(Arc::new(MediaStream::new(settings, vec![track])))
    }
}

fn capture_loop(
    camera_index: CameraIndex,
    constraints: VideoConstraints,
    frames: broadcast::Sender<Arc<VideoFrame>>,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<CaptureResult<StreamSettings>>,
) {
    let fps = constraints.frame_rate.unwrap_or(DEFAULT_FPS);
    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new_from(
            constraints.resolution.width,
            constraints.resolution.height,
            FrameFormat::MJPEG,
            fps,
        ),
    ));

    let mut camera = match Camera::new(camera_index.clone(), format) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to open camera {:?}: {:?}", camera_index, e);
            let _ = ready.send(Err(map_open_error(e)));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        tracing::error!("Failed to open camera stream: {:?}", e);
        let _ = ready.send(Err(map_open_error(e)));
        return;
    }

    let camera_format = camera.camera_format();
    let settings = StreamSettings {
        width: camera_format.resolution().width(),
        height: camera_format.resolution().height(),
        frame_rate: Some(camera_format.frame_rate()),
        facing_mode: constraints.facing_mode,
        device_label: camera.info().human_name(),
    };

    tracing::info!(
        "Webcam opened: {}x{} @ {}fps (requested {}x{})",
        settings.width,
        settings.height,
        camera_format.frame_rate(),
        constraints.resolution.width,
        constraints.resolution.height,
    );

    if ready.send(Ok(settings)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    let mut frame_count: u64 = 0;
    while running.load(Ordering::SeqCst) {
        // Blocks until the camera delivers the next frame
        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(image) => {
                    let frame = VideoFrame {
                        width: image.width(),
                        height: image.height(),
                        pixel_format: PixelFormat::Rgb24,
                        data: image.into_raw(),
                    };
                    let _ = frames.send(Arc::new(frame));
                    frame_count += 1;
                }
                Err(e) => tracing::debug!("Failed to decode frame: {:?}", e),
            },
            Err(e) => tracing::debug!("Failed to capture frame: {:?}", e),
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!("Error stopping camera stream: {:?}", e);
    }
    tracing::info!("Webcam capture thread stopped after {} frames", frame_count);
}
