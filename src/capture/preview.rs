//! Preview sink that forwards live frames to a host UI over a channel

use super::stream::{MediaStream, VideoFrame};
use super::traits::PreviewSink;
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Forwards frames of the bound stream into an mpsc channel.
///
/// Frames are dropped (not queued) when the receiver falls behind.
pub struct ChannelPreview {
    stream: Mutex<Option<Arc<MediaStream>>>,
    tx: mpsc::Sender<Arc<VideoFrame>>,
}

impl ChannelPreview {
    /// Create a preview and the receiver the host should draw from
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<VideoFrame>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                stream: Mutex::new(None),
                tx,
            },
            rx,
        )
    }
}

impl PreviewSink for ChannelPreview {
    fn bind(&self, stream: Arc<MediaStream>) {
        tracing::debug!("Preview bound to stream {}", stream.id());
        *self.stream.lock() = Some(stream);
    }

    fn play(&self) -> CaptureResult<()> {
        let mut frames = {
            let guard = self.stream.lock();
            let stream = guard
                .as_ref()
                .ok_or_else(|| CaptureError::RuntimeAborted("preview has no stream".to_string()))?;
            stream.subscribe_frames().ok_or_else(|| {
                CaptureError::RuntimeAborted("stream does not publish frames".to_string())
            })?
        };

        let tx = self.tx.clone();
        tokio::spawn(async move {
            loop {
                match frames.recv().await {
                    Ok(frame) => match tx.try_send(frame) {
                        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::debug!("Preview lagged, skipped {} frames", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }
}
