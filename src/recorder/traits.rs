//! Recorder trait definitions
//!
//! A recorder turns a live stream into encoded fragments. It reports its
//! lifecycle through a single event channel so that `Stopped` always follows
//! the last `DataAvailable`.

use crate::capture::stream::MediaStream;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Events emitted by a recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Encoding actually began
    Started,
    /// A chunk of encoded media
    DataAvailable(Vec<u8>),
    /// Encoding finished; no data follows
    Stopped,
    /// Encoding failed; no data follows
    Error(String),
}

pub type RecorderEventSender = mpsc::UnboundedSender<RecorderEvent>;

/// One recording of one stream
#[async_trait]
pub trait MediaRecorder: Send {
    /// Begin recording. `Started` is sent once encoding is underway.
    async fn start(&mut self, events: RecorderEventSender) -> CaptureResult<()>;

    /// Request a stop. Remaining data and then `Stopped` arrive on the event channel.
    async fn stop(&mut self) -> CaptureResult<()>;
}

/// Creates recorders bound to streams
pub trait RecorderFactory: Send + Sync {
    fn create(&self, stream: Arc<MediaStream>) -> CaptureResult<Box<dyn MediaRecorder>>;
}
