//! Recording system module
//!
//! This module implements the capture session:
//! - CaptureOrchestrator to run one session per request
//! - MediaRecorder trait with an FFmpeg fragmented-MP4 backend
//! - FragmentBuffer collecting recorder output into the final artifact

pub mod buffer;
pub mod coordinator;
pub mod ffmpeg;
pub mod request;
pub mod state;
pub mod traits;

pub use buffer::{Artifact, FragmentBuffer};
pub use coordinator::{CaptureHandle, CaptureOrchestrator};
pub use ffmpeg::{FfmpegRecorder, FfmpegRecorderFactory};
pub use request::{CaptureOutcome, CaptureRequest, Instruction};
pub use state::{SessionEvent, SessionState};
pub use traits::{MediaRecorder, RecorderEvent, RecorderFactory};
