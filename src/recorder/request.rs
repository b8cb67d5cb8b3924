//! Capture requests and instructions

use super::buffer::Artifact;
use crate::capture::stream::MediaStream;
use crate::capture::traits::{PreviewSink, VideoConstraints};
use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A prompt presented to the user at an offset after recording starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Seconds after the recorder's start event
    #[serde(alias = "startSeconds")]
    pub offset_seconds: f64,
    #[serde(default)]
    pub text: Option<String>,
    /// Recorded prompt used when speech synthesis cannot say `text`
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl Instruction {
    pub fn spoken(offset_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            offset_seconds,
            text: Some(text.into()),
            audio_url: None,
        }
    }

    pub fn with_audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    /// Saturates at `Duration::MAX` for offsets too large to represent
    pub fn offset(&self) -> Duration {
        Duration::try_from_secs_f64(self.offset_seconds).unwrap_or(Duration::MAX)
    }

    fn validate(&self, index: usize) -> CaptureResult<()> {
        if Duration::try_from_secs_f64(self.offset_seconds).is_err() {
            return Err(CaptureError::InvalidRequest(format!(
                "instruction {index}: offset must be a non-negative, representable number of seconds, got {}",
                self.offset_seconds
            )));
        }
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_audio = self.audio_url.as_deref().is_some_and(|u| !u.trim().is_empty());
        if !has_text && !has_audio {
            return Err(CaptureError::InvalidRequest(format!(
                "instruction {index}: needs text or an audio URL"
            )));
        }
        Ok(())
    }
}

/// Outcome delivered to the completion callback
pub type CaptureOutcome = CaptureResult<Artifact>;

pub type CompletionCallback = Box<dyn FnOnce(CaptureOutcome) + Send + 'static>;

pub type StreamObserver = Box<dyn FnOnce(&MediaStream) + Send + 'static>;

/// Everything one capture session needs
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    /// Auto-stop after this many seconds; `None` records until stopped
    pub duration_seconds: Option<f64>,
    pub instructions: Vec<Instruction>,
    pub on_complete: CompletionCallback,
    pub preview: Option<Arc<dyn PreviewSink>>,
    /// Called with the stream before recording begins
    pub stream_observer: Option<StreamObserver>,
}

impl CaptureRequest {
    pub fn new<F>(width: u32, height: u32, on_complete: F) -> Self
    where
        F: FnOnce(CaptureOutcome) + Send + 'static,
    {
        Self {
            width,
            height,
            duration_seconds: None,
            instructions: Vec::new(),
            on_complete: Box::new(on_complete),
            preview: None,
            stream_observer: None,
        }
    }

    pub fn duration_seconds(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    pub fn preview(mut self, sink: Arc<dyn PreviewSink>) -> Self {
        self.preview = Some(sink);
        self
    }

    pub fn observe_stream<F>(mut self, observer: F) -> Self
    where
        F: FnOnce(&MediaStream) + Send + 'static,
    {
        self.stream_observer = Some(Box::new(observer));
        self
    }

    pub fn constraints(&self) -> VideoConstraints {
        VideoConstraints::user_facing(self.width, self.height)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration_seconds
            .map(|s| Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX))
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::InvalidRequest(format!(
                "resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if let Some(seconds) = self.duration_seconds {
            if seconds <= 0.0 || Duration::try_from_secs_f64(seconds).is_err() {
                return Err(CaptureError::InvalidRequest(format!(
                    "duration must be a positive, representable number of seconds, got {seconds}"
                )));
            }
        }
        self.instructions
            .iter()
            .enumerate()
            .try_for_each(|(i, instruction)| instruction.validate(i))
    }
}

impl std::fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("duration_seconds", &self.duration_seconds)
            .field("instructions", &self.instructions)
            .field("preview", &self.preview.is_some())
            .field("stream_observer", &self.stream_observer.is_some())
            .finish()
    }
}
