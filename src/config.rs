//! Capture configuration
//!
//! Every field has a default, so hosts only need to override what they care
//! about. Configuration is plain JSON in camelCase.

use crate::utils::error::{CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a failed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Deliver the error through the completion callback
    #[default]
    Report,
    /// Only log the failure; the completion callback is never invoked
    Silent,
}

/// How instruction audio URLs are played when speech is unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CuePlayerKind {
    /// Play through `ffplay`, logging the URL if it is missing
    #[default]
    Ffplay,
    /// Write the URL to the log only
    Log,
}

/// FFmpeg recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderOptions {
    pub ffmpeg_path: String,
    pub video_codec: String,
    pub preset: String,
    /// Used when the stream does not report its frame rate
    pub frame_rate: u32,
    /// Maximum size of one emitted fragment
    pub chunk_size: usize,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            frame_rate: 30,
            chunk_size: 64 * 1024,
        }
    }
}

/// Instruction playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechConfig {
    /// Turn speech synthesis off entirely (audio cues still play)
    pub enabled: bool,
    /// Synthesizer program to use instead of the platform default
    pub command: Option<String>,
    pub cue_player: CuePlayerKind,
    pub ffplay_path: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
            cue_player: CuePlayerKind::Ffplay,
            ffplay_path: "ffplay".to_string(),
        }
    }
}

/// Top-level configuration for a `CaptureOrchestrator`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    /// Media type stamped on finished artifacts
    pub artifact_mime_type: String,
    pub failure_policy: FailurePolicy,
    /// Cancel instruction timers that have not fired when a session ends
    pub cancel_pending_instructions: bool,
    pub recorder: RecorderOptions,
    pub speech: SpeechConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            artifact_mime_type: "video/mp4".to_string(),
            failure_policy: FailurePolicy::Report,
            cancel_pending_instructions: true,
            recorder: RecorderOptions::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl CaptureConfig {
    pub fn from_json_str(json: &str) -> CaptureResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> CaptureResult<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded capture config from {}", path.display());
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> CaptureResult<()> {
        if self.artifact_mime_type.trim().is_empty() {
            return Err(CaptureError::Config("artifactMimeType must not be empty".to_string()));
        }
        if self.recorder.frame_rate == 0 {
            return Err(CaptureError::Config("recorder.frameRate must be positive".to_string()));
        }
        if self.recorder.chunk_size == 0 {
            return Err(CaptureError::Config("recorder.chunkSize must be positive".to_string()));
        }
        Ok(())
    }
}
