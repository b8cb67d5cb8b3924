//! Audio cue players for instructions that ship a recorded prompt

use super::Announcement;
use crate::utils::error::{CaptureError, CaptureResult};
use crate::utils::process::{find_program, spawn_detached};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Plays an audio URL
pub trait AudioCuePlayer: Send + Sync {
    fn is_available(&self) -> bool;

    fn play(&self, url: &str) -> CaptureResult<()>;

    /// How a successful `play` is reported
    fn announcement(&self) -> Announcement {
        Announcement::CuePlayed
    }
}

/// Writes the URL to the log instead of playing it
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCuePlayer;

impl AudioCuePlayer for LogCuePlayer {
    fn is_available(&self) -> bool {
        true
    }

    fn play(&self, url: &str) -> CaptureResult<()> {
        tracing::info!(audio_url = url, "Instruction audio cue");
        Ok(())
    }

    fn announcement(&self) -> Announcement {
        Announcement::Logged
    }
}

/// Plays cues with `ffplay` (local paths and http(s) URLs)
#[derive(Debug)]
pub struct FfplayCuePlayer {
    program: String,
    resolved: OnceLock<Option<PathBuf>>,
}

impl FfplayCuePlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            resolved: OnceLock::new(),
        }
    }

    fn resolved(&self) -> Option<&PathBuf> {
        self.resolved
            .get_or_init(|| find_program(&self.program))
            .as_ref()
    }
}

/// Arguments for playing `url` once without a window.
///
/// The URL is passed through `-i` so one starting with `-` is never read as an option.
pub fn ffplay_args(url: &str) -> Vec<String> {
    ["-nodisp", "-autoexit", "-loglevel", "quiet", "-i", url]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FfplayCuePlayer {
    fn default() -> Self {
        Self::new("ffplay")
    }
}

impl AudioCuePlayer for FfplayCuePlayer {
    fn is_available(&self) -> bool {
        self.resolved().is_some()
    }

    fn play(&self, url: &str) -> CaptureResult<()> {
        let program = self
            .resolved()
            .ok_or_else(|| CaptureError::Speech(format!("{} not found", self.program)))?;
        spawn_detached(program, &ffplay_args(url))?;
        tracing::debug!("Playing audio cue {}", url);
        Ok(())
    }
}
