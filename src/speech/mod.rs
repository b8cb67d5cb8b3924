//! Instruction playback
//!
//! An instruction is announced by speech synthesis when the platform has a
//! synthesizer and the instruction carries text; otherwise its audio URL is
//! handed to a cue player. Dispatch is fire-and-forget: nothing here waits
//! for playback to finish.

pub mod cue;
pub mod synth;

pub use cue::{AudioCuePlayer, FfplayCuePlayer, LogCuePlayer};
pub use synth::{CommandSpeech, NullSpeech, SpeechSynthesizer};

use crate::config::{CuePlayerKind, SpeechConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an instruction ended up being presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Announcement {
    /// Text submitted to the speech synthesizer
    Spoken,
    /// Audio URL submitted to the cue player
    CuePlayed,
    /// Audio URL written to the log only
    Logged,
    /// Nothing usable to present
    Skipped,
}

/// Presents instructions to the user
pub trait Announcer: Send + Sync {
    fn speak(&self, text: Option<&str>, audio_url: Option<&str>) -> Announcement;
}

/// Speech synthesis with an audio-cue fallback
pub struct InstructionAnnouncer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    cue_player: Arc<dyn AudioCuePlayer>,
}

impl InstructionAnnouncer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, cue_player: Arc<dyn AudioCuePlayer>) -> Self {
        Self {
            synthesizer,
            cue_player,
        }
    }

    /// Platform synthesizer and the configured cue player
    pub fn from_config(config: &SpeechConfig) -> Self {
        let synthesizer: Arc<dyn SpeechSynthesizer> = if !config.enabled {
            Arc::new(NullSpeech)
        } else {
            match &config.command {
                Some(command) => Arc::new(CommandSpeech::with_program(command.clone())),
                None => Arc::new(CommandSpeech::platform_default()),
            }
        };
        let cue_player: Arc<dyn AudioCuePlayer> = match config.cue_player {
            CuePlayerKind::Ffplay => Arc::new(FfplayCuePlayer::new(config.ffplay_path.clone())),
            CuePlayerKind::Log => Arc::new(LogCuePlayer),
        };
        Self::new(synthesizer, cue_player)
    }
}

impl Announcer for InstructionAnnouncer {
    fn speak(&self, text: Option<&str>, audio_url: Option<&str>) -> Announcement {
        let text = text.filter(|t| !t.trim().is_empty());
        let audio_url = audio_url.filter(|u| !u.trim().is_empty());

        if let Some(text) = text {
            if self.synthesizer.is_available() {
                match self.synthesizer.speak(text) {
                    Ok(()) => return Announcement::Spoken,
                    Err(e) => tracing::warn!("Speech synthesis failed, trying audio cue: {}", e),
                }
            }
        }

        let Some(url) = audio_url else {
            tracing::debug!("Instruction has nothing playable (text={:?})", text);
            return Announcement::Skipped;
        };

        if self.cue_player.is_available() {
            match self.cue_player.play(url) {
                Ok(()) => return self.cue_player.announcement(),
                Err(e) => tracing::warn!("Audio cue playback failed: {}", e),
            }
        }

        tracing::info!(audio_url = url, "Instruction audio cue");
        Announcement::Logged
    }
}
