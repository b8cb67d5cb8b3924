//! Speech synthesis backends

use crate::utils::error::{CaptureError, CaptureResult};
use crate::utils::process::{find_program, spawn_detached};
use std::path::PathBuf;
use std::sync::OnceLock;

/// A text-to-speech engine
pub trait SpeechSynthesizer: Send + Sync {
    /// Whether the engine can be used on this machine
    fn is_available(&self) -> bool;

    /// Submit text; returns once playback has been dispatched
    fn speak(&self, text: &str) -> CaptureResult<()>;
}

/// Synthesizer that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeech;

impl SpeechSynthesizer for NullSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn speak(&self, _text: &str) -> CaptureResult<()> {
        Err(CaptureError::Speech("speech synthesis unavailable".to_string()))
    }
}

/// Speech through a command-line synthesizer
///
/// macOS uses `say`, Windows drives System.Speech through PowerShell, and
/// everything else tries `espeak-ng` then `espeak`.
#[derive(Debug)]
pub struct CommandSpeech {
    candidates: Vec<String>,
    resolved: OnceLock<Option<PathBuf>>,
}

impl CommandSpeech {
    pub fn platform_default() -> Self {
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["say"]
        } else if cfg!(target_os = "windows") {
            &["powershell"]
        } else {
            &["espeak-ng", "espeak"]
        };
        Self {
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            resolved: OnceLock::new(),
        }
    }

    /// Use a specific program; it must take the text as its last argument
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            candidates: vec![program.into()],
            resolved: OnceLock::new(),
        }
    }

    /// Probed once, then cached for the life of the synthesizer
    fn program(&self) -> Option<&PathBuf> {
        self.resolved
            .get_or_init(|| {
                let found = self.candidates.iter().find_map(|c| find_program(c));
                match &found {
                    Some(path) => tracing::info!("Speech synthesis via {}", path.display()),
                    None => tracing::warn!("No speech synthesizer found (tried {:?})", self.candidates),
                }
                found
            })
            .as_ref()
    }
}

/// Arguments for speaking `text` with `program`
pub fn speech_args(program: &str, text: &str) -> Vec<String> {
    let name = program
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(program)
        .to_lowercase();
    if name.starts_with("powershell") || name.starts_with("pwsh") {
        let escaped = text.replace('\'', "''");
        vec![
            "-NoProfile".to_string(),
            "-Command".to_string(),
            format!(
                "Add-Type -AssemblyName System.Speech; \
                 (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{escaped}')"
            ),
        ]
    } else if name.starts_with("espeak") {
        vec!["--".to_string(), text.to_string()]
    } else {
        vec![text.to_string()]
    }
}

impl SpeechSynthesizer for CommandSpeech {
    fn is_available(&self) -> bool {
        self.program().is_some()
    }

    fn speak(&self, text: &str) -> CaptureResult<()> {
        let program = self
            .program()
            .ok_or_else(|| CaptureError::Speech("speech synthesis unavailable".to_string()))?;
        let args = speech_args(&program.to_string_lossy(), text);
        spawn_detached(program, &args)?;
        tracing::debug!("Speaking: {}", text);
        Ok(())
    }
}
