//! Session state management
//!
//! Defines the capture session state machine and the events it broadcasts.

use crate::speech::Announcement;
use serde::{Deserialize, Serialize};

/// Current state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, nothing requested yet
    #[default]
    Idle,
    /// Waiting for the camera stream
    Acquiring,
    /// Recorder reported that it started
    Recording,
    /// Recorder stopped; assembling the artifact
    Finalizing,
    /// Artifact delivered and tracks released
    Done,
    /// Session ended without an artifact
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }

    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Acquiring)
                | (Acquiring, Recording)
                | (Acquiring, Finalizing)
                | (Acquiring, Failed)
                | (Recording, Finalizing)
                | (Recording, Failed)
                | (Finalizing, Done)
        )
    }
}

/// Events emitted during a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged { state: SessionState },
    /// Recorder started; instruction timers are now running
    RecorderStarted,
    FragmentReceived { bytes: usize },
    InstructionAnnounced { index: usize, announcement: Announcement },
    Completed { bytes: usize },
    Failed { code: String, message: String },
}
