//! Fragment buffering and artifact assembly

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Ordered, append-only list of fragments emitted during one session
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    fragments: Vec<Vec<u8>>,
    total_bytes: usize,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: Vec<u8>) {
        self.total_bytes += fragment.len();
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Consume the buffer, concatenating fragments in arrival order
    pub fn into_artifact(
        self,
        session_id: Uuid,
        mime_type: impl Into<String>,
        duration_ms: f64,
    ) -> Artifact {
        let fragment_count = self.fragments.len();
        let data = self.fragments.concat();
        Artifact {
            session_id,
            mime_type: mime_type.into(),
            data,
            fragment_count,
            duration_ms,
            created_at: Utc::now(),
        }
    }
}

/// The finished clip handed to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub session_id: Uuid,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub fragment_count: usize,
    /// Time between the recorder's start and stop events
    pub duration_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
