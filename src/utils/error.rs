//! Error types and handling
//!
//! Common error types used across the crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Invalid capture request: {0}")]
    InvalidRequest(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Recording aborted: {0}")]
    RuntimeAborted(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a failed capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    InvalidRequest,
    PermissionDenied,
    DeviceUnavailable,
    RuntimeAborted,
    Internal,
}

impl CaptureError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CaptureError::InvalidRequest(_) => FailureKind::InvalidRequest,
            CaptureError::PermissionDenied(_) => FailureKind::PermissionDenied,
            CaptureError::DeviceUnavailable(_) => FailureKind::DeviceUnavailable,
            CaptureError::RuntimeAborted(_) => FailureKind::RuntimeAborted,
            CaptureError::Speech(_)
            | CaptureError::Config(_)
            | CaptureError::Io(_)
            | CaptureError::Serialization(_) => FailureKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::InvalidRequest(_) => "INVALID_REQUEST",
            CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
            CaptureError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            CaptureError::RuntimeAborted(_) => "RUNTIME_ABORTED",
            CaptureError::Speech(_) => "SPEECH_ERROR",
            CaptureError::Config(_) => "CONFIG_ERROR",
            CaptureError::Io(_) => "IO_ERROR",
            CaptureError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error response for hosts that forward failures to a UI
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<CaptureError> for ErrorResponse {
    fn from(error: CaptureError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
