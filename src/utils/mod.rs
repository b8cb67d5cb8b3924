//! Shared utilities

pub mod error;
pub mod process;

pub use error::{CaptureError, CaptureResult, ErrorResponse, FailureKind};
