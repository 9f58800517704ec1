//! Error types
//!
//! Extraction itself never fails: malformed payloads and ambiguous markup are
//! skipped where they are found. These errors cover the host-facing edges.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),
}
