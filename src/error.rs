//! Error types for Gesture Arcade

use thiserror::Error;

/// Errors raised at collaborator and storage seams.
///
/// The simulation itself never fails; these only surface from transports,
/// score services and key-value stores, and the session logs them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transport unavailable: {0}")]
    Transport(String),

    #[error("Score service failure: {0}")]
    Persistence(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
