use std::path::PathBuf;
use thiserror::Error;

/// Failures at the supervisor / command bridge boundary.
///
/// Every backend interaction returns one of these instead of panicking, so the
/// control surface can report "backend not running" and keep serving.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("backend executable not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to launch backend: {0}")]
    LaunchFailed(std::io::Error),
    #[error("backend is already running")]
    AlreadyRunning,
    #[error("backend not running")]
    NoBackend,
    #[error("failed to write to backend: {0}")]
    WriteFailed(std::io::Error),
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),
}

impl BridgeError {
    /// Short message for the control surface.
    pub fn user_message(&self) -> &'static str {
        match self {
            BridgeError::NotFound(_) | BridgeError::LaunchFailed(_) | BridgeError::NoBackend => {
                "Backend not running"
            }
            BridgeError::AlreadyRunning => "Backend already running",
            BridgeError::WriteFailed(_) => "Backend died",
            BridgeError::InvalidCommand(_) => "Invalid command",
        }
    }
}
