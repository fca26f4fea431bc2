//! Hub error type

use thiserror::Error;

/// Hub-side errors
#[derive(Debug, Error)]
pub enum HubError {
    /// Terminal transport closed
    #[error("Terminal disconnected")]
    TerminalDisconnected,

    /// No terminal in the directory reports an attached printer
    #[error("No printer available")]
    NoPrinterAvailable,

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed message or request
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Unclassified internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type HubResult<T> = Result<T, HubError>;
