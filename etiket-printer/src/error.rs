//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Label spec is missing mandatory fields or has a non-positive quantity
    #[error("Invalid label spec: {0}")]
    InvalidSpec(String),

    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink is offline or unreachable
    #[error("Sink offline: {0}")]
    Offline(String),

    /// Timeout waiting for the sink
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Unknown sink id
    #[error("Unknown sink: {0}")]
    UnknownSink(String),

    /// Invalid sink configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
