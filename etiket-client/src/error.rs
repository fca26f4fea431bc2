//! Terminal-side error type

use shared::ErrorCode;
use thiserror::Error;

/// Errors surfaced to the terminal operator
///
/// Each variant maps to exactly one failure reason; delegation failures
/// arrive as nacks and are converted back into the matching variant so the
/// operator never sees a generic error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed label spec - resolved locally, never sent over the channel
    #[error("Invalid label spec: {0}")]
    InvalidSpec(String),

    /// Operator selected a sink id that is no longer enumerated
    #[error("Unknown sink: {0}")]
    UnknownSink(String),

    /// No terminal in the fleet reports an attached printer
    #[error("No printer available")]
    NoPrinterAvailable,

    /// Dispatch was accepted but execution failed, or the ack timed out
    #[error("Print failed: {0}")]
    PrintFailed(String),

    /// The job channel connection was lost
    #[error("Channel disconnected")]
    ChannelDisconnected,

    /// Could not establish or use the connection
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A request did not complete within its bound
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ClientError {
    /// Map a nack code back to the matching operator-facing error
    pub fn from_nack(code: ErrorCode, reason: &str) -> Self {
        match code {
            ErrorCode::InvalidSpec => Self::InvalidSpec(reason.to_string()),
            ErrorCode::UnknownSink => Self::UnknownSink(reason.to_string()),
            ErrorCode::NoPrinterAvailable => Self::NoPrinterAvailable,
            ErrorCode::ChannelDisconnected => Self::ChannelDisconnected,
            ErrorCode::PrintFailed | ErrorCode::ProtocolMismatch | ErrorCode::Internal => {
                Self::PrintFailed(reason.to_string())
            }
        }
    }
}

impl From<etiket_printer::PrintError> for ClientError {
    fn from(e: etiket_printer::PrintError) -> Self {
        match e {
            etiket_printer::PrintError::InvalidSpec(msg) => Self::InvalidSpec(msg),
            etiket_printer::PrintError::UnknownSink(id) => Self::UnknownSink(id),
            other => Self::PrintFailed(other.to_string()),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
