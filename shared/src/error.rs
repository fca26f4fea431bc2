//! Wire-level error codes
//!
//! These codes travel inside nack and response payloads so the requesting
//! terminal can show the operator one specific failure reason instead of a
//! generic error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes shared between hub and terminals
///
/// | Code | Resolved | Retried |
/// |------|----------|---------|
/// | InvalidSpec | locally | never |
/// | UnknownSink | locally | after re-enumeration |
/// | NoPrinterAvailable | end-to-end | manual only |
/// | PrintFailed | end-to-end | manual only |
/// | ChannelDisconnected | locally | on reconnect (re-announce) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed compile input (missing name/price/quantity)
    InvalidSpec,
    /// Operator selected a sink id that is no longer enumerated
    UnknownSink,
    /// No terminal in the directory reports an attached printer
    NoPrinterAvailable,
    /// Sink accepted dispatch but signalled an error, or the ack timed out
    PrintFailed,
    /// Transport to the hub was lost
    ChannelDisconnected,
    /// Handshake protocol version mismatch
    ProtocolMismatch,
    /// Unclassified hub-side failure
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSpec => write!(f, "invalid_spec"),
            Self::UnknownSink => write!(f, "unknown_sink"),
            Self::NoPrinterAvailable => write!(f, "no_printer_available"),
            Self::PrintFailed => write!(f, "print_failed"),
            Self::ChannelDisconnected => write!(f, "channel_disconnected"),
            Self::ProtocolMismatch => write!(f, "protocol_mismatch"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
