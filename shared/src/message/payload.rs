use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::models::{Presence, PrintJob};

// ==================== Payloads ====================

/// Handshake payload (terminal -> hub)
///
/// Carries the terminal's protocol version and its stable id. A terminal
/// without a configured id lets the hub assign one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// Protocol version
    pub version: u16,
    /// Stable terminal id (hub assigns a UUID when absent)
    pub terminal_id: Option<String>,
    /// Human-readable terminal name
    pub terminal_name: Option<String>,
    /// Client software version
    pub client_version: Option<String>,
}

/// Generic correlated response (hub -> terminal)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub success: bool,
    pub message: String,
    /// Error code (only on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Response data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Presence announcement payload (terminal -> hub)
///
/// The directory's last-write-wins timestamp is the envelope's per-sender
/// sequence number, not anything in here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub presence: Presence,
    /// Selected sink id when presence is HasPrinter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sink_id: Option<String>,
}

/// Directory snapshot fan-out (hub -> all terminals)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSyncPayload {
    /// terminal id -> presence, for every connected terminal
    pub entries: BTreeMap<String, Presence>,
}

/// Delegated print job payload (requester -> hub -> executor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJobPayload {
    pub job: PrintJob,
}

/// Job executed payload (executor -> hub -> requester)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintAckPayload {
    pub job_id: Uuid,
    /// Terminal that physically executed the job
    pub executed_by: String,
}

/// Job failed payload (executor/hub -> requester)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintNackPayload {
    pub job_id: Uuid,
    pub code: ErrorCode,
    pub reason: String,
}

// ==================== Convenience Constructors ====================

impl ResponsePayload {
    pub fn success(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_code: None,
            data,
        }
    }

    pub fn error(message: impl Into<String>, code: Option<ErrorCode>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_code: code,
            data: None,
        }
    }
}

impl PresencePayload {
    pub fn attached(sink_id: impl Into<String>) -> Self {
        Self {
            presence: Presence::HasPrinter,
            sink_id: Some(sink_id.into()),
        }
    }

    pub fn detached() -> Self {
        Self {
            presence: Presence::NoPrinter,
            sink_id: None,
        }
    }
}
