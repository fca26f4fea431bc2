//! Job channel message types
//!
//! These types are shared between the hub and the terminals, for both
//! in-process (memory) and network (TCP) communication. Every message
//! carries a per-sender monotonic sequence number and, once it has passed
//! the hub, the stable id of the terminal that sent it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod payload;
pub use payload::*;

/// Protocol version number
pub const PROTOCOL_VERSION: u16 = 1;

/// Job channel event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Connection handshake (terminal -> hub)
    Handshake = 0,
    /// Correlated reply to a request
    Response = 1,
    /// Presence state of a single terminal (terminal -> hub)
    PresenceAnnounce = 2,
    /// Full directory snapshot fan-out (hub -> all terminals)
    PresenceSync = 3,
    /// Delegated print job (terminal -> hub -> executing terminal)
    PrintJobRequest = 4,
    /// Job executed successfully (executor -> hub -> requester)
    PrintJobAck = 5,
    /// Job failed (executor/hub -> requester)
    PrintJobNack = 6,
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Handshake),
            1 => Ok(EventType::Response),
            2 => Ok(EventType::PresenceAnnounce),
            3 => Ok(EventType::PresenceSync),
            4 => Ok(EventType::PrintJobRequest),
            5 => Ok(EventType::PrintJobAck),
            6 => Ok(EventType::PrintJobNack),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Handshake => write!(f, "handshake"),
            EventType::Response => write!(f, "response"),
            EventType::PresenceAnnounce => write!(f, "presence_announce"),
            EventType::PresenceSync => write!(f, "presence_sync"),
            EventType::PrintJobRequest => write!(f, "print_job_request"),
            EventType::PrintJobAck => write!(f, "print_job_ack"),
            EventType::PrintJobNack => write!(f, "print_job_nack"),
        }
    }
}

/// Job channel message envelope
///
/// `source` and `target` never cross the wire: the hub injects `source`
/// from the handshake-registered terminal id and uses `target` for unicast
/// filtering in the per-connection forwarder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub request_id: Uuid,
    pub event_type: EventType,
    /// Per-sender monotonic sequence number
    pub sequence: u64,
    /// Sending terminal id (injected by the hub)
    pub source: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub target: Option<String>,
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    pub fn new(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event_type,
            sequence: 0,
            source: None,
            correlation_id: None,
            target: None,
            payload,
        }
    }

    /// Set the per-sender sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the target terminal (unicast)
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// Set the correlation id (for replies)
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Build a handshake message
    pub fn handshake(payload: &HandshakePayload) -> Self {
        Self::new(
            EventType::Handshake,
            serde_json::to_vec(payload).expect("Failed to serialize handshake payload"),
        )
    }

    /// Build a response message
    pub fn response(payload: &ResponsePayload) -> Self {
        Self::new(
            EventType::Response,
            serde_json::to_vec(payload).expect("Failed to serialize response payload"),
        )
    }

    /// Build a presence announcement
    pub fn presence_announce(payload: &PresencePayload) -> Self {
        Self::new(
            EventType::PresenceAnnounce,
            serde_json::to_vec(payload).expect("Failed to serialize presence payload"),
        )
    }

    /// Build a directory snapshot fan-out
    pub fn presence_sync(payload: &PresenceSyncPayload) -> Self {
        Self::new(
            EventType::PresenceSync,
            serde_json::to_vec(payload).expect("Failed to serialize presence sync payload"),
        )
    }

    /// Build a print job request
    pub fn print_job(payload: &PrintJobPayload) -> Self {
        Self::new(
            EventType::PrintJobRequest,
            serde_json::to_vec(payload).expect("Failed to serialize print job payload"),
        )
    }

    /// Build a job ack
    pub fn print_ack(payload: &PrintAckPayload) -> Self {
        Self::new(
            EventType::PrintJobAck,
            serde_json::to_vec(payload).expect("Failed to serialize ack payload"),
        )
    }

    /// Build a job nack
    pub fn print_nack(payload: &PrintNackPayload) -> Self {
        Self::new(
            EventType::PrintJobNack,
            serde_json::to_vec(payload).expect("Failed to serialize nack payload"),
        )
    }

    /// Parse the payload as the given type
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_message() {
        let payload = HandshakePayload {
            version: PROTOCOL_VERSION,
            terminal_id: Some("till-1".to_string()),
            terminal_name: Some("front desk".to_string()),
            client_version: Some("0.1.0".to_string()),
        };

        let msg = ChannelMessage::handshake(&payload);
        assert_eq!(msg.event_type, EventType::Handshake);
        assert!(!msg.request_id.is_nil());

        let parsed: HandshakePayload = msg.parse_payload().unwrap();
        assert_eq!(parsed.version, PROTOCOL_VERSION);
        assert_eq!(parsed.terminal_id.as_deref(), Some("till-1"));
    }

    #[test]
    fn test_presence_announce_roundtrip() {
        let payload = PresencePayload {
            presence: crate::models::Presence::HasPrinter,
            sink_id: Some("net:192.168.0.40:9100".to_string()),
        };

        let msg = ChannelMessage::presence_announce(&payload).with_sequence(7);
        assert_eq!(msg.sequence, 7);

        let parsed: PresencePayload = msg.parse_payload().unwrap();
        assert_eq!(parsed.presence, crate::models::Presence::HasPrinter);
    }

    #[test]
    fn test_unicast_target() {
        let payload = PrintNackPayload {
            job_id: Uuid::new_v4(),
            code: crate::ErrorCode::NoPrinterAvailable,
            reason: "no terminal reports a printer".to_string(),
        };

        let msg = ChannelMessage::print_nack(&payload).with_target("till-2");
        assert_eq!(msg.target.as_deref(), Some("till-2"));
        assert_eq!(msg.event_type, EventType::PrintJobNack);
    }

    #[test]
    fn test_event_type_tags_are_stable() {
        for raw in 0u8..=6 {
            let parsed = EventType::try_from(raw).unwrap();
            assert_eq!(parsed as u8, raw);
        }
        assert!(EventType::try_from(7).is_err());
    }
}
