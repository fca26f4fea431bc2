//! Job channel transport layer
//!
//! Pluggable transport architecture:
//! ```text
//!         ┌────────────────────┐
//!         │   Transport Trait  │
//!         └────────┬───────────┘
//!                  │
//!          ┌───────┴───────┐
//!          ▼               ▼
//!     TcpTransport   MemoryTransport
//!     (network)      (in-process)
//! ```
//!
//! Wire frame, little-endian: kind (1) + request id (16) + correlation id
//! (16, nil = none) + per-sender sequence (8) + payload length (4) +
//! payload. `source`/`target` are hub-internal routing fields and never
//! cross the wire.

mod bus;
mod memory;
mod server;
mod tcp;

pub use bus::{ConnectedTerminal, MessageBus, TransportConfig};
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use shared::message::{ChannelMessage, EventType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::HubError;

/// Job channel transport
///
/// All transport implementations must support message reads and writes and
/// connection teardown.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Read one message from the transport
    async fn read_message(&self) -> Result<ChannelMessage, HubError>;

    /// Write one message to the transport
    async fn write_message(&self, msg: &ChannelMessage) -> Result<(), HubError>;

    /// Close the connection
    async fn close(&self) -> Result<(), HubError>;

    /// Peer address, when the transport has one
    fn peer_addr(&self) -> Option<String> {
        None
    }
}

// ========== Frame helpers ==========

/// Read a ChannelMessage from an async stream
pub(crate) async fn read_from_stream<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<ChannelMessage, HubError> {
    // Event kind (1 byte)
    let mut kind_buf = [0u8; 1];
    match reader.read_exact(&mut kind_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(HubError::TerminalDisconnected);
        }
        Err(e) => {
            return Err(HubError::internal(format!("Read kind failed: {}", e)));
        }
    }

    let event_type =
        EventType::try_from(kind_buf[0]).map_err(|_| HubError::invalid("Invalid event type"))?;

    // Request ID (16 bytes)
    let mut uuid_buf = [0u8; 16];
    reader
        .read_exact(&mut uuid_buf)
        .await
        .map_err(|e| HubError::internal(format!("Read request id failed: {}", e)))?;
    let request_id = Uuid::from_bytes(uuid_buf);

    // Correlation ID (16 bytes, nil = none)
    let mut correlation_buf = [0u8; 16];
    reader
        .read_exact(&mut correlation_buf)
        .await
        .map_err(|e| HubError::internal(format!("Read correlation id failed: {}", e)))?;
    let correlation_id_raw = Uuid::from_bytes(correlation_buf);
    let correlation_id = if correlation_id_raw.is_nil() {
        None
    } else {
        Some(correlation_id_raw)
    };

    // Per-sender sequence (8 bytes)
    let mut seq_buf = [0u8; 8];
    reader
        .read_exact(&mut seq_buf)
        .await
        .map_err(|e| HubError::internal(format!("Read sequence failed: {}", e)))?;
    let sequence = u64::from_le_bytes(seq_buf);

    // Payload length (4 bytes)
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| HubError::internal(format!("Read len failed: {}", e)))?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Payload
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| HubError::internal(format!("Read payload failed: {}", e)))?;

    Ok(ChannelMessage {
        request_id,
        event_type,
        sequence,
        source: None,
        correlation_id,
        target: None,
        payload,
    })
}

/// Write a ChannelMessage to an async stream
pub(crate) async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &ChannelMessage,
) -> Result<(), HubError> {
    let mut data = Vec::with_capacity(45 + msg.payload.len());
    data.push(msg.event_type as u8);
    data.extend_from_slice(msg.request_id.as_bytes());

    // Correlation id (16 bytes) - nil UUID stands for None
    let correlation_bytes = msg.correlation_id.unwrap_or(Uuid::nil()).into_bytes();
    data.extend_from_slice(&correlation_bytes);

    data.extend_from_slice(&msg.sequence.to_le_bytes());
    data.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&msg.payload);

    writer
        .write_all(&data)
        .await
        .map_err(|e| HubError::internal(format!("Write failed: {}", e)))?;
    Ok(())
}
