//! Terminal-side job channel transports
//!
//! The same wire frame the hub speaks: kind (1) + request id (16) +
//! correlation id (16, nil = none) + per-sender sequence (8, LE) + payload
//! length (4, LE) + payload.

use std::sync::Arc;

use shared::message::{ChannelMessage, EventType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Terminal-side transport
#[derive(Debug, Clone)]
pub enum ClientTransport {
    Tcp(TcpTransport),
    Memory(MemoryTransport),
}

impl ClientTransport {
    pub async fn read_message(&self) -> ClientResult<ChannelMessage> {
        match self {
            ClientTransport::Tcp(t) => t.read_message().await,
            ClientTransport::Memory(t) => t.read_message().await,
        }
    }

    pub async fn write_message(&self, msg: &ChannelMessage) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => t.write_message(msg).await,
            ClientTransport::Memory(t) => t.write_message(msg).await,
        }
    }

    pub async fn close(&self) -> ClientResult<()> {
        match self {
            ClientTransport::Tcp(t) => t.close().await,
            ClientTransport::Memory(t) => t.close().await,
        }
    }
}

/// TCP transport (terminal side)
#[derive(Debug, Clone)]
pub struct TcpTransport {
    reader: Arc<Mutex<OwnedReadHalf>>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpTransport {
    /// Connect to the hub
    pub async fn connect(addr: &str) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ClientError::Connection(format!("TCP connect failed: {}", e)))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        })
    }

    pub async fn read_message(&self) -> ClientResult<ChannelMessage> {
        let mut reader = self.reader.lock().await;
        read_from_stream(&mut *reader).await
    }

    pub async fn write_message(&self, msg: &ChannelMessage) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        write_to_stream(&mut *writer, msg).await
    }

    pub async fn close(&self) -> ClientResult<()> {
        let mut writer = self.writer.lock().await;
        writer
            .shutdown()
            .await
            .map_err(|e| ClientError::Connection(format!("TCP close failed: {}", e)))?;
        Ok(())
    }
}

/// In-process transport for a terminal co-located with the hub
///
/// Wired to the hub bus's broadcast channels; used by tests.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    rx: Arc<Mutex<broadcast::Receiver<ChannelMessage>>>,
    tx: broadcast::Sender<ChannelMessage>,
}

impl MemoryTransport {
    /// Create from the hub's broadcast sender and terminal-to-hub sender
    pub fn new(
        hub_tx: &broadcast::Sender<ChannelMessage>,
        terminal_tx: &broadcast::Sender<ChannelMessage>,
    ) -> Self {
        Self {
            rx: Arc::new(Mutex::new(hub_tx.subscribe())),
            tx: terminal_tx.clone(),
        }
    }

    pub async fn read_message(&self) -> ClientResult<ChannelMessage> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|_| ClientError::ChannelDisconnected)
    }

    pub async fn write_message(&self, msg: &ChannelMessage) -> ClientResult<()> {
        self.tx
            .send(msg.clone())
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        Ok(())
    }

    pub async fn close(&self) -> ClientResult<()> {
        Ok(())
    }
}

// ========== Frame helpers ==========

async fn read_from_stream<R: AsyncReadExt + Unpin>(
    reader: &mut R,
) -> ClientResult<ChannelMessage> {
    let mut kind_buf = [0u8; 1];
    match reader.read_exact(&mut kind_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ClientError::ChannelDisconnected);
        }
        Err(e) => {
            return Err(ClientError::Connection(format!("Read kind failed: {}", e)));
        }
    }

    let event_type = EventType::try_from(kind_buf[0])
        .map_err(|_| ClientError::Connection("Invalid event type".to_string()))?;

    let mut uuid_buf = [0u8; 16];
    reader
        .read_exact(&mut uuid_buf)
        .await
        .map_err(|e| ClientError::Connection(format!("Read request id failed: {}", e)))?;
    let request_id = Uuid::from_bytes(uuid_buf);

    let mut correlation_buf = [0u8; 16];
    reader
        .read_exact(&mut correlation_buf)
        .await
        .map_err(|e| ClientError::Connection(format!("Read correlation id failed: {}", e)))?;
    let correlation_id_raw = Uuid::from_bytes(correlation_buf);
    let correlation_id = if correlation_id_raw.is_nil() {
        None
    } else {
        Some(correlation_id_raw)
    };

    let mut seq_buf = [0u8; 8];
    reader
        .read_exact(&mut seq_buf)
        .await
        .map_err(|e| ClientError::Connection(format!("Read sequence failed: {}", e)))?;
    let sequence = u64::from_le_bytes(seq_buf);

    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| ClientError::Connection(format!("Read len failed: {}", e)))?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ClientError::Connection(format!("Read payload failed: {}", e)))?;

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

async fn write_to_stream<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &ChannelMessage,
) -> ClientResult<()> {
    let mut data = Vec::with_capacity(45 + msg.payload.len());
    data.push(msg.event_type as u8);
    data.extend_from_slice(msg.request_id.as_bytes());
    data.extend_from_slice(&msg.correlation_id.unwrap_or(Uuid::nil()).into_bytes());
    data.extend_from_slice(&msg.sequence.to_le_bytes());
    data.extend_from_slice(&(msg.payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&msg.payload);

    writer
        .write_all(&data)
        .await
        .map_err(|e| ClientError::Connection(format!("Write failed: {}", e)))?;
    Ok(())
}
