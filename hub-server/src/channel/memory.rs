//! Memory transport implementation (in-process communication)

use std::sync::Arc;

use async_trait::async_trait;
use shared::message::ChannelMessage;
use tokio::sync::Mutex;
use tokio::sync::broadcast;

use super::Transport;
use crate::error::HubError;

/// In-process memory transport for same-process communication
///
/// Uses a tokio broadcast channel internally. Used by tests and by
/// terminals co-located with the hub process.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    rx: Arc<Mutex<broadcast::Receiver<ChannelMessage>>>,
    tx: Option<Arc<broadcast::Sender<ChannelMessage>>>,
}

impl MemoryTransport {
    /// Create from a bus sender (receives hub broadcasts only)
    pub fn new(tx: &broadcast::Sender<ChannelMessage>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(tx.subscribe())),
            tx: None,
        }
    }

    /// Create with a terminal-side sender (can also send to the hub)
    pub fn with_terminal_sender(
        broadcast_tx: &broadcast::Sender<ChannelMessage>,
        terminal_tx: &broadcast::Sender<ChannelMessage>,
    ) -> Self {
        Self {
            rx: Arc::new(Mutex::new(broadcast_tx.subscribe())),
            tx: Some(Arc::new(terminal_tx.clone())),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read_message(&self) -> Result<ChannelMessage, HubError> {
        let mut rx = self.rx.lock().await;
        rx.recv()
            .await
            .map_err(|e| HubError::internal(e.to_string()))
    }

    async fn write_message(&self, msg: &ChannelMessage) -> Result<(), HubError> {
        if let Some(tx) = &self.tx {
            tx.send(msg.clone())
                .map_err(|e| HubError::internal(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), HubError> {
        Ok(())
    }
}
