//! Message bus core
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     MessageBus                          │
//! │  terminal_tx (terminals -> hub)                         │
//! │  hub_tx      (hub -> per-connection forwarders)         │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//!               ┌──────────┴──────────┐
//!               │    Transport Trait  │
//!               └──────────┬──────────┘
//!                          │
//!              ┌───────────┴───────────┐
//!              ▼                       ▼
//!         TcpTransport          MemoryTransport
//! ```
//!
//! # Message flow
//!
//! ```text
//! Terminal ──▶ send_to_hub() ──▶ terminal_tx ──▶ HubDispatcher
//!                                            │
//! Hub ──▶ publish() ───────────▶ hub_tx ─────┤
//!                                            ▼
//!                                  Connected terminals
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::ChannelMessage;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{MemoryTransport, Transport};
use crate::error::HubError;

/// Configuration for the transport layer
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tcp_listen_addr: String,
    /// Capacity of the broadcast channel (default: 1024)
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tcp_listen_addr: "0.0.0.0:7411".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// A registered terminal connection
#[derive(Debug, Clone)]
pub struct ConnectedTerminal {
    pub id: String,
    pub addr: Option<String>,
}

/// Message bus - routes job channel traffic between hub and terminals
///
/// # Responsibilities
///
/// - message routing (send_to_hub, publish, send_to_terminal)
/// - connection management (register, unregister, connected_terminals)
/// - transport abstraction (TCP / memory)
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// Terminal-to-hub message channel
    terminal_tx: broadcast::Sender<ChannelMessage>,
    /// Hub-to-terminal broadcast channel
    hub_tx: broadcast::Sender<ChannelMessage>,
    /// Transport configuration
    pub(crate) config: TransportConfig,
    /// Shutdown signal token
    shutdown_token: CancellationToken,
    /// Connected terminals (terminal id -> transport)
    pub(crate) terminals: Arc<DashMap<String, Arc<dyn Transport>>>,
}

impl MessageBus {
    /// Create a bus with default configuration
    pub fn new() -> Self {
        Self::from_config(TransportConfig::default())
    }

    /// Create a bus from configuration
    pub fn from_config(config: TransportConfig) -> Self {
        let capacity = config.channel_capacity;
        let (terminal_tx, _) = broadcast::channel(capacity);
        let (hub_tx, _) = broadcast::channel(capacity);
        Self {
            terminal_tx,
            hub_tx,
            config,
            shutdown_token: CancellationToken::new(),
            terminals: Arc::new(DashMap::new()),
        }
    }

    /// Publish a message (hub -> all subscribers)
    pub async fn publish(&self, msg: ChannelMessage) -> Result<(), HubError> {
        self.hub_tx
            .send(msg)
            .map_err(|e| HubError::internal(e.to_string()))?;
        Ok(())
    }

    /// Send a message to the hub (terminal -> hub)
    pub async fn send_to_hub(&self, msg: ChannelMessage) -> Result<(), HubError> {
        self.terminal_tx
            .send(msg)
            .map_err(|e| HubError::internal(e.to_string()))?;
        Ok(())
    }

    /// Send a message to a specific terminal (unicast)
    ///
    /// # Errors
    ///
    /// Not-found when the terminal is not connected.
    pub async fn send_to_terminal(
        &self,
        terminal_id: &str,
        msg: ChannelMessage,
    ) -> Result<(), HubError> {
        if let Some(transport) = self.terminals.get(terminal_id) {
            transport.write_message(&msg).await.map_err(|e| {
                HubError::internal(format!("Failed to send to terminal {}: {}", terminal_id, e))
            })?;
            Ok(())
        } else {
            Err(HubError::not_found(format!(
                "Terminal {} not connected",
                terminal_id
            )))
        }
    }

    /// Subscribe to terminal messages (hub dispatcher use only)
    pub fn subscribe_to_terminals(&self) -> broadcast::Receiver<ChannelMessage> {
        self.terminal_tx.subscribe()
    }

    /// Subscribe to hub broadcasts (terminals use this)
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.hub_tx.subscribe()
    }

    /// Get a memory transport (receives hub broadcasts)
    pub fn memory_transport(&self) -> MemoryTransport {
        MemoryTransport::new(&self.hub_tx)
    }

    /// Get a terminal-side memory transport (can send to the hub)
    pub fn terminal_memory_transport(&self) -> MemoryTransport {
        MemoryTransport::with_terminal_sender(&self.hub_tx, &self.terminal_tx)
    }

    /// Terminal-to-hub sender (advanced use)
    pub fn sender_to_hub(&self) -> &broadcast::Sender<ChannelMessage> {
        &self.terminal_tx
    }

    /// Hub broadcast sender (advanced use)
    pub fn sender(&self) -> &broadcast::Sender<ChannelMessage> {
        &self.hub_tx
    }

    /// Shutdown token (for monitoring shutdown signals)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// List connected terminals
    pub fn connected_terminals(&self) -> Vec<ConnectedTerminal> {
        self.terminals
            .iter()
            .map(|entry| ConnectedTerminal {
                id: entry.key().clone(),
                addr: entry.value().peer_addr(),
            })
            .collect()
    }

    /// Gracefully shut down the bus and all connection tasks
    pub fn shutdown(&self) {
        tracing::info!("Shutting down message bus");
        self.shutdown_token.cancel();
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::{ChannelMessage, EventType, PresencePayload};

    #[tokio::test]
    async fn test_memory_transport_receives_broadcast() {
        let bus = MessageBus::new();
        let transport = bus.memory_transport();

        let payload = PresencePayload::attached("net:10.0.0.5:9100");
        bus.publish(ChannelMessage::presence_announce(&payload))
            .await
            .unwrap();

        let received = transport.read_message().await.unwrap();
        assert_eq!(received.event_type, EventType::PresenceAnnounce);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = MessageBus::new();
        let t1 = bus.memory_transport();
        let t2 = bus.memory_transport();

        let payload = PresencePayload::detached();
        bus.publish(ChannelMessage::presence_announce(&payload))
            .await
            .unwrap();

        let r1 = t1.read_message().await.unwrap();
        let r2 = t2.read_message().await.unwrap();

        assert_eq!(r1.event_type, EventType::PresenceAnnounce);
        assert_eq!(r2.event_type, EventType::PresenceAnnounce);
    }

    #[tokio::test]
    async fn test_send_to_unknown_terminal_fails() {
        let bus = MessageBus::new();
        let msg = ChannelMessage::new(EventType::Response, Vec::new());

        let err = bus.send_to_terminal("till-9", msg).await.unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }
}
