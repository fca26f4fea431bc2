//! Job channel TCP server
//!
//! Handles terminal connections:
//! - listening / accepting
//! - protocol handshake and terminal id assignment
//! - per-connection forwarder (hub -> terminal, with unicast filtering)
//! - reader loop (terminal -> hub, with source injection)
//! - disconnect cleanup (directory removal before registry removal)

use std::net::SocketAddr;
use std::sync::Arc;

use shared::message::{
    ChannelMessage, EventType, HandshakePayload, PROTOCOL_VERSION, PresenceSyncPayload,
    ResponsePayload,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::bus::MessageBus;
use super::tcp::TcpTransport;
use super::Transport;
use crate::dispatch::HubCore;
use crate::error::HubError;
use shared::ErrorCode;

impl MessageBus {
    /// Start the job channel TCP server
    ///
    /// Accepts terminal connections, performs the protocol handshake,
    /// forwards hub broadcasts to each terminal and terminal messages to
    /// the hub, and shuts down gracefully on the cancellation signal.
    pub async fn start_tcp_server(&self, core: Arc<HubCore>) -> Result<(), HubError> {
        let listener = TcpListener::bind(&self.config.tcp_listen_addr)
            .await
            .map_err(|e| HubError::internal(format!("Failed to bind: {}", e)))?;

        tracing::info!(
            "Job channel TCP server listening on {}",
            self.config.tcp_listen_addr
        );

        self.accept_loop(listener, core).await
    }

    /// Main accept loop
    async fn accept_loop(&self, listener: TcpListener, core: Arc<HubCore>) -> Result<(), HubError> {
        loop {
            tokio::select! {
                _ = self.shutdown_token().cancelled() => {
                    tracing::info!("Job channel TCP server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Terminal connected: {}", addr);
                            self.spawn_terminal_handler(stream, addr, core.clone());
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Spawn a task handling one terminal connection
    fn spawn_terminal_handler(&self, stream: TcpStream, addr: SocketAddr, core: Arc<HubCore>) {
        let hub_tx = self.sender().clone();
        let terminal_tx = self.sender_to_hub().clone();
        let shutdown_token = self.shutdown_token().clone();
        let terminals = self.terminals.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_terminal_connection(
                stream,
                addr,
                hub_tx,
                terminal_tx,
                shutdown_token,
                terminals,
                core,
            )
            .await
            {
                tracing::debug!("Terminal {} handler finished: {}", addr, e);
            }
        });
    }
}

/// Handle a single terminal connection
async fn handle_terminal_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub_tx: broadcast::Sender<ChannelMessage>,
    terminal_tx: broadcast::Sender<ChannelMessage>,
    shutdown_token: CancellationToken,
    terminals: Arc<dashmap::DashMap<String, Arc<dyn Transport>>>,
    core: Arc<HubCore>,
) -> Result<(), HubError> {
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(stream));

    // Protocol handshake
    let terminal_id = perform_handshake(&transport, addr).await?;

    // Register the connection
    if terminals
        .insert(terminal_id.clone(), transport.clone())
        .is_some()
    {
        tracing::warn!(terminal_id = %terminal_id, "terminal reconnected, replacing old transport");
    }
    tracing::debug!("Terminal registered: {}", terminal_id);

    // Shared disconnect token for reader and forwarder
    let disconnect_token = CancellationToken::new();

    let forward_handle = spawn_hub_to_terminal_forwarder(
        transport.clone(),
        hub_tx.subscribe(),
        shutdown_token.clone(),
        terminal_id.clone(),
        disconnect_token.clone(),
        core.clone(),
    );

    read_terminal_messages(
        &transport,
        &terminal_tx,
        &shutdown_token,
        &terminal_id,
        addr,
        disconnect_token,
    )
    .await;

    // Cleanup: the directory entry goes first so no routing decision can
    // still pick this terminal, then the connection registry entry. A
    // reconnect may already have re-registered this id; that newer
    // connection's state must survive this teardown.
    let superseded = terminals
        .get(&terminal_id)
        .map(|t| !Arc::ptr_eq(t.value(), &transport))
        .unwrap_or(true);
    if superseded {
        tracing::debug!(terminal_id = %terminal_id, "stale connection closed, registry untouched");
    } else {
        core.handle_disconnect(&terminal_id).await;
        terminals.remove_if(&terminal_id, |_, t| Arc::ptr_eq(t, &transport));
        tracing::debug!(terminal_id = %terminal_id, "Terminal removed from registry");
    }
    drop(forward_handle);
    let _ = transport.close().await;

    Ok(())
}

/// Perform the protocol handshake with a terminal
async fn perform_handshake(
    transport: &Arc<dyn Transport>,
    addr: SocketAddr,
) -> Result<String, HubError> {
    tracing::debug!("Waiting for handshake from {}", addr);

    let msg = transport.read_message().await.map_err(|e| {
        tracing::warn!("Terminal {} handshake error: {}", addr, e);
        e
    })?;

    if msg.event_type != EventType::Handshake {
        tracing::warn!(
            "Terminal {} failed to handshake: expected Handshake, got {}",
            addr,
            msg.event_type
        );
        return Err(HubError::invalid("Expected Handshake message"));
    }

    let payload: HandshakePayload = msg.parse_payload().map_err(|e| {
        tracing::warn!("Terminal {} sent invalid handshake payload: {}", addr, e);
        HubError::invalid(format!("Invalid handshake payload: {}", e))
    })?;

    // Version check
    if payload.version != PROTOCOL_VERSION {
        tracing::warn!(
            "Terminal {} protocol version mismatch: expected {}, got {}",
            addr,
            PROTOCOL_VERSION,
            payload.version
        );

        send_handshake_error(
            transport,
            &msg,
            &format!(
                "Protocol version mismatch: hub={}, terminal={}. Please update your client.",
                PROTOCOL_VERSION, payload.version
            ),
        )
        .await;

        return Err(HubError::invalid("Protocol version mismatch"));
    }

    let terminal_id = payload
        .terminal_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::debug!(
        "Terminal {} handshake success (v{}, name: {:?}, id: {})",
        addr,
        payload.version,
        payload.terminal_name,
        terminal_id
    );

    // Correlated handshake response carrying the registered id
    let response_payload = ResponsePayload::success(
        format!("Connected as terminal: {}", terminal_id),
        Some(serde_json::json!({ "terminal_id": terminal_id })),
    );
    let response = ChannelMessage::response(&response_payload).with_correlation_id(msg.request_id);
    if let Err(e) = transport.write_message(&response).await {
        tracing::warn!("Failed to send handshake response: {}", e);
    }

    Ok(terminal_id)
}

/// Delay before closing the connection after a handshake error
const HANDSHAKE_ERROR_DELAY_MS: u64 = 100;

/// Send a handshake error to the terminal
async fn send_handshake_error(transport: &Arc<dyn Transport>, msg: &ChannelMessage, message: &str) {
    let response_payload = ResponsePayload::error(message, Some(ErrorCode::ProtocolMismatch));
    let response = ChannelMessage::response(&response_payload).with_correlation_id(msg.request_id);

    if let Err(e) = transport.write_message(&response).await {
        tracing::error!("Failed to send handshake error: {}", e);
    }

    // Give the terminal time to receive the message before closing
    tokio::time::sleep(tokio::time::Duration::from_millis(HANDSHAKE_ERROR_DELAY_MS)).await;
}

/// Spawn the task forwarding hub messages to one terminal
fn spawn_hub_to_terminal_forwarder(
    transport: Arc<dyn Transport>,
    mut rx: broadcast::Receiver<ChannelMessage>,
    shutdown_token: CancellationToken,
    terminal_id: String,
    disconnect_token: CancellationToken,
    core: Arc<HubCore>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    tracing::debug!("Terminal {} forwarder shutting down", terminal_id);
                    break;
                }
                _ = disconnect_token.cancelled() => {
                    tracing::debug!(terminal_id = %terminal_id, "Terminal disconnected, forwarder stopping");
                    break;
                }
                msg_result = rx.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            // Unicast filtering: skip messages for other terminals
                            if msg.target.as_ref().is_some_and(|target| target != &terminal_id) {
                                continue;
                            }

                            if let Err(e) = transport.write_message(&msg).await {
                                tracing::debug!(terminal_id = %terminal_id, "Terminal write failed: {}", e);
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Slow terminal fell behind the broadcast buffer;
                            // a fresh snapshot supersedes everything it missed
                            tracing::warn!(
                                terminal_id = %terminal_id,
                                dropped_messages = n,
                                "Terminal lagged behind, resending directory snapshot"
                            );

                            let payload = PresenceSyncPayload {
                                entries: core.directory().snapshot(),
                            };
                            let resync = ChannelMessage::presence_sync(&payload)
                                .with_target(&terminal_id);
                            if let Err(e) = transport.write_message(&resync).await {
                                tracing::debug!(terminal_id = %terminal_id, "Failed to send resync snapshot: {}", e);
                                break;
                            }
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!(terminal_id = %terminal_id, "Broadcast channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(terminal_id = %terminal_id, "Terminal forwarder stopped");
    })
}

/// Read messages from a terminal and forward them to the hub
async fn read_terminal_messages(
    transport: &Arc<dyn Transport>,
    terminal_tx: &broadcast::Sender<ChannelMessage>,
    shutdown_token: &CancellationToken,
    terminal_id: &str,
    addr: SocketAddr,
    disconnect_token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                break;
            }

            read_result = transport.read_message() => {
                match read_result {
                    Ok(mut msg) => {
                        // Inject the registered terminal id (source tracking)
                        msg.source = Some(terminal_id.to_string());

                        // PresenceSync is hub-originated only
                        if msg.event_type == EventType::PresenceSync {
                            tracing::warn!(
                                terminal_addr = %addr,
                                "Terminal attempted to send PresenceSync. Dropping message."
                            );
                            continue;
                        }

                        if let Err(e) = terminal_tx.send(msg) {
                            tracing::warn!("Failed to publish terminal message: {}", e);
                        }
                    }
                    Err(e) => {
                        if matches!(e, HubError::TerminalDisconnected) {
                            tracing::debug!(terminal_id = %terminal_id, "Terminal {} disconnected", addr);
                        } else {
                            tracing::debug!(terminal_id = %terminal_id, "Terminal {} read error: {}", addr, e);
                        }
                        disconnect_token.cancel();
                        break;
                    }
                }
            }
        }
    }
}
