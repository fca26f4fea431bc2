//! Terminal client
//!
//! One connection to the hub per terminal. Handles the handshake, stamps
//! every outgoing message with the per-sender sequence, and dispatches
//! incoming traffic: job outcomes to whoever awaits them by job id,
//! everything to the event subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shared::message::{
    ChannelMessage, EventType, HandshakePayload, PROTOCOL_VERSION, PresencePayload,
    PrintAckPayload, PrintJobPayload, PrintNackPayload, ResponsePayload,
};
use shared::models::PrintJob;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::transport::{ClientTransport, MemoryTransport, TcpTransport};

/// How long to wait for the hub's handshake response
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Terminal connection to the job channel
#[derive(Debug, Clone)]
pub struct TerminalClient {
    transport: ClientTransport,
    terminal_id: String,
    sequence: Arc<AtomicU64>,
    event_tx: broadcast::Sender<ChannelMessage>,
    pending_jobs: Arc<Mutex<HashMap<Uuid, oneshot::Sender<ChannelMessage>>>>,
    connected: Arc<AtomicBool>,
}

impl TerminalClient {
    /// Connect to the hub over TCP
    pub async fn connect(
        addr: &str,
        terminal_id: Option<&str>,
        terminal_name: &str,
    ) -> ClientResult<Self> {
        let transport = ClientTransport::Tcp(TcpTransport::connect(addr).await?);
        Self::handshake_and_spawn(transport, terminal_id, terminal_name).await
    }

    /// Connect over an in-process memory transport
    pub async fn connect_memory(
        hub_tx: &broadcast::Sender<ChannelMessage>,
        terminal_tx: &broadcast::Sender<ChannelMessage>,
        terminal_id: &str,
    ) -> ClientResult<Self> {
        let transport = ClientTransport::Memory(MemoryTransport::new(hub_tx, terminal_tx));
        Self::handshake_and_spawn(transport, Some(terminal_id), terminal_id).await
    }

    async fn handshake_and_spawn(
        transport: ClientTransport,
        terminal_id: Option<&str>,
        terminal_name: &str,
    ) -> ClientResult<Self> {
        let payload = HandshakePayload {
            version: PROTOCOL_VERSION,
            terminal_id: terminal_id.map(str::to_string),
            terminal_name: Some(terminal_name.to_string()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        };
        let handshake = ChannelMessage::handshake(&payload);
        let handshake_id = handshake.request_id;
        transport.write_message(&handshake).await?;

        // The handshake response is read inline, before the dispatch task
        // takes over the transport.
        let assigned_id = match &transport {
            // Memory transports skip the handshake exchange: the test
            // harness wires them straight into the bus channels.
            ClientTransport::Memory(_) => terminal_id
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            ClientTransport::Tcp(_) => {
                let response =
                    tokio::time::timeout(HANDSHAKE_TIMEOUT, transport.read_message())
                        .await
                        .map_err(|_| {
                            ClientError::Timeout("handshake response timed out".to_string())
                        })??;

                if response.correlation_id != Some(handshake_id) {
                    return Err(ClientError::Connection(
                        "unexpected message during handshake".to_string(),
                    ));
                }

                let payload: ResponsePayload = response.parse_payload().map_err(|e| {
                    ClientError::Connection(format!("Invalid handshake response: {}", e))
                })?;
                if !payload.success {
                    return Err(ClientError::Connection(payload.message));
                }

                payload
                    .data
                    .as_ref()
                    .and_then(|d| d.get("terminal_id"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        ClientError::Connection(
                            "handshake response missing terminal id".to_string(),
                        )
                    })?
            }
        };

        tracing::info!(terminal_id = %assigned_id, "connected to hub");
        Ok(Self::spawn_dispatch(transport, assigned_id))
    }

    fn spawn_dispatch(transport: ClientTransport, terminal_id: String) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        let pending_jobs: Arc<Mutex<HashMap<Uuid, oneshot::Sender<ChannelMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        let client = Self {
            transport: transport.clone(),
            terminal_id,
            sequence: Arc::new(AtomicU64::new(1)),
            event_tx: event_tx.clone(),
            pending_jobs: pending_jobs.clone(),
            connected: connected.clone(),
        };

        tokio::spawn(async move {
            loop {
                match transport.read_message().await {
                    Ok(msg) => {
                        // Job outcomes settle their waiter by job id
                        if let Some(job_id) = outcome_job_id(&msg) {
                            let waiter = pending_jobs.lock().unwrap().remove(&job_id);
                            if let Some(tx) = waiter {
                                let _ = tx.send(msg.clone());
                            }
                        }

                        // Everything also reaches the event subscribers
                        if let Err(e) = event_tx.send(msg) {
                            tracing::debug!("No subscribers for event: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Job channel read error: {}", e);
                        connected.store(false, Ordering::SeqCst);
                        // Waiters would otherwise hang until their timeout
                        pending_jobs.lock().unwrap().clear();
                        break;
                    }
                }
            }
        });

        client
    }

    /// This terminal's registered id
    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    /// Whether the dispatch loop still has a live transport
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a message, stamping the per-sender sequence
    pub async fn send(&self, msg: ChannelMessage) -> ClientResult<()> {
        if !self.is_connected() {
            return Err(ClientError::ChannelDisconnected);
        }
        let msg = msg.with_sequence(self.next_sequence());
        self.transport.write_message(&msg).await
    }

    /// Announce this terminal's presence state
    pub async fn announce_presence(&self, payload: &PresencePayload) -> ClientResult<()> {
        self.send(ChannelMessage::presence_announce(payload)).await
    }

    /// Send a print job and return a receiver for its ack/nack
    pub async fn submit_job(
        &self,
        job: &PrintJob,
    ) -> ClientResult<oneshot::Receiver<ChannelMessage>> {
        let (tx, rx) = oneshot::channel();
        self.pending_jobs.lock().unwrap().insert(job.job_id, tx);

        let msg = ChannelMessage::print_job(&PrintJobPayload { job: job.clone() });
        if let Err(e) = self.send(msg).await {
            self.pending_jobs.lock().unwrap().remove(&job.job_id);
            return Err(e);
        }
        Ok(rx)
    }

    /// Forget a job waiter (after a timeout)
    pub fn abandon_job(&self, job_id: Uuid) {
        self.pending_jobs.lock().unwrap().remove(&job_id);
    }

    /// Subscribe to incoming events (PresenceSync, PrintJobRequest, ...)
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.event_tx.subscribe()
    }

    /// Close the connection
    pub async fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.transport.close().await
    }
}

/// Extract the job id from an ack/nack message
fn outcome_job_id(msg: &ChannelMessage) -> Option<Uuid> {
    match msg.event_type {
        EventType::PrintJobAck => msg
            .parse_payload::<PrintAckPayload>()
            .ok()
            .map(|p| p.job_id),
        EventType::PrintJobNack => msg
            .parse_payload::<PrintNackPayload>()
            .ok()
            .map(|p| p.job_id),
        _ => None,
    }
}
