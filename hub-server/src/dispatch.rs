//! Hub dispatcher
//!
//! The hub's event loop: consumes the terminal-to-hub channel and drives
//! the directory, the delegation router and ack forwarding.
//!
//! - `PresenceAnnounce` -> directory update + snapshot fan-out
//! - `PrintJobRequest` -> route against a fresh snapshot, forward to the
//!   executor, track the job in flight (or nack the requester)
//! - `PrintJobAck`/`PrintJobNack` -> forward to the recorded requester
//!
//! When an executor disconnects with jobs still in flight, every affected
//! requester gets an immediate `PrintFailed` nack instead of waiting for
//! its timeout.

use dashmap::DashMap;
use shared::ErrorCode;
use shared::message::{
    ChannelMessage, EventType, PresencePayload, PresenceSyncPayload, PrintAckPayload,
    PrintJobPayload, PrintNackPayload,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::channel::MessageBus;
use crate::directory::Directory;
use crate::error::{HubError, HubResult};
use crate::router::select_executor;

/// A job forwarded to an executor, awaiting its ack/nack
#[derive(Debug, Clone)]
struct InflightJob {
    requester: String,
    executor: String,
}

/// Shared hub state: bus, directory and in-flight job tracking
#[derive(Debug)]
pub struct HubCore {
    bus: MessageBus,
    directory: Directory,
    inflight: DashMap<Uuid, InflightJob>,
}

impl HubCore {
    pub fn new(bus: MessageBus) -> Arc<Self> {
        Arc::new(Self {
            bus,
            directory: Directory::new(),
            inflight: DashMap::new(),
        })
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Apply a presence announcement and fan out the new snapshot
    pub async fn handle_presence(&self, msg: &ChannelMessage) -> HubResult<()> {
        let Some(terminal_id) = msg.source.as_deref() else {
            return Err(HubError::invalid("presence announcement without source"));
        };
        let payload: PresencePayload = msg
            .parse_payload()
            .map_err(|e| HubError::invalid(format!("Invalid presence payload: {}", e)))?;

        let changed = self.directory.update(
            terminal_id,
            payload.presence,
            payload.sink_id.clone(),
            msg.sequence,
        );

        tracing::info!(
            terminal_id,
            presence = %payload.presence,
            sink_id = ?payload.sink_id,
            changed,
            "presence announcement applied"
        );

        if changed {
            self.broadcast_snapshot().await?;
        }
        Ok(())
    }

    /// Route a print job request and forward it to the chosen executor
    pub async fn handle_job_request(&self, msg: &ChannelMessage) -> HubResult<()> {
        let payload: PrintJobPayload = msg
            .parse_payload()
            .map_err(|e| HubError::invalid(format!("Invalid print job payload: {}", e)))?;
        let job = payload.job;

        // The connection-injected source is authoritative for replies
        let requester = msg
            .source
            .clone()
            .unwrap_or_else(|| job.requesting_terminal.clone());
        if requester != job.requesting_terminal {
            tracing::warn!(
                source = %requester,
                claimed = %job.requesting_terminal,
                "job requester does not match connection identity"
            );
        }

        // Fresh snapshot per job; in-flight jobs are never rerouted
        let executor = match select_executor(&requester, &self.directory.snapshot()) {
            Ok(executor) => executor,
            Err(HubError::NoPrinterAvailable) => {
                tracing::warn!(job_id = %job.job_id, requester = %requester, "no printer available");
                self.nack_requester(
                    &requester,
                    job.job_id,
                    ErrorCode::NoPrinterAvailable,
                    "no terminal reports an attached printer",
                )
                .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            job_id = %job.job_id,
            requester = %requester,
            executor = %executor,
            "routing print job"
        );

        self.inflight.insert(
            job.job_id,
            InflightJob {
                requester: requester.clone(),
                executor: executor.clone(),
            },
        );

        let forwarded = msg.clone().with_target(&executor);
        if let Err(e) = self.bus.send_to_terminal(&executor, forwarded).await {
            // Executor vanished between snapshot and send
            tracing::warn!(job_id = %job.job_id, executor = %executor, error = %e, "job forward failed");
            self.inflight.remove(&job.job_id);
            self.nack_requester(
                &requester,
                job.job_id,
                ErrorCode::PrintFailed,
                "executing terminal became unreachable",
            )
            .await;
        }
        Ok(())
    }

    /// Forward an executor's ack/nack to the requester that issued the job
    pub async fn handle_job_outcome(&self, msg: &ChannelMessage) -> HubResult<()> {
        let job_id = match msg.event_type {
            EventType::PrintJobAck => {
                msg.parse_payload::<PrintAckPayload>()
                    .map_err(|e| HubError::invalid(format!("Invalid ack payload: {}", e)))?
                    .job_id
            }
            EventType::PrintJobNack => {
                msg.parse_payload::<PrintNackPayload>()
                    .map_err(|e| HubError::invalid(format!("Invalid nack payload: {}", e)))?
                    .job_id
            }
            other => {
                return Err(HubError::invalid(format!(
                    "not a job outcome message: {}",
                    other
                )));
            }
        };

        let Some((_, inflight)) = self.inflight.remove(&job_id) else {
            // Duplicate outcome for an already-settled job
            tracing::debug!(job_id = %job_id, "outcome for unknown job ignored");
            return Ok(());
        };

        tracing::debug!(
            job_id = %job_id,
            requester = %inflight.requester,
            outcome = %msg.event_type,
            "forwarding job outcome"
        );

        let forwarded = msg.clone().with_target(&inflight.requester);
        if let Err(e) = self
            .bus
            .send_to_terminal(&inflight.requester, forwarded)
            .await
        {
            tracing::debug!(job_id = %job_id, error = %e, "requester gone, outcome dropped");
        }
        Ok(())
    }

    /// Tear down everything the hub knows about a disconnected terminal
    ///
    /// Runs before the connection registry entry is dropped, so routing can
    /// never pick the disconnected terminal afterwards.
    pub async fn handle_disconnect(&self, terminal_id: &str) {
        let removed = self.directory.remove(terminal_id);
        tracing::info!(terminal_id, directory_entry = removed, "terminal disconnected");

        // Jobs this terminal was executing fail fast instead of timing out
        let orphaned: Vec<(Uuid, InflightJob)> = self
            .inflight
            .iter()
            .filter(|entry| entry.value().executor == terminal_id)
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (job_id, inflight) in orphaned {
            self.inflight.remove(&job_id);
            self.nack_requester(
                &inflight.requester,
                job_id,
                ErrorCode::PrintFailed,
                "executing terminal disconnected",
            )
            .await;
        }

        // Jobs the terminal requested have nobody left to answer
        self.inflight
            .retain(|_, inflight| inflight.requester != terminal_id);

        if removed {
            let _ = self.broadcast_snapshot().await;
        }
    }

    /// Fan the current directory snapshot out to every terminal
    pub async fn broadcast_snapshot(&self) -> HubResult<()> {
        let payload = PresenceSyncPayload {
            entries: self.directory.snapshot(),
        };
        self.bus
            .publish(ChannelMessage::presence_sync(&payload))
            .await
    }

    async fn nack_requester(&self, requester: &str, job_id: Uuid, code: ErrorCode, reason: &str) {
        let payload = PrintNackPayload {
            job_id,
            code,
            reason: reason.to_string(),
        };
        let msg = ChannelMessage::print_nack(&payload).with_target(requester);
        if let Err(e) = self.bus.send_to_terminal(requester, msg).await {
            tracing::debug!(requester, job_id = %job_id, error = %e, "nack undeliverable");
        }
    }
}

/// Hub event loop
pub struct HubDispatcher {
    core: Arc<HubCore>,
}

impl HubDispatcher {
    pub fn new(core: Arc<HubCore>) -> Self {
        Self { core }
    }

    /// Run the dispatcher until shutdown
    pub async fn run(self, shutdown: CancellationToken) {
        let mut rx = self.core.bus().subscribe_to_terminals();
        tracing::info!("Hub dispatcher started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Hub dispatcher shutting down");
                    break;
                }
                msg_result = rx.recv() => {
                    match msg_result {
                        Ok(msg) => self.process(&msg).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(dropped_messages = n, "dispatcher lagged behind");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            tracing::info!("Terminal channel closed, dispatcher stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn process(&self, msg: &ChannelMessage) {
        let result = match msg.event_type {
            EventType::PresenceAnnounce => self.core.handle_presence(msg).await,
            EventType::PrintJobRequest => self.core.handle_job_request(msg).await,
            EventType::PrintJobAck | EventType::PrintJobNack => {
                self.core.handle_job_outcome(msg).await
            }
            // Handshakes are consumed by the connection handler
            EventType::Handshake | EventType::Response | EventType::PresenceSync => Ok(()),
        };

        if let Err(e) = result {
            tracing::error!(
                event = %msg.event_type,
                source = ?msg.source,
                error = %e,
                "failed to process message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{LabelSpec, Presence, PrintJob};
    use rust_decimal_macros::dec;

    fn announce(terminal: &str, presence: Presence, seq: u64) -> ChannelMessage {
        let payload = match presence {
            Presence::HasPrinter => PresencePayload::attached("sink-1"),
            Presence::NoPrinter => PresencePayload::detached(),
        };
        let mut msg = ChannelMessage::presence_announce(&payload).with_sequence(seq);
        msg.source = Some(terminal.to_string());
        msg
    }

    #[tokio::test]
    async fn test_presence_announce_updates_directory_and_fans_out() {
        let core = HubCore::new(MessageBus::new());
        let mut rx = core.bus().subscribe();

        core.handle_presence(&announce("till-1", Presence::HasPrinter, 1))
            .await
            .unwrap();

        assert_eq!(
            core.directory().snapshot().get("till-1"),
            Some(&Presence::HasPrinter)
        );

        let sync = rx.recv().await.unwrap();
        assert_eq!(sync.event_type, EventType::PresenceSync);
        let payload: PresenceSyncPayload = sync.parse_payload().unwrap();
        assert_eq!(payload.entries.get("till-1"), Some(&Presence::HasPrinter));
    }

    #[tokio::test]
    async fn test_duplicate_announce_does_not_fan_out_twice() {
        let core = HubCore::new(MessageBus::new());
        let mut rx = core.bus().subscribe();

        core.handle_presence(&announce("till-1", Presence::HasPrinter, 1))
            .await
            .unwrap();
        core.handle_presence(&announce("till-1", Presence::HasPrinter, 2))
            .await
            .unwrap();

        // Exactly one snapshot broadcast
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_job_request_without_printers_nacks() {
        let core = HubCore::new(MessageBus::new());

        let job = PrintJob::new("till-1", LabelSpec::adhoc("Колан", dec!(1.00), 1));
        let mut msg = ChannelMessage::print_job(&PrintJobPayload { job });
        msg.source = Some("till-1".to_string());

        // till-1 is not connected, so the nack is undeliverable, but the
        // request itself must not error out or leave state behind
        core.handle_job_request(&msg).await.unwrap();
        assert!(core.inflight.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_cleans_directory_before_next_route() {
        let core = HubCore::new(MessageBus::new());
        core.handle_presence(&announce("till-2", Presence::HasPrinter, 1))
            .await
            .unwrap();

        core.handle_disconnect("till-2").await;

        let snap = core.directory().snapshot();
        assert!(snap.is_empty());
        assert!(matches!(
            select_executor("till-1", &snap),
            Err(HubError::NoPrinterAvailable)
        ));
    }
}
