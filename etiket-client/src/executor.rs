//! Job executor
//!
//! Runs on every terminal with an attached sink and executes delegated
//! print jobs. Retried deliveries are deduplicated by job id: a job that
//! was already executed is a no-op that re-sends the recorded ack/nack, so
//! at-least-once delivery never produces a second physical label.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use etiket_printer::{LabelCompiler, PrintError, SinkCapability};
use shared::ErrorCode;
use shared::message::{ChannelMessage, EventType, PrintAckPayload, PrintJobPayload, PrintNackPayload};
use shared::models::PrintJob;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::TerminalClient;
use crate::presence::PresenceTracker;

/// Executed jobs remembered for duplicate-delivery detection
const SEEN_JOB_CAPACITY: usize = 256;

/// Recorded outcome of an executed job
#[derive(Debug, Clone)]
enum JobOutcome {
    Ack(PrintAckPayload),
    Nack(PrintNackPayload),
}

impl JobOutcome {
    fn to_message(&self) -> ChannelMessage {
        match self {
            JobOutcome::Ack(payload) => ChannelMessage::print_ack(payload),
            JobOutcome::Nack(payload) => ChannelMessage::print_nack(payload),
        }
    }
}

#[derive(Debug, Default)]
struct SeenJobs {
    outcomes: HashMap<Uuid, JobOutcome>,
    order: VecDeque<Uuid>,
}

impl SeenJobs {
    fn get(&self, job_id: &Uuid) -> Option<JobOutcome> {
        self.outcomes.get(job_id).cloned()
    }

    fn record(&mut self, job_id: Uuid, outcome: JobOutcome) {
        if self.outcomes.insert(job_id, outcome).is_none() {
            self.order.push_back(job_id);
            while self.order.len() > SEEN_JOB_CAPACITY {
                if let Some(evicted) = self.order.pop_front() {
                    self.outcomes.remove(&evicted);
                }
            }
        }
    }
}

/// Executes delegated print jobs on the local sink
pub struct JobExecutor {
    client: TerminalClient,
    tracker: Arc<PresenceTracker>,
    capability: Arc<dyn SinkCapability>,
    compiler: LabelCompiler,
    seen: Mutex<SeenJobs>,
}

impl JobExecutor {
    pub fn new(
        client: TerminalClient,
        tracker: Arc<PresenceTracker>,
        capability: Arc<dyn SinkCapability>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            tracker,
            capability,
            compiler: LabelCompiler::default(),
            seen: Mutex::new(SeenJobs::default()),
        })
    }

    /// Run the executor until shutdown
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut rx = self.client.subscribe();
        tracing::info!(terminal_id = %self.client.terminal_id(), "job executor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Job executor shutting down");
                    break;
                }
                msg_result = rx.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            if msg.event_type != EventType::PrintJobRequest {
                                continue;
                            }
                            // Memory transports see all traffic; skip jobs
                            // addressed to other terminals
                            if msg
                                .target
                                .as_deref()
                                .is_some_and(|t| t != self.client.terminal_id())
                            {
                                continue;
                            }
                            self.handle_request(&msg).await;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(dropped_messages = n, "executor lagged behind");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            tracing::info!("Event channel closed, executor stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Handle one (possibly retried) job delivery
    pub async fn handle_request(&self, msg: &ChannelMessage) {
        let payload: PrintJobPayload = match msg.parse_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "malformed print job payload dropped");
                return;
            }
        };
        let job = payload.job;

        // Duplicate delivery: re-send the recorded outcome, print nothing.
        // Bind the lookup so the guard drops before the await below.
        let seen_outcome = self.seen.lock().unwrap().get(&job.job_id);
        if let Some(outcome) = seen_outcome {
            tracing::info!(job_id = %job.job_id, "duplicate job delivery, re-sending outcome");
            self.send_outcome(&outcome).await;
            return;
        }

        let outcome = self.execute(&job).await;
        self.seen.lock().unwrap().record(job.job_id, outcome.clone());
        self.send_outcome(&outcome).await;
    }

    /// Execute a job on the local sink
    async fn execute(&self, job: &PrintJob) -> JobOutcome {
        let Some(sink_id) = self.tracker.selected_sink() else {
            // Presence raced ahead of reality; the requester gets a
            // specific failure instead of a silent drop
            return JobOutcome::Nack(PrintNackPayload {
                job_id: job.job_id,
                code: ErrorCode::PrintFailed,
                reason: "no sink attached to executing terminal".to_string(),
            });
        };

        let document = match self.compiler.compile(&job.spec) {
            Ok(doc) => doc,
            Err(PrintError::InvalidSpec(reason)) => {
                return JobOutcome::Nack(PrintNackPayload {
                    job_id: job.job_id,
                    code: ErrorCode::InvalidSpec,
                    reason,
                });
            }
            Err(e) => {
                return JobOutcome::Nack(PrintNackPayload {
                    job_id: job.job_id,
                    code: ErrorCode::PrintFailed,
                    reason: e.to_string(),
                });
            }
        };

        tracing::info!(
            job_id = %job.job_id,
            sink_id = %sink_id,
            repeat_count = document.repeat_count(),
            "executing delegated print job"
        );

        match self.capability.send(&sink_id, &document).await {
            Ok(()) => JobOutcome::Ack(PrintAckPayload {
                job_id: job.job_id,
                executed_by: self.client.terminal_id().to_string(),
            }),
            Err(e) => JobOutcome::Nack(PrintNackPayload {
                job_id: job.job_id,
                code: ErrorCode::PrintFailed,
                reason: e.to_string(),
            }),
        }
    }

    async fn send_outcome(&self, outcome: &JobOutcome) {
        if let Err(e) = self.client.send(outcome.to_message()).await {
            tracing::warn!(error = %e, "failed to send job outcome");
        }
    }
}
