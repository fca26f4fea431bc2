//! Print service
//!
//! The operator-facing entry point. Compiles the label locally (so a
//! malformed spec never crosses the channel), prints on the local sink
//! when one is attached, and otherwise delegates over the job channel and
//! awaits the ack within a bounded timeout.
//!
//! Dispatch is never retried automatically on a different target: an
//! ambiguous retry could print the same label twice. The operator re-
//! invokes explicitly after a failure.

use std::sync::Arc;
use std::time::Duration;

use etiket_printer::{LabelCompiler, SinkCapability};
use rust_decimal::Decimal;
use shared::message::{EventType, PrintAckPayload, PrintNackPayload};
use shared::models::{LabelSpec, PrintJob, Product, RestockBatch};

use crate::client::TerminalClient;
use crate::error::{ClientError, ClientResult};
use crate::presence::PresenceTracker;

/// Default bound for waiting on a delegated job's ack
const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// How a print request was fulfilled
#[derive(Debug, Clone, PartialEq)]
pub enum PrintOutcome {
    /// Executed on this terminal's own sink
    Local { sink_id: String },
    /// Delegated over the job channel and acked
    Delegated { executed_by: String },
}

/// Operator-facing print entry point
pub struct PrintService {
    client: TerminalClient,
    tracker: Arc<PresenceTracker>,
    capability: Arc<dyn SinkCapability>,
    compiler: LabelCompiler,
    ack_timeout: Duration,
}

impl PrintService {
    pub fn new(
        client: TerminalClient,
        tracker: Arc<PresenceTracker>,
        capability: Arc<dyn SinkCapability>,
    ) -> Self {
        Self {
            client,
            tracker,
            capability,
            compiler: LabelCompiler::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Override the ack timeout (tests use short bounds)
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Override the label geometry
    pub fn with_compiler(mut self, compiler: LabelCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Print labels for a catalog product
    pub async fn print_product(&self, product: &Product, quantity: i32) -> ClientResult<PrintOutcome> {
        self.print_spec(LabelSpec::from_product(product, quantity)).await
    }

    /// Print an ad hoc (non-catalog) label
    pub async fn print_adhoc(
        &self,
        name: &str,
        unit_price: Decimal,
        quantity: i32,
    ) -> ClientResult<PrintOutcome> {
        self.print_spec(LabelSpec::adhoc(name, unit_price, quantity)).await
    }

    /// Print one label run from a prepared spec
    pub async fn print_spec(&self, spec: LabelSpec) -> ClientResult<PrintOutcome> {
        // Compile first: InvalidSpec is resolved locally and never retried
        let document = self.compiler.compile(&spec)?;

        // Local execution when a sink is attached - no network hop
        if let Some(sink_id) = self.tracker.selected_sink() {
            tracing::info!(sink_id = %sink_id, repeat_count = document.repeat_count(), "printing locally");
            self.capability.send(&sink_id, &document).await?;
            return Ok(PrintOutcome::Local { sink_id });
        }

        // Delegate to whichever terminal the hub selects
        let job = PrintJob::new(self.client.terminal_id(), spec);
        let job_id = job.job_id;
        tracing::info!(job_id = %job_id, "delegating print job");

        let outcome_rx = self.client.submit_job(&job).await?;

        let outcome = match tokio::time::timeout(self.ack_timeout, outcome_rx).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(_)) => {
                // Dispatch loop dropped the waiter: transport is gone
                return Err(ClientError::ChannelDisconnected);
            }
            Err(_) => {
                self.client.abandon_job(job_id);
                return Err(ClientError::PrintFailed(format!(
                    "no ack within {:?}",
                    self.ack_timeout
                )));
            }
        };

        match outcome.event_type {
            EventType::PrintJobAck => {
                let ack: PrintAckPayload = outcome.parse_payload().map_err(|e| {
                    ClientError::PrintFailed(format!("malformed ack payload: {}", e))
                })?;
                tracing::info!(job_id = %job_id, executed_by = %ack.executed_by, "print job acked");
                Ok(PrintOutcome::Delegated {
                    executed_by: ack.executed_by,
                })
            }
            EventType::PrintJobNack => {
                let nack: PrintNackPayload = outcome.parse_payload().map_err(|e| {
                    ClientError::PrintFailed(format!("malformed nack payload: {}", e))
                })?;
                tracing::warn!(job_id = %job_id, code = %nack.code, reason = %nack.reason, "print job nacked");
                Err(ClientError::from_nack(nack.code, &nack.reason))
            }
            other => Err(ClientError::PrintFailed(format!(
                "unexpected outcome message: {}",
                other
            ))),
        }
    }

    /// Print labels for a whole restock delivery, one job per entry
    ///
    /// Entries fail independently; the caller gets one result per entry in
    /// order.
    pub async fn print_batch(&self, batch: &RestockBatch) -> Vec<ClientResult<PrintOutcome>> {
        let mut results = Vec::with_capacity(batch.entries.len());
        for entry in &batch.entries {
            results.push(self.print_product(&entry.product, entry.quantity as i32).await);
        }
        results
    }
}
