// etiket-client/tests/terminal_flow.rs
// Terminal-side behavior against in-process channel endpoints

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use etiket_printer::{Document, PrintError, PrintResult, SinkCapability, SinkInfo, SinkKind};
use etiket_client::{JobExecutor, PresenceTracker, TerminalClient};
use rust_decimal_macros::dec;
use shared::message::{ChannelMessage, EventType, PrintJobPayload};
use shared::models::{LabelSpec, Presence, PrintJob};
use tokio::sync::broadcast;

/// Sink capability with a settable sink list and recorded sends
#[derive(Default)]
struct FakeSinks {
    sinks: Mutex<Vec<SinkInfo>>,
    sends: Mutex<Vec<(String, u32)>>,
    fail_sends: Mutex<bool>,
}

impl FakeSinks {
    fn set_sinks(&self, ids: &[&str]) {
        *self.sinks.lock().unwrap() = ids
            .iter()
            .map(|id| SinkInfo {
                id: id.to_string(),
                name: format!("Sink {}", id),
                kind: SinkKind::Network,
            })
            .collect();
    }

    fn sends(&self) -> Vec<(String, u32)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl SinkCapability for FakeSinks {
    async fn enumerate(&self) -> Vec<SinkInfo> {
        self.sinks.lock().unwrap().clone()
    }

    async fn send(&self, sink_id: &str, document: &Document) -> PrintResult<()> {
        if *self.fail_sends.lock().unwrap() {
            return Err(PrintError::Offline(sink_id.to_string()));
        }
        self.sends
            .lock()
            .unwrap()
            .push((sink_id.to_string(), document.repeat_count()));
        Ok(())
    }
}

struct Harness {
    client: TerminalClient,
    hub_tx: broadcast::Sender<ChannelMessage>,
    from_terminal: broadcast::Receiver<ChannelMessage>,
}

async fn connect(terminal_id: &str) -> Harness {
    let (hub_tx, _) = broadcast::channel(64);
    let (terminal_tx, from_terminal) = broadcast::channel(64);
    let client = TerminalClient::connect_memory(&hub_tx, &terminal_tx, terminal_id)
        .await
        .unwrap();
    Harness {
        client,
        hub_tx,
        from_terminal,
    }
}

fn shirt_spec(quantity: i32) -> LabelSpec {
    LabelSpec::adhoc("Тениска", dec!(10.00), quantity)
}

async fn next_of_kind(
    rx: &mut broadcast::Receiver<ChannelMessage>,
    kind: EventType,
) -> ChannelMessage {
    loop {
        let msg = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for message")
            .unwrap();
        if msg.event_type == kind {
            return msg;
        }
    }
}

#[tokio::test]
async fn test_presence_announced_once_per_transition() {
    let mut h = connect("till-1").await;
    let sinks = Arc::new(FakeSinks::default());
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());

    // No sinks: one NoPrinter announcement
    assert_eq!(tracker.refresh().await.unwrap(), Presence::NoPrinter);
    let msg = next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;
    assert_eq!(msg.event_type, EventType::PresenceAnnounce);

    // Same state again: suppressed
    tracker.refresh().await.unwrap();
    tracker.refresh().await.unwrap();

    // A sink appears: exactly one HasPrinter announcement, first sink
    // becomes the default selection
    sinks.set_sinks(&["sink-a", "sink-b"]);
    assert_eq!(tracker.refresh().await.unwrap(), Presence::HasPrinter);
    assert_eq!(tracker.selected_sink().as_deref(), Some("sink-a"));

    let announce = next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;
    let payload: shared::message::PresencePayload = announce.parse_payload().unwrap();
    assert_eq!(payload.presence, Presence::HasPrinter);
    assert_eq!(payload.sink_id.as_deref(), Some("sink-a"));

    // Nothing else was announced in between
    tracker.refresh().await.unwrap();
    assert!(h.from_terminal.try_recv().is_err());
}

#[tokio::test]
async fn test_sequences_increase_per_announcement() {
    let mut h = connect("till-1").await;
    let sinks = Arc::new(FakeSinks::default());
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());

    tracker.refresh().await.unwrap();
    sinks.set_sinks(&["sink-a"]);
    tracker.refresh().await.unwrap();

    let first = next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;
    let second = next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;
    assert!(second.sequence > first.sequence);
}

#[tokio::test]
async fn test_select_sink_unknown_id_fails() {
    let h = connect("till-1").await;
    let sinks = Arc::new(FakeSinks::default());
    sinks.set_sinks(&["sink-a"]);
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());
    tracker.refresh().await.unwrap();

    let err = tracker.select_sink("sink-gone").await.unwrap_err();
    assert!(matches!(err, etiket_client::ClientError::UnknownSink(_)));

    // Known sink works and becomes the selection
    tracker.select_sink("sink-a").await.unwrap();
    assert_eq!(tracker.selected_sink().as_deref(), Some("sink-a"));
}

#[tokio::test]
async fn test_reannounce_resends_current_state() {
    let mut h = connect("till-1").await;
    let sinks = Arc::new(FakeSinks::default());
    sinks.set_sinks(&["sink-a"]);
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());

    tracker.refresh().await.unwrap();
    next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;

    // Channel healing after reconnect: same state goes out again
    tracker.reannounce().await.unwrap();
    let healed = next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;
    let payload: shared::message::PresencePayload = healed.parse_payload().unwrap();
    assert_eq!(payload.presence, Presence::HasPrinter);
}

#[tokio::test]
async fn test_executor_dedupes_retried_jobs() {
    let mut h = connect("till-2").await;
    let sinks = Arc::new(FakeSinks::default());
    sinks.set_sinks(&["sink-a"]);
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());
    tracker.refresh().await.unwrap();
    next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;

    let executor = JobExecutor::new(h.client.clone(), tracker, sinks.clone());

    let job = PrintJob::new("till-1", shirt_spec(3));
    let request =
        ChannelMessage::print_job(&PrintJobPayload { job: job.clone() }).with_target("till-2");

    // First delivery executes, retry re-acks without printing again
    executor.handle_request(&request).await;
    executor.handle_request(&request).await;

    assert_eq!(sinks.sends(), vec![("sink-a".to_string(), 3)]);

    let first = next_of_kind(&mut h.from_terminal, EventType::PrintJobAck).await;
    let second = next_of_kind(&mut h.from_terminal, EventType::PrintJobAck).await;
    let ack1: shared::message::PrintAckPayload = first.parse_payload().unwrap();
    let ack2: shared::message::PrintAckPayload = second.parse_payload().unwrap();
    assert_eq!(ack1.job_id, job.job_id);
    assert_eq!(ack2.job_id, job.job_id);
    assert_eq!(ack1.executed_by, "till-2");
}

#[tokio::test]
async fn test_executor_nacks_on_sink_failure() {
    let mut h = connect("till-2").await;
    let sinks = Arc::new(FakeSinks::default());
    sinks.set_sinks(&["sink-a"]);
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());
    tracker.refresh().await.unwrap();
    next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;

    *sinks.fail_sends.lock().unwrap() = true;
    let executor = JobExecutor::new(h.client.clone(), tracker, sinks.clone());

    let job = PrintJob::new("till-1", shirt_spec(1));
    let request =
        ChannelMessage::print_job(&PrintJobPayload { job: job.clone() }).with_target("till-2");
    executor.handle_request(&request).await;

    let nack = next_of_kind(&mut h.from_terminal, EventType::PrintJobNack).await;
    let payload: shared::message::PrintNackPayload = nack.parse_payload().unwrap();
    assert_eq!(payload.job_id, job.job_id);
    assert_eq!(payload.code, shared::ErrorCode::PrintFailed);
}

#[tokio::test]
async fn test_executor_ignores_jobs_for_other_terminals() {
    let mut h = connect("till-2").await;
    let sinks = Arc::new(FakeSinks::default());
    sinks.set_sinks(&["sink-a"]);
    let tracker = PresenceTracker::new(h.client.clone(), sinks.clone());
    tracker.refresh().await.unwrap();
    next_of_kind(&mut h.from_terminal, EventType::PresenceAnnounce).await;

    let executor = JobExecutor::new(h.client.clone(), tracker, sinks.clone());
    let shutdown = tokio_util::sync::CancellationToken::new();
    let run_handle = tokio::spawn(executor.clone().run(shutdown.clone()));

    // Unicast for a different terminal flows through the shared memory
    // channel but must not execute here
    let job = PrintJob::new("till-1", shirt_spec(1));
    let request = ChannelMessage::print_job(&PrintJobPayload { job }).with_target("till-9");
    h.hub_tx.send(request).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(sinks.sends().is_empty());

    shutdown.cancel();
    let _ = run_handle.await;
}
