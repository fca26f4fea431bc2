//! Presence tracker
//!
//! Owns this terminal's view of its locally attached sinks. Enumeration
//! happens through the injected sink capability; every transition of the
//! attached/detached state produces exactly one announcement on the job
//! channel, and re-announcing an unchanged state is suppressed here (and
//! harmless at the directory, whose sequences are monotonic).

use std::sync::{Arc, Mutex};

use etiket_printer::{SinkCapability, SinkInfo};
use shared::message::PresencePayload;
use shared::models::Presence;

use crate::client::TerminalClient;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Default)]
struct TrackerState {
    sinks: Vec<SinkInfo>,
    selected: Option<String>,
    /// Last announced (presence, sink) pair
    announced: Option<(Presence, Option<String>)>,
}

/// Per-terminal presence tracker
pub struct PresenceTracker {
    client: TerminalClient,
    capability: Arc<dyn SinkCapability>,
    state: Mutex<TrackerState>,
}

impl PresenceTracker {
    pub fn new(client: TerminalClient, capability: Arc<dyn SinkCapability>) -> Arc<Self> {
        Arc::new(Self {
            client,
            capability,
            state: Mutex::new(TrackerState::default()),
        })
    }

    /// Re-enumerate sinks and announce the state if it changed
    ///
    /// The first discovered sink becomes the default selection; an earlier
    /// selection survives as long as the sink is still enumerated.
    pub async fn refresh(&self) -> ClientResult<Presence> {
        let sinks = self.capability.enumerate().await;

        let (presence, selected) = {
            let mut state = self.state.lock().unwrap();
            let keep_selected = state
                .selected
                .as_ref()
                .filter(|id| sinks.iter().any(|s| s.id == **id))
                .cloned();
            state.selected = keep_selected.or_else(|| sinks.first().map(|s| s.id.clone()));
            state.sinks = sinks;

            let presence = if state.selected.is_some() {
                Presence::HasPrinter
            } else {
                Presence::NoPrinter
            };
            (presence, state.selected.clone())
        };

        self.announce_if_changed(presence, selected).await?;
        Ok(presence)
    }

    /// Select a specific sink for operator override
    ///
    /// Fails with `UnknownSink` when the id is not in the current
    /// enumeration; the caller should re-enumerate and ask again.
    pub async fn select_sink(&self, sink_id: &str) -> ClientResult<()> {
        let (presence, selected) = {
            let mut state = self.state.lock().unwrap();
            if !state.sinks.iter().any(|s| s.id == sink_id) {
                return Err(ClientError::UnknownSink(sink_id.to_string()));
            }
            state.selected = Some(sink_id.to_string());
            (Presence::HasPrinter, state.selected.clone())
        };

        // Keeps the directory's sink back-reference current
        self.announce_if_changed(presence, selected).await
    }

    /// Announce the current state unconditionally
    ///
    /// Used after a channel reconnect to heal a directory entry that was
    /// force-removed on disconnect.
    pub async fn reannounce(&self) -> ClientResult<()> {
        let (presence, selected) = {
            let state = self.state.lock().unwrap();
            let presence = if state.selected.is_some() {
                Presence::HasPrinter
            } else {
                Presence::NoPrinter
            };
            (presence, state.selected.clone())
        };

        self.send_announcement(presence, selected).await
    }

    /// Whether this terminal currently has a usable sink
    pub fn has_sink(&self) -> bool {
        self.state.lock().unwrap().selected.is_some()
    }

    /// Currently selected sink id
    pub fn selected_sink(&self) -> Option<String> {
        self.state.lock().unwrap().selected.clone()
    }

    /// Full enumerated sink list (for operator override)
    pub fn sinks(&self) -> Vec<SinkInfo> {
        self.state.lock().unwrap().sinks.clone()
    }

    async fn announce_if_changed(
        &self,
        presence: Presence,
        selected: Option<String>,
    ) -> ClientResult<()> {
        {
            let state = self.state.lock().unwrap();
            if state.announced.as_ref() == Some(&(presence, selected.clone())) {
                tracing::debug!(%presence, "presence unchanged, announcement suppressed");
                return Ok(());
            }
        }
        self.send_announcement(presence, selected).await
    }

    async fn send_announcement(
        &self,
        presence: Presence,
        selected: Option<String>,
    ) -> ClientResult<()> {
        let payload = match presence {
            Presence::HasPrinter => {
                let sink_id = selected.clone().ok_or_else(|| {
                    ClientError::PrintFailed("presence claims a sink but none selected".to_string())
                })?;
                PresencePayload::attached(sink_id)
            }
            Presence::NoPrinter => PresencePayload::detached(),
        };

        self.client.announce_presence(&payload).await?;
        tracing::info!(%presence, sink_id = ?selected, "presence announced");

        self.state.lock().unwrap().announced = Some((presence, selected));
        Ok(())
    }
}
