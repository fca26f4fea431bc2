//! Presence directory
//!
//! Authoritative terminal -> presence mapping, mutated only by presence
//! announcements and connection teardown. Last-write-wins per terminal,
//! keyed by the per-terminal message sequence (monotonic per connection,
//! deliberately not wall-clock: clocks across terminals are not comparable).
//!
//! The map is sharded per key, so updates for different terminals never
//! lose one another and `snapshot()` never blocks writers.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::models::Presence;
use std::collections::BTreeMap;

/// One directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub presence: Presence,
    /// Opaque back-reference to the terminal's selected sink
    pub sink_id: Option<String>,
    /// Sequence of the announcement that produced this entry
    pub last_sequence: u64,
}

/// Shared presence directory
#[derive(Debug, Default)]
pub struct Directory {
    entries: DashMap<String, PresenceEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a presence announcement
    ///
    /// Returns `true` when the visible state changed (new entry, or
    /// presence/sink differs). Announcements with a sequence at or below
    /// the last applied one are stale and ignored; a newer announcement of
    /// an unchanged state advances the sequence but reports no change, so
    /// idempotent re-announces never double-count.
    pub fn update(
        &self,
        terminal_id: &str,
        presence: Presence,
        sink_id: Option<String>,
        sequence: u64,
    ) -> bool {
        match self.entries.entry(terminal_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(PresenceEntry {
                    presence,
                    sink_id,
                    last_sequence: sequence,
                });
                true
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if sequence <= entry.last_sequence {
                    tracing::debug!(
                        terminal_id,
                        sequence,
                        last_sequence = entry.last_sequence,
                        "stale presence announcement ignored"
                    );
                    return false;
                }
                let changed = entry.presence != presence || entry.sink_id != sink_id;
                entry.presence = presence;
                entry.sink_id = sink_id;
                entry.last_sequence = sequence;
                changed
            }
        }
    }

    /// Remove a terminal's entry (on disconnect)
    ///
    /// Returns `true` when an entry existed. Must run before any further
    /// routing decision so a disconnected terminal can never be chosen as a
    /// delegation target.
    pub fn remove(&self, terminal_id: &str) -> bool {
        self.entries.remove(terminal_id).is_some()
    }

    /// Current terminal -> presence mapping
    ///
    /// Non-blocking; reflects every update applied before the call. The
    /// ordered map gives routing a deterministic iteration order.
    pub fn snapshot(&self) -> BTreeMap<String, Presence> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().presence))
            .collect()
    }

    /// Look up one entry
    pub fn get(&self, terminal_id: &str) -> Option<PresenceEntry> {
        self.entries.get(terminal_id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_then_remove_never_reports_presence() {
        let dir = Directory::new();
        assert!(dir.update("t1", Presence::HasPrinter, Some("s1".into()), 1));
        assert!(dir.remove("t1"));

        assert_eq!(dir.snapshot().get("t1"), None);
        assert!(dir.get("t1").is_none());
    }

    #[test]
    fn test_last_write_wins_per_terminal() {
        let dir = Directory::new();
        dir.update("t1", Presence::HasPrinter, Some("s1".into()), 5);

        // Older announcement arrives late - ignored
        assert!(!dir.update("t1", Presence::NoPrinter, None, 3));
        assert_eq!(dir.get("t1").unwrap().presence, Presence::HasPrinter);

        // Newer announcement wins
        assert!(dir.update("t1", Presence::NoPrinter, None, 6));
        assert_eq!(dir.get("t1").unwrap().presence, Presence::NoPrinter);
    }

    #[test]
    fn test_idempotent_reannounce_does_not_report_change() {
        let dir = Directory::new();
        assert!(dir.update("t1", Presence::HasPrinter, Some("s1".into()), 1));
        // Same state, newer sequence: applied but no visible change
        assert!(!dir.update("t1", Presence::HasPrinter, Some("s1".into()), 2));
        assert_eq!(dir.get("t1").unwrap().last_sequence, 2);
    }

    #[test]
    fn test_concurrent_updates_for_distinct_terminals() {
        use std::sync::Arc;

        let dir = Arc::new(Directory::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let dir = dir.clone();
            handles.push(std::thread::spawn(move || {
                let id = format!("t{:02}", i);
                for seq in 1..=50u64 {
                    let presence = if seq % 2 == 0 {
                        Presence::HasPrinter
                    } else {
                        Presence::NoPrinter
                    };
                    dir.update(&id, presence, None, seq);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Every terminal ends at its own most recent update (seq 50, even)
        let snapshot = dir.snapshot();
        assert_eq!(snapshot.len(), 16);
        for presence in snapshot.values() {
            assert_eq!(*presence, Presence::HasPrinter);
        }
    }
}
