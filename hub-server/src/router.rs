//! Delegation router
//!
//! Chooses the terminal that executes a print job. The policy, in order:
//!
//! 1. the requester itself when it reports an attached printer (local
//!    execution, no network hop)
//! 2. otherwise the lowest terminal id reporting a printer, so several
//!    eligible terminals never split one job
//! 3. otherwise `NoPrinterAvailable`, surfaced to the operator
//!
//! Every job is routed against a fresh snapshot; a job already forwarded
//! is never rerouted when presence changes mid-flight.

use shared::models::Presence;
use std::collections::BTreeMap;

use crate::error::{HubError, HubResult};

/// Select the executing terminal for a print request
pub fn select_executor(
    requesting_terminal: &str,
    snapshot: &BTreeMap<String, Presence>,
) -> HubResult<String> {
    if snapshot
        .get(requesting_terminal)
        .is_some_and(|p| p.has_printer())
    {
        return Ok(requesting_terminal.to_string());
    }

    snapshot
        .iter()
        .find(|(_, presence)| presence.has_printer())
        .map(|(id, _)| id.clone())
        .ok_or(HubError::NoPrinterAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, Presence)]) -> BTreeMap<String, Presence> {
        entries
            .iter()
            .map(|(id, p)| (id.to_string(), *p))
            .collect()
    }

    #[test]
    fn test_requester_preferred_when_it_has_a_printer() {
        let snap = snapshot(&[
            ("till-1", Presence::HasPrinter),
            ("till-2", Presence::HasPrinter),
        ]);
        assert_eq!(select_executor("till-2", &snap).unwrap(), "till-2");
    }

    #[test]
    fn test_lowest_id_wins_for_remote_execution() {
        let snap = snapshot(&[
            ("till-1", Presence::NoPrinter),
            ("till-5", Presence::HasPrinter),
            ("till-2", Presence::HasPrinter),
        ]);
        assert_eq!(select_executor("till-1", &snap).unwrap(), "till-2");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let snap = snapshot(&[
            ("till-3", Presence::HasPrinter),
            ("till-4", Presence::HasPrinter),
        ]);
        let first = select_executor("till-1", &snap).unwrap();
        for _ in 0..10 {
            assert_eq!(select_executor("till-1", &snap).unwrap(), first);
        }
    }

    #[test]
    fn test_no_printer_available() {
        let snap = snapshot(&[
            ("till-1", Presence::NoPrinter),
            ("till-2", Presence::NoPrinter),
        ]);
        assert!(matches!(
            select_executor("till-1", &snap),
            Err(HubError::NoPrinterAvailable)
        ));

        assert!(matches!(
            select_executor("till-1", &BTreeMap::new()),
            Err(HubError::NoPrinterAvailable)
        ));
    }
}
