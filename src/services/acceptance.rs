//! Acceptance window bookkeeping. The runner owns the 30 second
//! deadline, this module owns the pending/accepted/declined sets and
//! the all-or-nothing outcome rule.

use crate::database::entities::{AcceptanceStatus, QueueSnapshot};
use std::collections::BTreeSet;

/// Mutable view of a match's acceptance window, rebuilt from the
/// frozen queue snapshot so a takeover resumes mid-window
#[derive(Debug, Default)]
pub struct AcceptanceState {
    pending: BTreeSet<String>,
    accepted: BTreeSet<String>,
    declined: BTreeSet<String>,
}

/// Terminal result of an acceptance window
#[derive(Debug, PartialEq, Eq)]
pub enum AcceptanceOutcome {
    AllAccepted,
    /// Decliners and, on timeout, non-responders. Accepting players
    /// return to the queue with their original join time
    Failed { at_fault: Vec<String> },
}

impl AcceptanceState {
    /// Rebuilds the window state from the persisted snapshot
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        let mut state = Self::default();
        for player in &snapshot.players {
            let name = player.summoner_name.clone();
            match player.acceptance_status {
                AcceptanceStatus::Pending => state.pending.insert(name),
                AcceptanceStatus::Accepted => state.accepted.insert(name),
                AcceptanceStatus::Declined => state.declined.insert(name),
            };
        }
        state
    }

    /// Records a response. Returns false when the summoner is not a
    /// pending participant (unknown or already responded)
    pub fn apply(&mut self, summoner_name: &str, accepted: bool) -> bool {
        if !self.pending.remove(summoner_name) {
            return false;
        }
        if accepted {
            self.accepted.insert(summoner_name.to_string());
        } else {
            self.declined.insert(summoner_name.to_string());
        }
        true
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn total(&self) -> usize {
        self.pending.len() + self.accepted.len() + self.declined.len()
    }

    pub fn accepted_players(&self) -> impl Iterator<Item = &String> {
        self.accepted.iter()
    }

    /// The window outcome, `None` while still collecting. Passing
    /// `timed_out` forces a decision at the deadline
    pub fn outcome(&self, timed_out: bool) -> Option<AcceptanceOutcome> {
        if !self.declined.is_empty() {
            let at_fault = self.declined.iter().cloned().collect();
            return Some(AcceptanceOutcome::Failed { at_fault });
        }

        if self.pending.is_empty() {
            return Some(AcceptanceOutcome::AllAccepted);
        }

        if timed_out {
            let at_fault = self
                .declined
                .iter()
                .chain(self.pending.iter())
                .cloned()
                .collect();
            return Some(AcceptanceOutcome::Failed { at_fault });
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::{AcceptanceOutcome, AcceptanceState};
    use crate::database::entities::{AcceptanceStatus, Lane, QueueSnapshot, SnapshotPlayer};
    use chrono::{TimeZone, Utc};

    fn snapshot(names: &[&str]) -> QueueSnapshot {
        QueueSnapshot {
            players: names
                .iter()
                .enumerate()
                .map(|(index, name)| SnapshotPlayer {
                    player_id: index as i32 + 1,
                    summoner_name: name.to_string(),
                    region: None,
                    custom_lp: 1000,
                    primary_lane: Lane::Fill,
                    secondary_lane: Lane::Fill,
                    join_time: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
                    acceptance_status: AcceptanceStatus::Pending,
                })
                .collect(),
        }
    }

    const NAMES: [&str; 10] = [
        "a#t", "b#t", "c#t", "d#t", "e#t", "f#t", "g#t", "h#t", "i#t", "j#t",
    ];

    #[test]
    fn all_accept_completes() {
        let mut state = AcceptanceState::from_snapshot(&snapshot(&NAMES));

        for (index, name) in NAMES.iter().enumerate() {
            assert_eq!(state.outcome(false), None, "decided early at {index}");
            assert!(state.apply(name, true));
        }

        assert_eq!(state.outcome(false), Some(AcceptanceOutcome::AllAccepted));
        assert_eq!(state.accepted_count(), 10);
    }

    #[test]
    fn single_decline_fails_immediately() {
        let mut state = AcceptanceState::from_snapshot(&snapshot(&NAMES));
        state.apply("a#t", true);
        state.apply("f#t", false);

        match state.outcome(false) {
            Some(AcceptanceOutcome::Failed { at_fault }) => {
                assert_eq!(at_fault, vec!["f#t".to_string()]);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn timeout_blames_non_responders() {
        let mut state = AcceptanceState::from_snapshot(&snapshot(&NAMES));
        for name in NAMES.iter().filter(|name| **name != "f#t") {
            state.apply(name, true);
        }

        // Still collecting until the deadline fires
        assert_eq!(state.outcome(false), None);

        match state.outcome(true) {
            Some(AcceptanceOutcome::Failed { at_fault }) => {
                assert_eq!(at_fault, vec!["f#t".to_string()]);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_and_unknown_responses_are_ignored() {
        let mut state = AcceptanceState::from_snapshot(&snapshot(&NAMES));
        assert!(state.apply("a#t", true));
        assert!(!state.apply("a#t", true));
        assert!(!state.apply("z#t", true));
        assert_eq!(state.accepted_count(), 1);
    }

    #[test]
    fn rebuilds_partial_state_from_snapshot() {
        let mut snapshot = snapshot(&NAMES);
        snapshot.get_mut("a#t").unwrap().acceptance_status = AcceptanceStatus::Accepted;
        snapshot.get_mut("b#t").unwrap().acceptance_status = AcceptanceStatus::Accepted;

        let state = AcceptanceState::from_snapshot(&snapshot);
        assert_eq!(state.accepted_count(), 2);
        assert_eq!(state.total(), 10);
        assert_eq!(state.outcome(false), None);
    }
}
