//! Draft document operations. The runner task owns the timers, this
//! module owns every mutation of the persisted `PickBanData` so the
//! rules live in one place and can be tested without a clock.

use crate::{
    database::entities::{
        DraftAction, DraftActionKind, DraftActionStatus, DraftPhase, Lane, PickBanData, TeamSide,
    },
    utils::types::ChampionId,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Number of actions in a full draft
pub const ACTION_COUNT: u32 = 20;

/// The fixed tournament draft order: six first bans, six first
/// picks, four second bans, four second picks
const SCHEDULE: [(DraftPhase, DraftActionKind, TeamSide, Lane); ACTION_COUNT as usize] = [
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Blue, Lane::Top),
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Red, Lane::Top),
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Blue, Lane::Jungle),
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Red, Lane::Jungle),
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Blue, Lane::Mid),
    (DraftPhase::Ban1, DraftActionKind::Ban, TeamSide::Red, Lane::Mid),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Blue, Lane::Top),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Red, Lane::Top),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Red, Lane::Jungle),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Blue, Lane::Jungle),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Blue, Lane::Mid),
    (DraftPhase::Pick1, DraftActionKind::Pick, TeamSide::Red, Lane::Mid),
    (DraftPhase::Ban2, DraftActionKind::Ban, TeamSide::Red, Lane::Bot),
    (DraftPhase::Ban2, DraftActionKind::Ban, TeamSide::Blue, Lane::Bot),
    (DraftPhase::Ban2, DraftActionKind::Ban, TeamSide::Red, Lane::Support),
    (DraftPhase::Ban2, DraftActionKind::Ban, TeamSide::Blue, Lane::Support),
    (DraftPhase::Pick2, DraftActionKind::Pick, TeamSide::Blue, Lane::Bot),
    (DraftPhase::Pick2, DraftActionKind::Pick, TeamSide::Red, Lane::Bot),
    (DraftPhase::Pick2, DraftActionKind::Pick, TeamSide::Blue, Lane::Support),
    (DraftPhase::Pick2, DraftActionKind::Pick, TeamSide::Red, Lane::Support),
];

/// Errors produced while validating a draft frame. Reported back to
/// the sending player only, the document is untouched on failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    /// The action index is not the current one or the sender does
    /// not own the action
    #[error("Not your turn")]
    NotYourTurn,
    /// The champion is already banned or picked in this draft
    #[error("Champion already used")]
    ChampionAlreadyUsed,
    /// The referenced action cannot be edited
    #[error("Action cannot be edited")]
    InvalidEdit,
    /// Confirmation frames are only valid once all actions resolved
    #[error("Draft is not awaiting confirmation")]
    NotConfirming,
    /// The sender is not part of this draft
    #[error("Not a participant")]
    NotParticipant,
}

/// Result of a timed out action
#[derive(Debug, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// A ban lapsed and was skipped
    Skipped { index: u32 },
    /// A pick lapsed and was auto filled with the lowest unused
    /// champion from the pool
    AutoPicked { index: u32, champion_id: ChampionId },
}

/// Builds the draft skeleton from the two rosters. Rosters are in
/// slot order, blue side is team one
pub fn create_pick_ban(
    team1: &[String],
    team2: &[String],
    now: DateTime<Utc>,
) -> PickBanData {
    let actions = SCHEDULE
        .iter()
        .enumerate()
        .map(|(index, (phase, kind, team, lane))| {
            let roster = match team {
                TeamSide::Blue => team1,
                TeamSide::Red => team2,
            };
            let slot = lane.slot_index().unwrap_or(0);
            DraftAction {
                index: index as u32,
                kind: *kind,
                phase: *phase,
                team: *team,
                lane: *lane,
                by_player: roster[slot].clone(),
                champion_id: None,
                status: DraftActionStatus::Pending,
                completed_at: None,
            }
        })
        .collect();

    PickBanData {
        actions,
        current_index: 0,
        current_action_started_at: now,
        confirmations: Vec::new(),
        revision: 0,
    }
}

/// Whether all twenty actions have been resolved
pub fn is_complete(data: &PickBanData) -> bool {
    data.current_index >= ACTION_COUNT
}

/// Every champion currently locked into the draft, excluding the
/// action at `except` when provided
pub fn used_champions(data: &PickBanData, except: Option<u32>) -> HashSet<ChampionId> {
    data.actions
        .iter()
        .filter(|action| Some(action.index) != except)
        .filter(|action| action.status == DraftActionStatus::Completed)
        .filter_map(|action| action.champion_id)
        .collect()
}

/// Applies a pick or ban from a player. Accepted only when the index
/// is the current action, the sender owns it and the champion is
/// still free
pub fn apply_action(
    data: &mut PickBanData,
    summoner_name: &str,
    index: u32,
    champion_id: ChampionId,
    now: DateTime<Utc>,
) -> Result<DraftAction, DraftError> {
    if is_complete(data) || index != data.current_index {
        return Err(DraftError::NotYourTurn);
    }

    let owner = &data.actions[index as usize].by_player;
    if owner != summoner_name {
        return Err(DraftError::NotYourTurn);
    }

    if used_champions(data, None).contains(&champion_id) {
        return Err(DraftError::ChampionAlreadyUsed);
    }

    let action = &mut data.actions[index as usize];
    action.champion_id = Some(champion_id);
    action.status = DraftActionStatus::Completed;
    action.completed_at = Some(now);
    let action = action.clone();

    data.current_index += 1;
    data.current_action_started_at = now;

    Ok(action)
}

/// Rewrites the champion on a previously completed action owned by
/// the sender. During the confirmation stage a real change clears
/// every collected confirmation
pub fn apply_edit(
    data: &mut PickBanData,
    summoner_name: &str,
    index: u32,
    champion_id: ChampionId,
) -> Result<DraftAction, DraftError> {
    if index >= data.current_index {
        return Err(DraftError::InvalidEdit);
    }

    let action = &data.actions[index as usize];
    if action.by_player != summoner_name {
        return Err(DraftError::InvalidEdit);
    }
    if action.status != DraftActionStatus::Completed {
        return Err(DraftError::InvalidEdit);
    }

    // Re-selecting the current champion is a no-op, in particular it
    // must not clear confirmations
    if action.champion_id == Some(champion_id) {
        return Ok(action.clone());
    }

    if used_champions(data, Some(index)).contains(&champion_id) {
        return Err(DraftError::ChampionAlreadyUsed);
    }

    let action = &mut data.actions[index as usize];
    action.champion_id = Some(champion_id);
    let action = action.clone();

    data.revision += 1;
    data.confirmations.clear();

    Ok(action)
}

/// Resolves the current action after its timer lapsed: bans are
/// skipped, picks are auto filled with the lowest champion from the
/// pool that is not already used
pub fn apply_timeout(
    data: &mut PickBanData,
    champion_pool: &[ChampionId],
    now: DateTime<Utc>,
) -> Option<TimeoutOutcome> {
    if is_complete(data) {
        return None;
    }

    let index = data.current_index;
    let used = used_champions(data, None);
    let action = &mut data.actions[index as usize];

    let outcome = match action.kind {
        DraftActionKind::Ban => {
            action.status = DraftActionStatus::Skipped;
            action.completed_at = Some(now);
            TimeoutOutcome::Skipped { index }
        }
        DraftActionKind::Pick => {
            let mut pool: Vec<ChampionId> = champion_pool.to_vec();
            pool.sort_unstable();
            match pool.into_iter().find(|id| !used.contains(id)) {
                Some(champion_id) => {
                    action.champion_id = Some(champion_id);
                    action.status = DraftActionStatus::Completed;
                    action.completed_at = Some(now);
                    TimeoutOutcome::AutoPicked { index, champion_id }
                }
                // Pool exhausted, nothing left to assign
                None => {
                    action.status = DraftActionStatus::Skipped;
                    action.completed_at = Some(now);
                    TimeoutOutcome::Skipped { index }
                }
            }
        }
    };

    data.current_index += 1;
    data.current_action_started_at = now;

    Some(outcome)
}

/// Records a confirmation from a participant. Returns the number of
/// distinct confirmations collected for the current revision
pub fn apply_confirm(
    data: &mut PickBanData,
    summoner_name: &str,
    participants: &[String],
) -> Result<usize, DraftError> {
    if !is_complete(data) {
        return Err(DraftError::NotConfirming);
    }
    if !participants.iter().any(|name| name == summoner_name) {
        return Err(DraftError::NotParticipant);
    }

    if !data.confirmations.iter().any(|name| name == summoner_name) {
        data.confirmations.push(summoner_name.to_string());
    }

    Ok(data.confirmations.len())
}

/// Deadline of the current action given the per-action timeout
pub fn action_deadline(data: &PickBanData, timeout: chrono::Duration) -> DateTime<Utc> {
    data.current_action_started_at + timeout
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::entities::{DraftActionKind, DraftActionStatus, TeamSide};
    use chrono::{TimeZone, Utc};

    fn teams() -> (Vec<String>, Vec<String>) {
        let team1 = ["a", "b", "c", "d", "e"]
            .map(|name| format!("{name}#test"))
            .to_vec();
        let team2 = ["f", "g", "h", "i", "j"]
            .map(|name| format!("{name}#test"))
            .to_vec();
        (team1, team2)
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
    }

    fn participants() -> Vec<String> {
        let (team1, team2) = teams();
        team1.into_iter().chain(team2).collect()
    }

    #[test]
    fn schedule_shape() {
        let (team1, team2) = teams();
        let data = create_pick_ban(&team1, &team2, now());

        assert_eq!(data.actions.len(), 20);
        assert_eq!(data.current_index, 0);

        let bans = data
            .actions
            .iter()
            .filter(|a| a.kind == DraftActionKind::Ban)
            .count();
        assert_eq!(bans, 10);

        // First ban belongs to blue top, first pick to blue top
        assert_eq!(data.actions[0].team, TeamSide::Blue);
        assert_eq!(data.actions[0].by_player, "a#test");
        assert_eq!(data.actions[6].kind, DraftActionKind::Pick);
        assert_eq!(data.actions[6].by_player, "a#test");
        // Pick phase one snakes: blue, red, red, blue
        assert_eq!(data.actions[7].by_player, "f#test");
        assert_eq!(data.actions[8].by_player, "g#test");
        assert_eq!(data.actions[9].by_player, "b#test");
    }

    #[test]
    fn rejects_out_of_turn_actions() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());

        // Red top cannot act on blue top's ban
        let err = apply_action(&mut data, "f#test", 0, 17, now()).unwrap_err();
        assert_eq!(err, DraftError::NotYourTurn);

        // Correct owner acting on a later index is also rejected
        let err = apply_action(&mut data, "a#test", 6, 17, now()).unwrap_err();
        assert_eq!(err, DraftError::NotYourTurn);
    }

    #[test]
    fn champion_collision_is_rejected_without_advancing() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());

        // Run through the six bans
        for index in 0..6 {
            let owner = data.actions[index as usize].by_player.clone();
            apply_action(&mut data, &owner, index, 100 + index, now()).unwrap();
        }

        // Blue top picks champion 17, red top tries to repeat it
        apply_action(&mut data, "a#test", 6, 17, now()).unwrap();
        let err = apply_action(&mut data, "f#test", 7, 17, now()).unwrap_err();
        assert_eq!(err, DraftError::ChampionAlreadyUsed);
        assert_eq!(data.current_index, 7);

        // A valid pick then advances to 8
        apply_action(&mut data, "f#test", 7, 18, now()).unwrap();
        assert_eq!(data.current_index, 8);
    }

    #[test]
    fn banned_champion_cannot_be_picked() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());

        apply_action(&mut data, "a#test", 0, 55, now()).unwrap();
        for index in 1..6 {
            let owner = data.actions[index as usize].by_player.clone();
            apply_action(&mut data, &owner, index, 100 + index, now()).unwrap();
        }

        let err = apply_action(&mut data, "a#test", 6, 55, now()).unwrap_err();
        assert_eq!(err, DraftError::ChampionAlreadyUsed);
    }

    #[test]
    fn timed_out_ban_is_skipped_and_does_not_lock_a_champion() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());

        let outcome = apply_timeout(&mut data, &[1, 2, 3], now()).unwrap();
        assert_eq!(outcome, TimeoutOutcome::Skipped { index: 0 });
        assert_eq!(data.current_index, 1);
        assert_eq!(data.actions[0].status, DraftActionStatus::Skipped);
        assert!(used_champions(&data, None).is_empty());
    }

    #[test]
    fn timed_out_pick_takes_lowest_unused_champion() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());

        for index in 0..6 {
            let owner = data.actions[index as usize].by_player.clone();
            apply_action(&mut data, &owner, index, index + 1, now()).unwrap();
        }

        // Champions 1..=6 are banned, the auto pick must take 7
        let pool: Vec<u32> = (1..=170).collect();
        let outcome = apply_timeout(&mut data, &pool, now()).unwrap();
        assert_eq!(
            outcome,
            TimeoutOutcome::AutoPicked {
                index: 6,
                champion_id: 7
            }
        );
    }

    fn complete_draft() -> PickBanData {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());
        for index in 0..20 {
            let owner = data.actions[index as usize].by_player.clone();
            apply_action(&mut data, &owner, index, index + 1, now()).unwrap();
        }
        data
    }

    #[test]
    fn confirmation_quorum_is_all_ten() {
        let mut data = complete_draft();
        let participants = participants();

        for (count, name) in participants.iter().enumerate() {
            let confirmed = apply_confirm(&mut data, name, &participants).unwrap();
            assert_eq!(confirmed, count + 1);
        }

        // Confirming twice does not double count
        let confirmed = apply_confirm(&mut data, &participants[0], &participants).unwrap();
        assert_eq!(confirmed, participants.len());
    }

    #[test]
    fn confirm_rejected_before_draft_resolves() {
        let (team1, team2) = teams();
        let mut data = create_pick_ban(&team1, &team2, now());
        let err = apply_confirm(&mut data, "a#test", &participants()).unwrap_err();
        assert_eq!(err, DraftError::NotConfirming);
    }

    #[test]
    fn edit_during_confirmation_resets_confirmations() {
        let mut data = complete_draft();
        let participants = participants();

        apply_confirm(&mut data, "a#test", &participants).unwrap();
        apply_confirm(&mut data, "b#test", &participants).unwrap();

        // Blue top rewrites their pick (action 6, champion 7 -> 150)
        apply_edit(&mut data, "a#test", 6, 150).unwrap();
        assert!(data.confirmations.is_empty());
        assert_eq!(data.revision, 1);
    }

    #[test]
    fn edit_to_same_champion_is_a_noop() {
        let mut data = complete_draft();
        let participants = participants();
        apply_confirm(&mut data, "a#test", &participants).unwrap();

        let champion = data.actions[6].champion_id.unwrap();
        apply_edit(&mut data, "a#test", 6, champion).unwrap();

        assert_eq!(data.confirmations.len(), 1);
        assert_eq!(data.revision, 0);
    }

    #[test]
    fn edit_collision_is_rejected() {
        let mut data = complete_draft();
        // Champion 8 belongs to action 7, blue top cannot take it
        let err = apply_edit(&mut data, "a#test", 6, 8).unwrap_err();
        assert_eq!(err, DraftError::ChampionAlreadyUsed);
    }

    #[test]
    fn edit_requires_ownership_and_completion() {
        let mut data = complete_draft();
        // Action 6 is owned by blue top, not red top
        let err = apply_edit(&mut data, "f#test", 6, 150).unwrap_err();
        assert_eq!(err, DraftError::InvalidEdit);
    }

    #[test]
    fn action_then_edit_matches_single_action() {
        let (team1, team2) = teams();

        let mut edited = create_pick_ban(&team1, &team2, now());
        let mut direct = create_pick_ban(&team1, &team2, now());

        apply_action(&mut edited, "a#test", 0, 40, now()).unwrap();
        apply_edit(&mut edited, "a#test", 0, 41).unwrap();

        apply_action(&mut direct, "a#test", 0, 41, now()).unwrap();

        assert_eq!(
            edited.actions[0].champion_id,
            direct.actions[0].champion_id
        );
        assert_eq!(edited.current_index, direct.current_index);
    }
}
