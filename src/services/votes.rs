//! Link vote tallying. Votes tie the custom match to a real game
//! observed by the clients, a weighted quorum closes the link.

use crate::{
    config::{Config, PrivilegedVoter},
    database::entities::{Match, MatchStatus, MatchVote, Player},
    services::events::{Event, EventsError},
    state::App,
    utils::types::{LcuGameId, MatchId},
};
use sea_orm::DbErr;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Immutable vote weight table, assembled once at startup from the
/// config list with the settings row merged over it
#[derive(Default)]
pub struct VoteWeights {
    weights: HashMap<String, u32>,
}

impl VoteWeights {
    pub fn new(config: &Config, persisted: Option<Vec<PrivilegedVoter>>) -> Self {
        let mut weights = HashMap::new();
        for voter in &config.privileged_voters {
            weights.insert(voter.summoner_name.to_lowercase(), voter.weight.max(1));
        }
        if let Some(persisted) = persisted {
            for voter in persisted {
                weights.insert(voter.summoner_name.to_lowercase(), voter.weight.max(1));
            }
        }
        Self { weights }
    }

    /// Weight of a single voter, defaults to one
    pub fn weight_of(&self, summoner_name: &str) -> u32 {
        self.weights
            .get(&summoner_name.to_lowercase())
            .copied()
            .unwrap_or(1)
    }

    /// Combined weight of the provided participants
    pub fn sum_weights<'a>(&self, participants: impl Iterator<Item = &'a String>) -> u32 {
        participants.map(|name| self.weight_of(name)).sum()
    }
}

/// Weighted vote counts per candidate game, ordered for stable output
pub fn tally(votes: &[MatchVote], weights: &VoteWeights) -> BTreeMap<LcuGameId, u32> {
    let mut counts = BTreeMap::new();
    for vote in votes {
        *counts.entry(vote.lcu_game_id).or_insert(0) += weights.weight_of(&vote.summoner_name);
    }
    counts
}

/// Applies the quorum rule: the match links when the most voted game
/// reaches `min(quorum, total participant weight)`. Ties on the top
/// count resolve to the lowest game id so the decision is stable
pub fn decide(
    votes: &[MatchVote],
    weights: &VoteWeights,
    participants: &[String],
    quorum: u32,
) -> Option<LcuGameId> {
    let counts = tally(votes, weights);
    let (game_id, top) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))?;

    let threshold = quorum.min(weights.sum_weights(participants.iter()));
    if *top >= threshold {
        Some(*game_id)
    } else {
        None
    }
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Match not found")]
    MatchNotFound,
    /// Votes are only collected while the game runs
    #[error("Match is not accepting votes")]
    NotVoting,
    #[error("Not a participant of this match")]
    NotParticipant,
    #[error("Unknown player")]
    UnknownPlayer,
    #[error(transparent)]
    Store(#[from] DbErr),
    #[error(transparent)]
    Broadcast(#[from] EventsError),
}

/// Records or overwrites a participant's link vote and announces it.
/// The owning instance re-evaluates the quorum on the event. Returns
/// the updated weighted tally
pub async fn cast_vote(
    app: &App,
    summoner_name: &str,
    match_id: MatchId,
    lcu_game_id: LcuGameId,
) -> Result<BTreeMap<LcuGameId, u32>, VoteError> {
    let model = Match::by_id(&app.db, match_id)
        .await?
        .ok_or(VoteError::MatchNotFound)?;
    if model.status != MatchStatus::InProgress {
        return Err(VoteError::NotVoting);
    }

    let name = summoner_name.to_lowercase();
    if model.team_of(&name).is_none() {
        return Err(VoteError::NotParticipant);
    }

    let player = Player::by_name(&app.db, &name)
        .await?
        .ok_or(VoteError::UnknownPlayer)?;

    MatchVote::upsert(&app.db, match_id, player.id, &name, lcu_game_id).await?;

    app.bus
        .publish(Event::GameVote {
            match_id,
            summoner_name: name,
            lcu_game_id,
        })
        .await?;

    weighted_votes(app, match_id).await
}

/// The weighted per-game vote counts of a match
pub async fn weighted_votes(
    app: &App,
    match_id: MatchId,
) -> Result<BTreeMap<LcuGameId, u32>, VoteError> {
    let rows = MatchVote::all_for_match(&app.db, match_id).await?;
    Ok(tally(&rows, &app.vote_weights))
}

/// Derives the winning team (1 or 2) from the vendor game payload.
///
/// Prefers matching our roster names against the payload participants
/// and falls back onto the first team block when the payload carries
/// no recognizable identities.
pub fn derive_winner(payload: &Value, team1: &[String], team2: &[String]) -> Option<i32> {
    let winning_vendor_team = winning_vendor_team(payload)?;

    if let Some(vendor_team) = vendor_team_of_roster(payload, team1) {
        return Some(if vendor_team == winning_vendor_team { 1 } else { 2 });
    }
    if let Some(vendor_team) = vendor_team_of_roster(payload, team2) {
        return Some(if vendor_team == winning_vendor_team { 2 } else { 1 });
    }

    // No identity overlap, map vendor sides onto ours directly
    Some(if winning_vendor_team == 100 { 1 } else { 2 })
}

/// The vendor team id (100 or 200) marked as the winner
fn winning_vendor_team(payload: &Value) -> Option<i64> {
    payload["teams"].as_array()?.iter().find_map(|team| {
        let won = match &team["win"] {
            Value::String(value) => value == "Win",
            Value::Bool(value) => *value,
            _ => return None,
        };
        if won {
            team["teamId"].as_i64()
        } else {
            None
        }
    })
}

/// The vendor team id most of the roster sits on, matched through
/// `participantIdentities` by riot id
fn vendor_team_of_roster(payload: &Value, roster: &[String]) -> Option<i64> {
    let identities = payload["participantIdentities"].as_array()?;
    let participants = payload["participants"].as_array()?;

    let mut counts: HashMap<i64, u32> = HashMap::new();
    for identity in identities {
        let player = &identity["player"];
        let name = match (player["gameName"].as_str(), player["tagLine"].as_str()) {
            (Some(game_name), Some(tag_line)) => {
                format!("{game_name}#{tag_line}").to_lowercase()
            }
            _ => match player["summonerName"].as_str() {
                Some(value) => value.to_lowercase(),
                None => continue,
            },
        };

        if !roster.iter().any(|member| member == &name) {
            continue;
        }

        let participant_id = identity["participantId"].as_i64();
        let team_id = participants.iter().find_map(|participant| {
            if participant["participantId"].as_i64() == participant_id {
                participant["teamId"].as_i64()
            } else {
                None
            }
        });
        if let Some(team_id) = team_id {
            *counts.entry(team_id).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(team_id, _)| team_id)
}

#[cfg(test)]
mod test {
    use super::{decide, derive_winner, tally, VoteWeights};
    use crate::{
        config::{Config, PrivilegedVoter},
        database::entities::{match_votes, MatchVote},
    };
    use chrono::Utc;
    use serde_json::json;

    fn vote(index: i32, name: &str, lcu_game_id: i64) -> MatchVote {
        match_votes::Model {
            id: index,
            match_id: 1,
            player_id: index,
            summoner_name: name.to_string(),
            lcu_game_id,
            voted_at: Utc::now(),
        }
    }

    fn participants() -> Vec<String> {
        (0..10).map(|i| format!("p{i}#t")).collect()
    }

    fn plain_weights() -> VoteWeights {
        VoteWeights::new(&Config::default(), None)
    }

    #[test]
    fn six_votes_link_five_do_not() {
        let weights = plain_weights();
        let participants = participants();

        let five: Vec<MatchVote> = (0..5).map(|i| vote(i, &format!("p{i}#t"), 9000)).collect();
        assert_eq!(decide(&five, &weights, &participants, 6), None);

        let six: Vec<MatchVote> = (0..6).map(|i| vote(i, &format!("p{i}#t"), 9000)).collect();
        assert_eq!(decide(&six, &weights, &participants, 6), Some(9000));
    }

    #[test]
    fn privileged_single_vote_links() {
        let mut config = Config::default();
        config.privileged_voters.push(PrivilegedVoter {
            summoner_name: "K#t".to_string(),
            weight: 6,
        });
        let weights = VoteWeights::new(&config, None);

        let votes = vec![vote(0, "k#t", 9001)];
        let mut participants = participants();
        participants[0] = "k#t".to_string();

        assert_eq!(decide(&votes, &weights, &participants, 6), Some(9001));
    }

    #[test]
    fn split_vote_stays_pending_until_switch() {
        let weights = plain_weights();
        let participants = participants();

        // 3 for g1, 2 for g2, 5 for g3
        let mut votes = Vec::new();
        for i in 0..3 {
            votes.push(vote(i, &format!("p{i}#t"), 1));
        }
        for i in 3..5 {
            votes.push(vote(i, &format!("p{i}#t"), 2));
        }
        for i in 5..10 {
            votes.push(vote(i, &format!("p{i}#t"), 3));
        }
        assert_eq!(decide(&votes, &weights, &participants, 6), None);

        // One voter switches from g2 onto g3, reaching the quorum
        votes[3].lcu_game_id = 3;
        assert_eq!(decide(&votes, &weights, &participants, 6), Some(3));
    }

    #[test]
    fn unanimity_links_small_lobbies() {
        let weights = plain_weights();
        // Only three participants, sum of weights is below the quorum
        let participants: Vec<String> = (0..3).map(|i| format!("p{i}#t")).collect();
        let votes: Vec<MatchVote> = (0..3).map(|i| vote(i, &format!("p{i}#t"), 42)).collect();

        assert_eq!(decide(&votes, &weights, &participants, 6), Some(42));
    }

    #[test]
    fn tally_is_weighted() {
        let mut config = Config::default();
        config.privileged_voters.push(PrivilegedVoter {
            summoner_name: "p0#t".to_string(),
            weight: 3,
        });
        let weights = VoteWeights::new(&config, None);

        let votes = vec![vote(0, "p0#t", 7), vote(1, "p1#t", 7), vote(2, "p2#t", 8)];
        let counts = tally(&votes, &weights);
        assert_eq!(counts.get(&7), Some(&4));
        assert_eq!(counts.get(&8), Some(&1));
    }

    fn vendor_payload(winner_team_id: i64) -> serde_json::Value {
        json!({
            "gameId": 9000,
            "teams": [
                {"teamId": 100, "win": if winner_team_id == 100 { "Win" } else { "Fail" }},
                {"teamId": 200, "win": if winner_team_id == 200 { "Win" } else { "Fail" }},
            ],
            "participants": [
                {"participantId": 1, "teamId": 100},
                {"participantId": 2, "teamId": 200},
            ],
            "participantIdentities": [
                {"participantId": 1, "player": {"gameName": "A", "tagLine": "t"}},
                {"participantId": 2, "player": {"gameName": "F", "tagLine": "t"}},
            ],
        })
    }

    #[test]
    fn winner_follows_roster_identities() {
        let team1 = vec!["a#t".to_string()];
        let team2 = vec!["f#t".to_string()];

        let payload = vendor_payload(100);
        assert_eq!(derive_winner(&payload, &team1, &team2), Some(1));

        let payload = vendor_payload(200);
        assert_eq!(derive_winner(&payload, &team1, &team2), Some(2));

        // Same payloads with the rosters flipped invert the result
        let payload = vendor_payload(100);
        assert_eq!(derive_winner(&payload, &team2, &team1), Some(2));
    }

    #[test]
    fn winner_falls_back_to_vendor_sides() {
        let payload = vendor_payload(200);
        let team1 = vec!["unknown#t".to_string()];
        let team2 = vec!["other#t".to_string()];
        assert_eq!(derive_winner(&payload, &team1, &team2), Some(2));
    }
}
