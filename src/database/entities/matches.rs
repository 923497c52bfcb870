use crate::{
    database::DbResult,
    utils::types::{ChampionId, LcuGameId, MatchId, PlayerId},
};
use chrono::Utc;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{NotSet, Set},
    ConnectionTrait, FromJsonQueryResult,
};
use serde::{Deserialize, Serialize};
use std::future::Future;

use super::queue_players::{AcceptanceStatus, Lane};

/// The central match aggregate. Rows are created when the builder
/// forms a match and only ever move forward through the status DAG
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "custom_matches")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: MatchId,
    /// Team one roster ordered top/jungle/mid/bot/support
    pub team1_players: PlayerList,
    /// Team two roster ordered top/jungle/mid/bot/support
    pub team2_players: PlayerList,
    pub average_mmr_team1: i32,
    pub average_mmr_team2: i32,
    pub status: MatchStatus,
    /// Frozen copy of the consumed queue rows, carries acceptance
    /// state and the original join times for survivor re-queueing
    pub queue_snapshot: QueueSnapshot,
    /// The draft document, present from creation onwards
    pub pick_ban_data: Option<PickBanData>,
    /// Raw vendor payload of the linked real game, stored verbatim
    #[serde(skip)]
    pub lcu_match_data: Option<Json>,
    /// Vendor game id this match was linked to
    pub riot_game_id: Option<LcuGameId>,
    pub winner_team: Option<i32>,
    /// Instance currently driving this match, null once terminal
    pub owner_backend_id: Option<String>,
    pub owner_heartbeat: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub completed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::match_votes::Entity")]
    Votes,
}

impl Related<super::match_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Votes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle states of a match. Transitions form a monotone path,
/// a status is never revisited once left
#[derive(
    Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "found")]
    Found,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }

    /// The four states a live match can sit in
    pub const NON_TERMINAL: [MatchStatus; 5] = [
        MatchStatus::Pending,
        MatchStatus::Found,
        MatchStatus::Accepted,
        MatchStatus::Draft,
        MatchStatus::InProgress,
    ];
}

/// Ordered list of summoner names, index is the lane slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct PlayerList(pub Vec<String>);

impl PlayerList {
    pub fn contains(&self, summoner_name: &str) -> bool {
        self.0.iter().any(|name| name == summoner_name)
    }
}

/// Frozen queue rows consumed by this match
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub players: Vec<SnapshotPlayer>,
}

impl QueueSnapshot {
    pub fn get(&self, summoner_name: &str) -> Option<&SnapshotPlayer> {
        self.players
            .iter()
            .find(|player| player.summoner_name == summoner_name)
    }

    pub fn get_mut(&mut self, summoner_name: &str) -> Option<&mut SnapshotPlayer> {
        self.players
            .iter_mut()
            .find(|player| player.summoner_name == summoner_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPlayer {
    pub player_id: PlayerId,
    pub summoner_name: String,
    pub region: Option<String>,
    pub custom_lp: i32,
    pub primary_lane: Lane,
    pub secondary_lane: Lane,
    pub join_time: DateTimeUtc,
    pub acceptance_status: AcceptanceStatus,
}

/// Which side of the draft a team sits on. Blue is team one
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Blue,
    Red,
}

impl TeamSide {
    pub fn team_number(&self) -> i32 {
        match self {
            TeamSide::Blue => 1,
            TeamSide::Red => 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DraftPhase {
    Ban1,
    Pick1,
    Ban2,
    Pick2,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DraftActionKind {
    Ban,
    Pick,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DraftActionStatus {
    Pending,
    Completed,
    Skipped,
}

/// One step of the twenty action pick/ban sequence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAction {
    pub index: u32,
    #[serde(rename = "type")]
    pub kind: DraftActionKind,
    pub phase: DraftPhase,
    pub team: TeamSide,
    pub lane: Lane,
    pub by_player: String,
    pub champion_id: Option<ChampionId>,
    pub status: DraftActionStatus,
    pub completed_at: Option<DateTimeUtc>,
}

/// The draft document persisted on the match row. All timers are
/// re-derived from `current_action_started_at` after a takeover
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct PickBanData {
    pub actions: Vec<DraftAction>,
    pub current_index: u32,
    pub current_action_started_at: DateTimeUtc,
    /// Summoners confirmed against the current revision
    pub confirmations: Vec<String>,
    /// Bumped on every edit, clearing confirmations
    pub revision: u32,
}

impl Model {
    /// Creates a found match within `db`, which is expected to be the
    /// transaction also deleting the consumed queue rows
    pub fn create_found<C: ConnectionTrait>(
        db: &C,
        team1_players: PlayerList,
        team2_players: PlayerList,
        average_mmr_team1: i32,
        average_mmr_team2: i32,
        queue_snapshot: QueueSnapshot,
        pick_ban_data: PickBanData,
    ) -> impl Future<Output = DbResult<Self>> + Send + '_ {
        ActiveModel {
            id: NotSet,
            team1_players: Set(team1_players),
            team2_players: Set(team2_players),
            average_mmr_team1: Set(average_mmr_team1),
            average_mmr_team2: Set(average_mmr_team2),
            status: Set(MatchStatus::Found),
            queue_snapshot: Set(queue_snapshot),
            pick_ban_data: Set(Some(pick_ban_data)),
            lcu_match_data: Set(None),
            riot_game_id: Set(None),
            winner_team: Set(None),
            owner_backend_id: Set(None),
            owner_heartbeat: Set(None),
            created_at: Set(Utc::now()),
            completed_at: Set(None),
        }
        .insert(db)
    }

    pub fn by_id(
        db: &DatabaseConnection,
        id: MatchId,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + '_ {
        Entity::find_by_id(id).one(db)
    }

    pub fn all_non_terminal(
        db: &DatabaseConnection,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send + '_ {
        Entity::find()
            .filter(Column::Status.is_in(MatchStatus::NON_TERMINAL))
            .all(db)
    }

    /// The non-terminal match the summoner is a member of, if any.
    /// Membership lives inside the roster json so the filtering
    /// happens over the small non-terminal set
    pub async fn active_for_summoner(
        db: &DatabaseConnection,
        summoner_name: &str,
    ) -> DbResult<Option<Self>> {
        let name = summoner_name.to_lowercase();
        let active = Self::all_non_terminal(db).await?;
        Ok(active
            .into_iter()
            .find(|m| m.team1_players.contains(&name) || m.team2_players.contains(&name)))
    }

    /// Returns every summoner in the match, team one first
    pub fn participants(&self) -> impl Iterator<Item = &String> {
        self.team1_players.0.iter().chain(self.team2_players.0.iter())
    }

    /// Which team (1 or 2) the summoner plays on
    pub fn team_of(&self, summoner_name: &str) -> Option<i32> {
        if self.team1_players.contains(summoner_name) {
            Some(1)
        } else if self.team2_players.contains(summoner_name) {
            Some(2)
        } else {
            None
        }
    }

    /// Row-atomic ownership claim. Succeeds when the row is unowned,
    /// already ours, or the current owner's heartbeat is stale
    pub async fn claim_ownership(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
        stale_cutoff: chrono::Duration,
    ) -> DbResult<bool> {
        let now = Utc::now();
        let stale_before = now - stale_cutoff;

        let result = Entity::update_many()
            .set(ActiveModel {
                owner_backend_id: Set(Some(instance_id.to_string())),
                owner_heartbeat: Set(Some(now)),
                ..Default::default()
            })
            .filter(Column::Id.eq(match_id))
            .filter(Column::Status.is_in(MatchStatus::NON_TERMINAL))
            .filter(
                Column::OwnerBackendId
                    .is_null()
                    .or(Column::OwnerBackendId.eq(instance_id))
                    .or(Column::OwnerHeartbeat.lt(stale_before)),
            )
            .exec(db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Refreshes the lease heartbeat, false when the lease was lost
    pub async fn refresh_ownership(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
    ) -> DbResult<bool> {
        let result = Entity::update_many()
            .set(ActiveModel {
                owner_heartbeat: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(Column::Id.eq(match_id))
            .filter(Column::OwnerBackendId.eq(instance_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Single-writer status advance, false when the lease was lost or
    /// the match already left `from`
    pub async fn advance_status(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
        from: MatchStatus,
        to: MatchStatus,
    ) -> DbResult<bool> {
        let mut model = ActiveModel {
            status: Set(to),
            ..Default::default()
        };
        if to.is_terminal() {
            model.owner_backend_id = Set(None);
            model.owner_heartbeat = Set(None);
            model.completed_at = Set(Some(Utc::now()));
        }

        let result = Entity::update_many()
            .set(model)
            .filter(Column::Id.eq(match_id))
            .filter(Column::OwnerBackendId.eq(instance_id))
            .filter(Column::Status.eq(from))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Persists the draft document under the ownership guard
    pub async fn store_pick_ban(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
        pick_ban_data: PickBanData,
    ) -> DbResult<bool> {
        let result = Entity::update_many()
            .set(ActiveModel {
                pick_ban_data: Set(Some(pick_ban_data)),
                ..Default::default()
            })
            .filter(Column::Id.eq(match_id))
            .filter(Column::OwnerBackendId.eq(instance_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Persists the acceptance snapshot under the ownership guard
    pub async fn store_queue_snapshot(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
        queue_snapshot: QueueSnapshot,
    ) -> DbResult<bool> {
        let result = Entity::update_many()
            .set(ActiveModel {
                queue_snapshot: Set(queue_snapshot),
                ..Default::default()
            })
            .filter(Column::Id.eq(match_id))
            .filter(Column::OwnerBackendId.eq(instance_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Terminal completion: links the real game, stores the winner
    /// and releases the lease in one conditional update
    pub async fn complete_linked(
        db: &DatabaseConnection,
        match_id: MatchId,
        instance_id: &str,
        riot_game_id: LcuGameId,
        lcu_match_data: Json,
        winner_team: i32,
    ) -> DbResult<bool> {
        let result = Entity::update_many()
            .set(ActiveModel {
                status: Set(MatchStatus::Completed),
                riot_game_id: Set(Some(riot_game_id)),
                lcu_match_data: Set(Some(lcu_match_data)),
                winner_team: Set(Some(winner_team)),
                owner_backend_id: Set(None),
                owner_heartbeat: Set(None),
                completed_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(Column::Id.eq(match_id))
            .filter(Column::OwnerBackendId.eq(instance_id))
            .filter(Column::Status.eq(MatchStatus::InProgress))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod test {
    use super::{MatchStatus, PlayerList};

    #[test]
    fn terminal_statuses() {
        assert!(MatchStatus::Completed.is_terminal());
        assert!(MatchStatus::Cancelled.is_terminal());
        for status in MatchStatus::NON_TERMINAL {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn roster_membership() {
        let roster = PlayerList(vec!["a#na".to_string(), "b#na".to_string()]);
        assert!(roster.contains("a#na"));
        assert!(!roster.contains("c#na"));
    }
}
