use crate::{database::DbResult, utils::types::PlayerId};
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{NotSet, Set},
    ConnectionTrait, DeleteResult, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};

/// Transient queue membership row, at most one per summoner
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "queue_players")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i32,
    pub player_id: PlayerId,
    /// Canonical summoner name, unique across the queue
    #[sea_orm(unique)]
    pub summoner_name: String,
    pub region: Option<String>,
    /// Rating snapshot taken when the player joined
    pub custom_lp: i32,
    pub primary_lane: Lane,
    pub secondary_lane: Lane,
    pub join_time: DateTimeUtc,
    pub active: bool,
    pub acceptance_status: AcceptanceStatus,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lane preference values. `adc` is a legacy spelling of `bot`
/// accepted on input and never produced on output
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Hash,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    #[sea_orm(string_value = "top")]
    Top,
    #[sea_orm(string_value = "jungle")]
    Jungle,
    #[sea_orm(string_value = "mid")]
    Mid,
    #[sea_orm(string_value = "bot")]
    #[serde(alias = "adc")]
    Bot,
    #[sea_orm(string_value = "support")]
    Support,
    #[sea_orm(string_value = "fill")]
    Fill,
}

impl Lane {
    /// The five assignable lane slots in team order
    pub const SLOTS: [Lane; 5] = [Lane::Top, Lane::Jungle, Lane::Mid, Lane::Bot, Lane::Support];

    /// Whether a player with this preference may sit in `slot`
    /// without it counting as an off-role placement
    pub fn matches(&self, slot: Lane) -> bool {
        *self == Lane::Fill || *self == slot
    }

    /// Position of the lane within the team arrays
    pub fn slot_index(&self) -> Option<usize> {
        Self::SLOTS.iter().position(|slot| slot == self)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Lane::Top => "top",
            Lane::Jungle => "jungle",
            Lane::Mid => "mid",
            Lane::Bot => "bot",
            Lane::Support => "support",
            Lane::Fill => "fill",
        };
        f.write_str(value)
    }
}

/// Per-player response state within an acceptance window
#[derive(
    Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum AcceptanceStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "declined")]
    Declined,
}

impl Model {
    /// Inserts a new active queue row for the player
    pub fn create<'a>(
        db: &'a DatabaseConnection,
        player: &'a super::Player,
        primary_lane: Lane,
        secondary_lane: Lane,
        join_time: DateTimeUtc,
    ) -> impl Future<Output = DbResult<Self>> + Send + 'a {
        ActiveModel {
            id: NotSet,
            player_id: Set(player.id),
            summoner_name: Set(player.summoner_name.clone()),
            region: Set(player.region.clone()),
            custom_lp: Set(player.custom_lp),
            primary_lane: Set(primary_lane),
            secondary_lane: Set(secondary_lane),
            join_time: Set(join_time),
            active: Set(true),
            acceptance_status: Set(AcceptanceStatus::Pending),
        }
        .insert(db)
    }

    pub fn by_name<'a>(
        db: &'a DatabaseConnection,
        summoner_name: &str,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + 'a {
        Entity::find()
            .filter(Column::SummonerName.eq(summoner_name.to_lowercase()))
            .one(db)
    }

    /// All active rows ordered oldest join first, name as tiebreak
    /// so identical inputs always enumerate identically
    pub fn all_active(
        db: &DatabaseConnection,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send + '_ {
        Entity::find()
            .filter(Column::Active.eq(true))
            .order_by_asc(Column::JoinTime)
            .order_by_asc(Column::SummonerName)
            .all(db)
    }

    pub fn count_active(
        db: &DatabaseConnection,
    ) -> impl Future<Output = DbResult<u64>> + Send + '_ {
        Entity::find().filter(Column::Active.eq(true)).count(db)
    }

    /// Removes the queue row for the provided summoner if present
    pub async fn remove_by_name(db: &DatabaseConnection, summoner_name: &str) -> DbResult<bool> {
        let result = Entity::delete_many()
            .filter(Column::SummonerName.eq(summoner_name.to_lowercase()))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Removes the selected rows within the transaction that
    /// creates the match they were consumed by
    pub fn delete_ids<C: ConnectionTrait>(
        db: &C,
        ids: Vec<i32>,
    ) -> impl Future<Output = DbResult<DeleteResult>> + Send + '_ {
        Entity::delete_many()
            .filter(Column::Id.is_in(ids))
            .exec(db)
    }

    /// Restores a queue row from a frozen match snapshot keeping the
    /// original join time so the player keeps their queue position
    pub fn restore<'a>(
        db: &'a DatabaseConnection,
        snapshot: &'a super::SnapshotPlayer,
    ) -> impl Future<Output = DbResult<Self>> + Send + 'a {
        ActiveModel {
            id: NotSet,
            player_id: Set(snapshot.player_id),
            summoner_name: Set(snapshot.summoner_name.clone()),
            region: Set(snapshot.region.clone()),
            custom_lp: Set(snapshot.custom_lp),
            primary_lane: Set(snapshot.primary_lane),
            secondary_lane: Set(snapshot.secondary_lane),
            join_time: Set(snapshot.join_time),
            active: Set(true),
            acceptance_status: Set(AcceptanceStatus::Pending),
        }
        .insert(db)
    }
}

#[cfg(test)]
mod test {
    use super::Lane;

    #[test]
    fn fill_matches_every_slot() {
        for slot in Lane::SLOTS {
            assert!(Lane::Fill.matches(slot));
        }
    }

    #[test]
    fn adc_is_parsed_as_bot() {
        let lane: Lane = serde_json::from_str("\"adc\"").expect("adc should parse");
        assert_eq!(lane, Lane::Bot);
        assert_eq!(serde_json::to_string(&lane).unwrap(), "\"bot\"");
    }
}
