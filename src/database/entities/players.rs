use crate::{database::DbResult, utils::types::PlayerId};
use chrono::Utc;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{NotSet, Set},
    IntoActiveModel,
};
use serde::Serialize;
use std::future::Future;

/// Persistent player identity, created the first time a summoner
/// identifies and never destroyed
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "players")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the player
    #[sea_orm(primary_key)]
    pub id: PlayerId,
    /// Canonical summoner name (`gameName#tagLine`, lowercased)
    #[sea_orm(unique)]
    pub summoner_name: String,
    /// Display portion of the riot id
    pub game_name: String,
    /// Tag portion of the riot id
    pub tag_line: String,
    /// Vendor account identifier when known
    pub puuid: Option<String>,
    pub region: Option<String>,
    /// Last known profile icon
    pub profile_icon_id: Option<i32>,
    /// Ladder points within the custom queue
    pub custom_lp: i32,
    /// Hidden rating used for team balancing
    pub custom_mmr: i32,
    pub wins: i32,
    pub losses: i32,
    pub games_played: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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

/// Rating given to players on their first appearance
const INITIAL_RATING: i32 = 1000;

/// Identity details delivered by the client on identify
pub struct PlayerIdentity {
    pub game_name: String,
    pub tag_line: String,
    pub puuid: Option<String>,
    pub region: Option<String>,
    pub profile_icon_id: Option<i32>,
}

/// Produces the canonical lookup key for a riot id. Names are
/// compared case-insensitively everywhere
pub fn canonical_name(game_name: &str, tag_line: &str) -> String {
    format!("{}#{}", game_name, tag_line).to_lowercase()
}

impl Model {
    /// Finds a player using the canonical summoner name
    pub fn by_name<'a>(
        db: &'a DatabaseConnection,
        summoner_name: &str,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + 'a {
        Entity::find()
            .filter(Column::SummonerName.eq(summoner_name.to_lowercase()))
            .one(db)
    }

    pub fn by_id(
        db: &DatabaseConnection,
        id: PlayerId,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send + '_ {
        Entity::find_by_id(id).one(db)
    }

    /// Creates the player row on first appearance or refreshes the
    /// identity details of an existing row
    pub async fn upsert_identity(
        db: &DatabaseConnection,
        identity: PlayerIdentity,
    ) -> DbResult<Self> {
        let summoner_name = canonical_name(&identity.game_name, &identity.tag_line);
        let now = Utc::now();

        if let Some(existing) = Self::by_name(db, &summoner_name).await? {
            let mut model = existing.into_active_model();
            model.game_name = Set(identity.game_name);
            model.tag_line = Set(identity.tag_line);
            if identity.puuid.is_some() {
                model.puuid = Set(identity.puuid);
            }
            if identity.region.is_some() {
                model.region = Set(identity.region);
            }
            if identity.profile_icon_id.is_some() {
                model.profile_icon_id = Set(identity.profile_icon_id);
            }
            model.updated_at = Set(now);
            return model.update(db).await;
        }

        ActiveModel {
            id: NotSet,
            summoner_name: Set(summoner_name),
            game_name: Set(identity.game_name),
            tag_line: Set(identity.tag_line),
            puuid: Set(identity.puuid),
            region: Set(identity.region),
            profile_icon_id: Set(identity.profile_icon_id),
            custom_lp: Set(INITIAL_RATING),
            custom_mmr: Set(INITIAL_RATING),
            wins: Set(0),
            losses: Set(0),
            games_played: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
    }

    /// Applies the rating outcome of a completed match to this
    /// player. Ladder points never drop below zero
    pub async fn apply_result(self, db: &DatabaseConnection, won: bool, delta: i32) -> DbResult<Self> {
        let mut model = self.clone().into_active_model();

        if won {
            model.custom_lp = Set(self.custom_lp.saturating_add(delta));
            model.custom_mmr = Set(self.custom_mmr.saturating_add(delta));
            model.wins = Set(self.wins + 1);
        } else {
            model.custom_lp = Set((self.custom_lp - delta).max(0));
            model.custom_mmr = Set((self.custom_mmr - delta).max(0));
            model.losses = Set(self.losses + 1);
        }
        model.games_played = Set(self.games_played + 1);
        model.updated_at = Set(Utc::now());

        model.update(db).await
    }
}

#[cfg(test)]
mod test {
    use super::canonical_name;

    #[test]
    fn canonical_names_are_lowercased() {
        assert_eq!(canonical_name("Faker", "KR1"), "faker#kr1");
        assert_eq!(canonical_name("hide on bush", "KR1"), "hide on bush#kr1");
    }
}
