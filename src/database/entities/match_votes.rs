use crate::{
    database::DbResult,
    utils::types::{LcuGameId, MatchId, PlayerId},
};
use chrono::Utc;
use sea_orm::{
    entity::prelude::*,
    ActiveValue::{NotSet, Set},
    DeleteResult, IntoActiveModel,
};
use serde::Serialize;
use std::future::Future;

/// A player's opinion on which real game the custom match maps to.
/// At most one row per `(match, player)`, re-voting overwrites
#[derive(Serialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "match_votes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip)]
    pub id: i32,
    pub match_id: MatchId,
    pub player_id: PlayerId,
    /// Canonical name kept for weighting without a join
    pub summoner_name: String,
    pub lcu_game_id: LcuGameId,
    pub voted_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::matches::Entity",
        from = "Column::MatchId",
        to = "super::matches::Column::Id"
    )]
    Match,
    #[sea_orm(
        belongs_to = "super::players::Entity",
        from = "Column::PlayerId",
        to = "super::players::Column::Id"
    )]
    Player,
}

impl Related<super::matches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Match.def()
    }
}

impl Related<super::players::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts or overwrites the player's vote for the match
    pub async fn upsert(
        db: &DatabaseConnection,
        match_id: MatchId,
        player_id: PlayerId,
        summoner_name: &str,
        lcu_game_id: LcuGameId,
    ) -> DbResult<Self> {
        let existing = Entity::find()
            .filter(
                Column::MatchId
                    .eq(match_id)
                    .and(Column::PlayerId.eq(player_id)),
            )
            .one(db)
            .await?;

        if let Some(vote) = existing {
            let mut model = vote.into_active_model();
            model.lcu_game_id = Set(lcu_game_id);
            model.voted_at = Set(Utc::now());
            return model.update(db).await;
        }

        ActiveModel {
            id: NotSet,
            match_id: Set(match_id),
            player_id: Set(player_id),
            summoner_name: Set(summoner_name.to_lowercase()),
            lcu_game_id: Set(lcu_game_id),
            voted_at: Set(Utc::now()),
        }
        .insert(db)
        .await
    }

    pub fn all_for_match(
        db: &DatabaseConnection,
        match_id: MatchId,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send + '_ {
        Entity::find().filter(Column::MatchId.eq(match_id)).all(db)
    }

    /// Votes are destroyed together with the parent match
    pub fn delete_for_match(
        db: &DatabaseConnection,
        match_id: MatchId,
    ) -> impl Future<Output = DbResult<DeleteResult>> + Send + '_ {
        Entity::delete_many()
            .filter(Column::MatchId.eq(match_id))
            .exec(db)
    }
}
