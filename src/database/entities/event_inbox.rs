use crate::database::DbResult;
use chrono::Utc;
use sea_orm::{
    entity::prelude::*,
    sea_query::OnConflict,
    ActiveValue::{NotSet, Set},
    DeleteResult,
};
use std::future::Future;

/// Dedupe ledger for bus deliveries. An event is processed by an
/// instance only when its `(event_id, instance_id)` pair inserts
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "event_inbox")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub event_id: String,
    pub instance_id: String,
    pub seen_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Attempts to record the event for this instance. Returns false
    /// when the event was already seen and must be dropped
    pub async fn insert_once(
        db: &DatabaseConnection,
        event_id: &str,
        instance_id: &str,
    ) -> DbResult<bool> {
        let inserted = Entity::insert(ActiveModel {
            id: NotSet,
            event_id: Set(event_id.to_string()),
            instance_id: Set(instance_id.to_string()),
            seen_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::columns([Column::EventId, Column::InstanceId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

        Ok(inserted > 0)
    }

    /// Drops rows older than the retention horizon
    pub fn prune_before(
        db: &DatabaseConnection,
        cutoff: DateTimeUtc,
    ) -> impl Future<Output = DbResult<DeleteResult>> + Send + '_ {
        Entity::delete_many()
            .filter(Column::SeenAt.lt(cutoff))
            .exec(db)
    }
}
