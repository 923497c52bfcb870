use crate::database::DbResult;
use sea_orm::{entity::prelude::*, ActiveValue::Set, IntoActiveModel};

/// Free-form key/value settings rows, read once at startup
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Settings key holding the persisted privileged voter list
pub const PRIVILEGED_VOTERS: &str = "privileged_voters";

impl Model {
    pub async fn get(db: &DatabaseConnection, key: &str) -> DbResult<Option<String>> {
        Ok(Entity::find_by_id(key.to_string())
            .one(db)
            .await?
            .map(|model| model.value))
    }

    pub async fn set(db: &DatabaseConnection, key: &str, value: String) -> DbResult<()> {
        if let Some(existing) = Entity::find_by_id(key.to_string()).one(db).await? {
            let mut model = existing.into_active_model();
            model.value = Set(value);
            model.update(db).await?;
        } else {
            ActiveModel {
                key: Set(key.to_string()),
                value: Set(value),
            }
            .insert(db)
            .await?;
        }
        Ok(())
    }
}
