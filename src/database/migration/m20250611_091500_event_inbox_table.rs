use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EventInbox::Table)
                    .if_not_exists()
                    .col(pk_auto(EventInbox::Id))
                    .col(string(EventInbox::EventId))
                    .col(string(EventInbox::InstanceId))
                    .col(date_time(EventInbox::SeenAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-event-inbox-event-instance")
                    .table(EventInbox::Table)
                    .col(EventInbox::EventId)
                    .col(EventInbox::InstanceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventInbox::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EventInbox {
    Table,
    Id,
    EventId,
    InstanceId,
    SeenAt,
}
