use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueuePlayers::Table)
                    .if_not_exists()
                    .col(pk_auto(QueuePlayers::Id))
                    .col(integer(QueuePlayers::PlayerId))
                    .col(string(QueuePlayers::SummonerName))
                    .col(string_null(QueuePlayers::Region))
                    .col(integer(QueuePlayers::CustomLp))
                    .col(string_len(QueuePlayers::PrimaryLane, 16))
                    .col(string_len(QueuePlayers::SecondaryLane, 16))
                    .col(date_time(QueuePlayers::JoinTime))
                    .col(boolean(QueuePlayers::Active))
                    .col(string_len(QueuePlayers::AcceptanceStatus, 16))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-queue-players-summoner-name")
                    .table(QueuePlayers::Table)
                    .col(QueuePlayers::SummonerName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueuePlayers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QueuePlayers {
    Table,
    Id,
    PlayerId,
    SummonerName,
    Region,
    CustomLp,
    PrimaryLane,
    SecondaryLane,
    JoinTime,
    Active,
    AcceptanceStatus,
}
