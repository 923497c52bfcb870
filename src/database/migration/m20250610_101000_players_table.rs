use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(pk_auto(Players::Id))
                    .col(string(Players::SummonerName))
                    .col(string(Players::GameName))
                    .col(string(Players::TagLine))
                    .col(string_null(Players::Puuid))
                    .col(string_null(Players::Region))
                    .col(integer_null(Players::ProfileIconId))
                    .col(integer(Players::CustomLp))
                    .col(integer(Players::CustomMmr))
                    .col(integer(Players::Wins))
                    .col(integer(Players::Losses))
                    .col(integer(Players::GamesPlayed))
                    .col(date_time(Players::CreatedAt))
                    .col(date_time(Players::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-players-summoner-name")
                    .table(Players::Table)
                    .col(Players::SummonerName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Players {
    Table,
    Id,
    /// Canonical lowercased riot id used for lookups
    SummonerName,
    GameName,
    TagLine,
    Puuid,
    Region,
    ProfileIconId,
    CustomLp,
    CustomMmr,
    Wins,
    Losses,
    GamesPlayed,
    CreatedAt,
    UpdatedAt,
}
