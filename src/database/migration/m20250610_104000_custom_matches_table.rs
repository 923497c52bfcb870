use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CustomMatches::Table)
                    .if_not_exists()
                    .col(pk_auto(CustomMatches::Id))
                    .col(json_binary(CustomMatches::Team1Players))
                    .col(json_binary(CustomMatches::Team2Players))
                    .col(integer(CustomMatches::AverageMmrTeam1))
                    .col(integer(CustomMatches::AverageMmrTeam2))
                    .col(string_len(CustomMatches::Status, 16))
                    .col(json_binary(CustomMatches::QueueSnapshot))
                    .col(json_binary_null(CustomMatches::PickBanData))
                    .col(json_binary_null(CustomMatches::LcuMatchData))
                    .col(big_integer_null(CustomMatches::RiotGameId))
                    .col(integer_null(CustomMatches::WinnerTeam))
                    .col(string_null(CustomMatches::OwnerBackendId))
                    .col(date_time_null(CustomMatches::OwnerHeartbeat))
                    .col(date_time(CustomMatches::CreatedAt))
                    .col(date_time_null(CustomMatches::CompletedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-custom-matches-status-completed")
                    .table(CustomMatches::Table)
                    .col(CustomMatches::Status)
                    .col(CustomMatches::CompletedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-custom-matches-riot-game")
                    .table(CustomMatches::Table)
                    .col(CustomMatches::RiotGameId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CustomMatches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CustomMatches {
    Table,
    Id,
    Team1Players,
    Team2Players,
    AverageMmrTeam1,
    AverageMmrTeam2,
    Status,
    /// Frozen queue rows including acceptance state
    QueueSnapshot,
    /// The draft document
    PickBanData,
    /// Verbatim vendor payload of the linked game
    LcuMatchData,
    RiotGameId,
    WinnerTeam,
    OwnerBackendId,
    OwnerHeartbeat,
    CreatedAt,
    CompletedAt,
}
