use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MatchVotes::Table)
                    .if_not_exists()
                    .col(pk_auto(MatchVotes::Id))
                    .col(integer(MatchVotes::MatchId))
                    .col(integer(MatchVotes::PlayerId))
                    .col(string(MatchVotes::SummonerName))
                    .col(big_integer(MatchVotes::LcuGameId))
                    .col(date_time(MatchVotes::VotedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .from(MatchVotes::Table, MatchVotes::MatchId)
                            .to(CustomMatches::Table, CustomMatches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("idx-match-votes-match-player")
                    .table(MatchVotes::Table)
                    .col(MatchVotes::MatchId)
                    .col(MatchVotes::PlayerId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MatchVotes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MatchVotes {
    Table,
    Id,
    MatchId,
    PlayerId,
    SummonerName,
    LcuGameId,
    VotedAt,
}

#[derive(DeriveIden)]
enum CustomMatches {
    Table,
    Id,
}
