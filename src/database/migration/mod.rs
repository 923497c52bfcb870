pub use sea_orm_migration::prelude::*;

mod m20250610_101000_players_table;
mod m20250610_102500_queue_players_table;
mod m20250610_104000_custom_matches_table;
mod m20250611_090000_match_votes_table;
mod m20250611_091500_event_inbox_table;
mod m20250612_120000_settings_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250610_101000_players_table::Migration),
            Box::new(m20250610_102500_queue_players_table::Migration),
            Box::new(m20250610_104000_custom_matches_table::Migration),
            Box::new(m20250611_090000_match_votes_table::Migration),
            Box::new(m20250611_091500_event_inbox_table::Migration),
            Box::new(m20250612_120000_settings_table::Migration),
        ]
    }
}
