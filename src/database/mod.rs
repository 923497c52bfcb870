use crate::config::Config;
use log::info;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;

use self::migration::Migrator;
use std::io;
use std::path::Path;
use tokio::fs::{create_dir_all, File};

pub mod entities;
pub mod migration;

pub type DbResult<T> = Result<T, DbErr>;
pub use sea_orm::DbErr;

/// Connects to the database and applies any outstanding migrations.
///
/// Uses the configured connection url when one is provided, otherwise
/// falls back onto a local sqlite file creating it if missing.
pub async fn init(config: &Config) -> io::Result<DatabaseConnection> {
    info!("Connecting to database..");

    let con_str = match &config.database.url {
        Some(url) => url.clone(),
        None => {
            let db_file = &config.database.file;
            let file_path = Path::new(db_file);
            if let Some(parent) = file_path.parent() {
                if !parent.exists() {
                    create_dir_all(parent).await?;
                }
            }

            if !file_path.exists() {
                File::create(file_path).await?;
            }

            format!("sqlite:{db_file}")
        }
    };

    let connection = sea_orm::Database::connect(&con_str).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to create database connection: {err:?}"),
        )
    })?;

    info!("Running migrations...");

    Migrator::up(&connection, None).await.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Unable to run database migrations: {err:?}"),
        )
    })?;

    Ok(connection)
}
