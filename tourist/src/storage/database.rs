use std::path::Path;

use log::{debug, error, info};
use sqlx::{
    Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use super::VALID_DB_VERSION;
use super::internal::{photo, pin};
use crate::error::{Error, Result};

pub async fn check_db_version(db_pool: &SqlitePool) -> Result<()> {
    let version = sqlx::query_as::<Sqlite, (i64,)>("PRAGMA user_version;")
        .fetch_one(db_pool)
        .await?;
    debug!("db version: {}", version.0);
    if version.0 == VALID_DB_VERSION {
        Ok(())
    } else {
        Err(Error::DbError(format!(
            "Invalid database version {}, expected {VALID_DB_VERSION}",
            version.0
        )))
    }
}

pub async fn create_db_pool(db_path: &Path) -> Result<SqlitePool> {
    info!("Initializing database pool at path: {db_path:?}");
    let exists = db_path.is_file();
    if !exists
        && let Some(parent) = db_path.parent()
        && !parent.exists()
    {
        info!("Creating parent directory for database: {parent:?}");
        tokio::fs::create_dir_all(parent).await?;
    }
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true);
    let db_pool = SqlitePool::connect_with(options).await?;
    if exists {
        info!("Database file exists at {db_path:?}. Checking version...");
        check_db_version(&db_pool).await.map_err(|e| {
            error!("Database version check failed: {e}");
            e
        })?;
    } else {
        info!("Database file created. Creating database tables...");
        create_tables(&db_pool).await?;
    }
    info!("Database connection successful.");
    Ok(db_pool)
}

/// An in-memory database with the schema in place. One connection, so every
/// query sees the same database.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let options = "sqlite::memory:"
        .parse::<SqliteConnectOptions>()?
        .foreign_keys(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    create_tables(&db_pool).await?;
    Ok(db_pool)
}

pub async fn create_tables(db_pool: &SqlitePool) -> Result<()> {
    pin::create_pin_table(db_pool).await?;
    photo::create_photo_table(db_pool).await?;
    sqlx::query(format!("PRAGMA user_version = {VALID_DB_VERSION};").as_str())
        .execute(db_pool)
        .await?;
    Ok(())
}
