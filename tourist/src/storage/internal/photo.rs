use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{DownloadStatus, Photo};

#[derive(Debug, Clone, FromRow)]
struct PhotoDbRecord {
    id: i64,
    pin_id: i64,
    photo_id: String,
    url: String,
    file_name: String,
    downloaded: bool,
}

impl TryFrom<PhotoDbRecord> for Photo {
    type Error = Error;

    fn try_from(record: PhotoDbRecord) -> std::result::Result<Self, Self::Error> {
        Ok(Photo {
            id: record.id,
            pin_id: record.pin_id,
            photo_id: record.photo_id,
            url: Url::parse(&record.url)?,
            file_name: record.file_name,
            downloaded: record.downloaded,
        })
    }
}

pub async fn create_photo_table(db: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pin_id INTEGER NOT NULL REFERENCES pins (id) ON DELETE CASCADE,
    photo_id TEXT NOT NULL,
    url TEXT NOT NULL,
    file_name TEXT NOT NULL,
    downloaded INTEGER NOT NULL DEFAULT 0
);"#,
    )
    .execute(db)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_pin_id ON photos (pin_id);")
        .execute(db)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_file_name ON photos (file_name);")
        .execute(db)
        .await?;
    Ok(())
}

/// Inserts one photo record and returns its row id.
pub async fn save_photo<'e, E>(
    executor: E,
    pin_id: i64,
    photo_id: &str,
    url: &Url,
    file_name: &str,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(
        r#"INSERT INTO photos (
    pin_id,
    photo_id,
    url,
    file_name
)
VALUES
    (?, ?, ?, ?);"#,
    )
    .bind(pin_id)
    .bind(photo_id)
    .bind(url.as_str())
    .bind(file_name)
    .execute(executor)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn get_photo<'e, E>(executor: E, id: i64) -> Result<Option<Photo>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record: Option<PhotoDbRecord> = sqlx::query_as("SELECT * FROM photos WHERE id = ?;")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    record.map(Photo::try_from).transpose()
}

pub async fn get_photos_by_pin_id<'e, E>(executor: E, pin_id: i64) -> Result<Vec<Photo>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let records: Vec<PhotoDbRecord> =
        sqlx::query_as("SELECT * FROM photos WHERE pin_id = ? ORDER BY id;")
            .bind(pin_id)
            .fetch_all(executor)
            .await?;
    records.into_iter().map(Photo::try_from).collect()
}

/// Deletes one photo, returning the file name it referenced.
pub async fn delete_photo<'e, E>(executor: E, id: i64) -> Result<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let file_name = sqlx::query_scalar::<Sqlite, String>(
        "DELETE FROM photos WHERE id = ? RETURNING file_name;",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;
    Ok(file_name)
}

/// Deletes every photo of a pin, returning the file names they referenced.
pub async fn delete_photos_by_pin_id<'e, E>(executor: E, pin_id: i64) -> Result<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let file_names = sqlx::query_scalar::<Sqlite, String>(
        "DELETE FROM photos WHERE pin_id = ? RETURNING file_name;",
    )
    .bind(pin_id)
    .fetch_all(executor)
    .await?;
    Ok(file_names)
}

pub async fn mark_downloaded<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query("UPDATE photos SET downloaded = 1 WHERE id = ?;")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn count_file_references<'e, E>(executor: E, file_name: &str) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count =
        sqlx::query_scalar::<Sqlite, i64>("SELECT COUNT(*) FROM photos WHERE file_name = ?;")
            .bind(file_name)
            .fetch_one(executor)
            .await?;
    Ok(count)
}

pub async fn get_download_status<'e, E>(executor: E, pin_id: i64) -> Result<DownloadStatus>
where
    E: Executor<'e, Database = Sqlite>,
{
    let (total, downloaded) = sqlx::query_as::<Sqlite, (i64, i64)>(
        "SELECT COUNT(*), COALESCE(SUM(downloaded), 0) FROM photos WHERE pin_id = ?;",
    )
    .bind(pin_id)
    .fetch_one(executor)
    .await?;
    Ok(DownloadStatus {
        total: total as u64,
        downloaded: downloaded as u64,
    })
}
