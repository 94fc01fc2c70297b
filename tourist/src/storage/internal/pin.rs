use sqlx::{Executor, FromRow, Sqlite, SqlitePool};

use crate::error::Result;
use crate::models::{Coordinate, Pin};

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct PinInternal {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<PinInternal> for Pin {
    fn from(value: PinInternal) -> Self {
        Pin {
            id: value.id,
            coordinate: Coordinate::new(value.latitude, value.longitude),
        }
    }
}

pub async fn create_pin_table(db: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS pins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    UNIQUE (latitude, longitude)
);"#,
    )
    .execute(db)
    .await?;
    Ok(())
}

/// Inserts the pin unless one already exists at the same coordinate.
pub async fn save_pin<'e, E>(executor: E, coordinate: Coordinate) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO pins (latitude, longitude) VALUES (?, ?);")
        .bind(coordinate.latitude)
        .bind(coordinate.longitude)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn get_pin_by_coordinate<'e, E>(
    executor: E,
    coordinate: Coordinate,
) -> Result<Option<Pin>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let pin = sqlx::query_as::<Sqlite, PinInternal>(
        "SELECT * FROM pins WHERE latitude = ? AND longitude = ?;",
    )
    .bind(coordinate.latitude)
    .bind(coordinate.longitude)
    .fetch_optional(executor)
    .await?;
    Ok(pin.map(Pin::from))
}

pub async fn get_pin<'e, E>(executor: E, id: i64) -> Result<Option<Pin>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let pin = sqlx::query_as::<Sqlite, PinInternal>("SELECT * FROM pins WHERE id = ?;")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(pin.map(Pin::from))
}

pub async fn get_pins<'e, E>(executor: E) -> Result<Vec<Pin>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let pins = sqlx::query_as::<Sqlite, PinInternal>("SELECT * FROM pins ORDER BY id;")
        .fetch_all(executor)
        .await?;
    Ok(pins.into_iter().map(Pin::from).collect())
}

pub async fn delete_pin<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query("DELETE FROM pins WHERE id = ?;")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(res.rows_affected() > 0)
}
