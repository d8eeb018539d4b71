//! `SQLite` implementation of [`OptionsStore`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use offpeak_app::ports::OptionsStore;
use offpeak_domain::error::OffpeakError;
use offpeak_domain::options::OptionUpdate;

use crate::error::StorageError;

/// A stored row, before its value is decoded.
struct StoredOption {
    key: String,
    value: String,
}

impl<'r> FromRow<'r, SqliteRow> for StoredOption {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            key: row.try_get("key")?,
            value: row.try_get("value")?,
        })
    }
}

impl StoredOption {
    fn decode(&self) -> Result<OptionUpdate, serde_json::Error> {
        let value = serde_json::from_str(&self.value)?;
        OptionUpdate::from_parts(&self.key, value)
    }
}

const UPSERT: &str = "INSERT INTO scheduler_options (scheduler, key, value, updated_at) VALUES (?, ?, ?, ?) \
     ON CONFLICT (scheduler, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";
const SELECT_BY_SCHEDULER: &str =
    "SELECT key, value FROM scheduler_options WHERE scheduler = ? ORDER BY key";

/// `SQLite`-backed options store. One row per scheduler and option key; the
/// latest write wins.
#[derive(Clone)]
pub struct SqliteOptionsStore {
    pool: SqlitePool,
}

impl SqliteOptionsStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl OptionsStore for SqliteOptionsStore {
    fn save(
        &self,
        scheduler: &str,
        update: &OptionUpdate,
    ) -> impl Future<Output = Result<(), OffpeakError>> + Send {
        let pool = self.pool.clone();
        let scheduler = scheduler.to_string();
        let key = update.key();
        let value = update.value().to_string();
        async move {
            sqlx::query(UPSERT)
                .bind(&scheduler)
                .bind(key)
                .bind(value)
                .bind(chrono::Utc::now())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn load(
        &self,
        scheduler: &str,
    ) -> impl Future<Output = Result<Vec<OptionUpdate>, OffpeakError>> + Send {
        let pool = self.pool.clone();
        let scheduler = scheduler.to_string();
        async move {
            let rows: Vec<StoredOption> = sqlx::query_as(SELECT_BY_SCHEDULER)
                .bind(&scheduler)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            let updates = rows
                .iter()
                .filter_map(|row| match row.decode() {
                    Ok(update) => Some(update),
                    Err(err) => {
                        tracing::warn!(%scheduler, key = %row.key, error = %err, "ignoring unreadable stored option");
                        None
                    }
                })
                .collect();
            Ok(updates)
        }
    }
}
