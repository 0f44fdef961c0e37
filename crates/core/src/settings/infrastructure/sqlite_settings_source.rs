use rusqlite::{params, OptionalExtension};

use crate::settings::domain::settings_source::SettingsSource;
use crate::shared::store_error::StoreError;
use crate::storage::infrastructure::database::Database;

/// Settings persisted in the `settings` key/value table.
#[derive(Clone)]
pub struct SqliteSettingsSource {
    db: Database,
}

impl SqliteSettingsSource {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SettingsSource for SqliteSettingsSource {
    fn fetch(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }
}
