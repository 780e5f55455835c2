use async_trait::async_trait;
use domains::{Result, SettingsRepository};
use sqlx::Row;

use super::{internal, SqliteStore};

#[async_trait]
impl SettingsRepository for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(internal)?;

        row.map(|r| r.try_get::<String, _>("value").map_err(internal)).transpose()
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool())
        .await
        .map_err(internal)?;
        Ok(())
    }
}
