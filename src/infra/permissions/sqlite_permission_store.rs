// SQLite implementation of the PermissionStore trait

use crate::core::permissions::{GuildSetting, OverrideRow, PermissionError, PermissionStore};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqlitePermissionStore {
    pool: SqlitePool,
}

impl SqlitePermissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS command_permissions (
                guild_id INTEGER NOT NULL,
                command_name TEXT NOT NULL,
                role_id INTEGER NOT NULL,
                PRIMARY KEY (guild_id, command_name, role_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER NOT NULL,
                setting_name TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (guild_id, setting_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn load_all_overrides(&self) -> Result<Vec<OverrideRow>, PermissionError> {
        let rows = sqlx::query("SELECT guild_id, command_name, role_id FROM command_permissions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PermissionError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| OverrideRow {
                guild_id: row.get::<i64, _>("guild_id") as u64,
                command: row.get("command_name"),
                role_id: row.get::<i64, _>("role_id") as u64,
            })
            .collect())
    }

    async fn load_guild_overrides(
        &self,
        guild_id: u64,
    ) -> Result<Vec<(String, u64)>, PermissionError> {
        let rows = sqlx::query(
            "SELECT command_name, role_id FROM command_permissions WHERE guild_id = ?",
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PermissionError::StorageError(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get::<String, _>("command_name"),
                    row.get::<i64, _>("role_id") as u64,
                )
            })
            .collect())
    }

    async fn insert_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO command_permissions (guild_id, command_name, role_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(guild_id as i64)
        .bind(command)
        .bind(role_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| PermissionError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn delete_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError> {
        sqlx::query(
            "DELETE FROM command_permissions WHERE guild_id = ? AND command_name = ? AND role_id = ?",
        )
        .bind(guild_id as i64)
        .bind(command)
        .bind(role_id as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| PermissionError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn upsert_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
        value: u64,
    ) -> Result<(), PermissionError> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, setting_name, value)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, setting_name) DO UPDATE SET
                value = excluded.value
            "#,
        )
        .bind(guild_id as i64)
        .bind(setting.key())
        .bind(value as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| PermissionError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn get_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
    ) -> Result<Option<u64>, PermissionError> {
        let row = sqlx::query(
            "SELECT value FROM guild_settings WHERE guild_id = ? AND setting_name = ?",
        )
        .bind(guild_id as i64)
        .bind(setting.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PermissionError::StorageError(e.to_string()))?;

        Ok(row.map(|row| row.get::<i64, _>("value") as u64))
    }
}
