// SQLite implementation of the RoleStore trait

use crate::core::isolation::{decode_roles, encode_roles, IsolationError, RoleStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqliteRoleStore {
    pool: SqlitePool,
}

impl SqliteRoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                roles TEXT NOT NULL,
                isolated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, guild_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RoleStore for SqliteRoleStore {
    async fn save_roles(
        &self,
        user_id: u64,
        guild_id: u64,
        roles: &[u64],
    ) -> Result<(), IsolationError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, guild_id, roles, isolated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
                roles = excluded.roles,
                isolated_at = excluded.isolated_at
            "#,
        )
        .bind(user_id as i64)
        .bind(guild_id as i64)
        .bind(encode_roles(roles))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| IsolationError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn saved_roles(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<Option<Vec<u64>>, IsolationError> {
        let row = sqlx::query("SELECT roles FROM user_roles WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IsolationError::StorageError(e.to_string()))?;

        Ok(row.map(|row| decode_roles(&row.get::<String, _>("roles"))))
    }

    async fn delete_roles(&self, user_id: u64, guild_id: u64) -> Result<(), IsolationError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| IsolationError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::database;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn memory_store() -> SqliteRoleStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRoleStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_save_overwrites_and_keeps_order() {
        let store = memory_store().await;

        store.save_roles(20, 1, &[31, 32]).await.unwrap();
        store.save_roles(20, 1, &[33, 31]).await.unwrap();

        assert_eq!(store.saved_roles(20, 1).await.unwrap(), Some(vec![33, 31]));
        assert_eq!(store.saved_roles(20, 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_role_set_is_still_a_record() {
        let store = memory_store().await;

        store.save_roles(20, 1, &[]).await.unwrap();

        assert_eq!(store.saved_roles(20, 1).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let store = memory_store().await;

        store.save_roles(20, 1, &[31]).await.unwrap();
        store.delete_roles(20, 1).await.unwrap();
        store.delete_roles(20, 1).await.unwrap();

        assert_eq!(store.saved_roles(20, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_saved_roles_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shieldbot.db");

        let pool = database::connect(&path).await.unwrap();
        let store = SqliteRoleStore::new(pool.clone());
        store.migrate().await.unwrap();
        store.save_roles(20, 1, &[31, 32]).await.unwrap();
        pool.close().await;

        let store = SqliteRoleStore::new(database::connect(&path).await.unwrap());
        store.migrate().await.unwrap();
        assert_eq!(store.saved_roles(20, 1).await.unwrap(), Some(vec![31, 32]));
    }
}
