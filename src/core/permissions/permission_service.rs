// Permission service - command overrides and guild settings.
//
// This service handles:
// - Per-guild command overrides (which roles may run which command)
// - Guild settings (isolation role, log channel)
// - Keeping the in-memory cache in step with every write
//
// NO Discord dependencies here - just IDs and strings.

use super::permission_cache::PermissionCache;
use super::permission_models::{GuildOverrides, GuildSetting, OverrideRow};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The setting has never been set for this guild.
    #[error("{0} is not configured for this server. Set it with {}.", .0.config_command())]
    NotConfigured(GuildSetting),

    #[error("No permission override found for `{0}`")]
    OverrideNotFound(String),

    #[error("Role {role_id} has no override for `{command}`")]
    RoleNotGranted { command: String, role_id: u64 },
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for overrides and guild settings.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Every override row, used to warm the cache at startup.
    async fn load_all_overrides(&self) -> Result<Vec<OverrideRow>, PermissionError>;

    /// Every override row for one guild as (command, role) pairs.
    async fn load_guild_overrides(
        &self,
        guild_id: u64,
    ) -> Result<Vec<(String, u64)>, PermissionError>;

    /// Insert an override. Already-present rows are left alone.
    async fn insert_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError>;

    /// Delete an override. Deleting a missing row is not an error.
    async fn delete_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError>;

    async fn upsert_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
        value: u64,
    ) -> Result<(), PermissionError>;

    async fn get_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
    ) -> Result<Option<u64>, PermissionError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct PermissionService<S: PermissionStore> {
    store: S,
    cache: PermissionCache,
}

impl<S: PermissionStore> PermissionService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: PermissionCache::new(),
        }
    }

    /// Load every override row into the cache. Returns how many guilds were cached.
    pub async fn warm_cache(&self) -> Result<usize, PermissionError> {
        let rows = self.store.load_all_overrides().await?;
        let row_count = rows.len();
        let guilds = self.cache.replace_all(rows).await;
        info!(guilds, rows = row_count, "Permission cache warmed");
        Ok(guilds)
    }

    /// Overrides for a guild, served from the cache when possible.
    ///
    /// The returned map is a shared snapshot; later writes don't change it.
    pub async fn get_overrides(&self, guild_id: u64) -> Result<Arc<GuildOverrides>, PermissionError> {
        if let Some(cached) = self.cache.get(guild_id).await {
            return Ok(cached);
        }

        let generation = self.cache.generation();
        let rows = self.store.load_guild_overrides(guild_id).await?;
        debug!(guild_id, rows = rows.len(), "Permission cache miss");

        let mut overrides = GuildOverrides::new();
        for (command, role_id) in rows {
            overrides.entry(command).or_default().insert(role_id);
        }

        Ok(self.cache.install(guild_id, overrides, generation).await)
    }

    /// Roles allowed to run `command` in a guild. Empty when there are no overrides.
    pub async fn roles_for(&self, guild_id: u64, command: &str) -> Result<Vec<u64>, PermissionError> {
        let overrides = self.get_overrides(guild_id).await?;
        Ok(overrides
            .get(command)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Grant `role_id` the right to run `command`. Granting twice is fine.
    pub async fn set_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError> {
        // Load the guild first so the write below lands in a cached entry.
        self.get_overrides(guild_id).await?;
        self.store.insert_override(guild_id, command, role_id).await?;
        self.cache.add_role(guild_id, command, role_id).await;
        info!(guild_id, command, role_id, "Command override granted");
        Ok(())
    }

    /// Storage-level removal. Missing overrides are a silent no-op.
    pub async fn remove_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError> {
        self.store.delete_override(guild_id, command, role_id).await?;
        self.cache.remove_role(guild_id, command, role_id).await;
        info!(guild_id, command, role_id, "Command override removed");
        Ok(())
    }

    /// Remove an override, reporting when there was nothing to remove.
    pub async fn revoke_override(
        &self,
        guild_id: u64,
        command: &str,
        role_id: u64,
    ) -> Result<(), PermissionError> {
        let overrides = self.get_overrides(guild_id).await?;
        let roles = overrides
            .get(command)
            .ok_or_else(|| PermissionError::OverrideNotFound(command.to_string()))?;
        if !roles.contains(&role_id) {
            return Err(PermissionError::RoleNotGranted {
                command: command.to_string(),
                role_id,
            });
        }

        self.remove_override(guild_id, command, role_id).await
    }

    pub async fn set_guild_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
        value: u64,
    ) -> Result<(), PermissionError> {
        self.store.upsert_setting(guild_id, setting, value).await?;
        info!(guild_id, setting = setting.key(), value, "Guild setting updated");
        Ok(())
    }

    /// Point lookup of a setting; `NotConfigured` when it was never set.
    pub async fn guild_setting(
        &self,
        guild_id: u64,
        setting: GuildSetting,
    ) -> Result<u64, PermissionError> {
        self.store
            .get_setting(guild_id, setting)
            .await?
            .ok_or(PermissionError::NotConfigured(setting))
    }

    pub async fn isolation_role(&self, guild_id: u64) -> Result<u64, PermissionError> {
        self.guild_setting(guild_id, GuildSetting::IsolationRole).await
    }

    pub async fn set_isolation_role(&self, guild_id: u64, role_id: u64) -> Result<(), PermissionError> {
        self.set_guild_setting(guild_id, GuildSetting::IsolationRole, role_id)
            .await
    }

    pub async fn log_channel(&self, guild_id: u64) -> Result<u64, PermissionError> {
        self.guild_setting(guild_id, GuildSetting::LogChannel).await
    }

    pub async fn set_log_channel(&self, guild_id: u64, channel_id: u64) -> Result<(), PermissionError> {
        self.set_guild_setting(guild_id, GuildSetting::LogChannel, channel_id)
            .await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store for testing. Counts guild loads so tests can tell
    /// whether a read was served from the cache.
    #[derive(Default)]
    pub(crate) struct MockPermissionStore {
        rows: Mutex<Vec<OverrideRow>>,
        settings: Mutex<HashMap<(u64, &'static str), u64>>,
        pub guild_loads: AtomicUsize,
        pub fail: AtomicBool,
    }

    impl MockPermissionStore {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        fn check(&self) -> Result<(), PermissionError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PermissionError::StorageError("database is locked".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PermissionStore for MockPermissionStore {
        async fn load_all_overrides(&self) -> Result<Vec<OverrideRow>, PermissionError> {
            self.check()?;
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn load_guild_overrides(
            &self,
            guild_id: u64,
        ) -> Result<Vec<(String, u64)>, PermissionError> {
            self.check()?;
            self.guild_loads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.guild_id == guild_id)
                .map(|r| (r.command.clone(), r.role_id))
                .collect())
        }

        async fn insert_override(
            &self,
            guild_id: u64,
            command: &str,
            role_id: u64,
        ) -> Result<(), PermissionError> {
            self.check()?;
            let row = OverrideRow {
                guild_id,
                command: command.to_string(),
                role_id,
            };
            let mut rows = self.rows.lock().unwrap();
            if !rows.contains(&row) {
                rows.push(row);
            }
            Ok(())
        }

        async fn delete_override(
            &self,
            guild_id: u64,
            command: &str,
            role_id: u64,
        ) -> Result<(), PermissionError> {
            self.check()?;
            self.rows.lock().unwrap().retain(|r| {
                !(r.guild_id == guild_id && r.command == command && r.role_id == role_id)
            });
            Ok(())
        }

        async fn upsert_setting(
            &self,
            guild_id: u64,
            setting: GuildSetting,
            value: u64,
        ) -> Result<(), PermissionError> {
            self.check()?;
            self.settings
                .lock()
                .unwrap()
                .insert((guild_id, setting.key()), value);
            Ok(())
        }

        async fn get_setting(
            &self,
            guild_id: u64,
            setting: GuildSetting,
        ) -> Result<Option<u64>, PermissionError> {
            self.check()?;
            Ok(self
                .settings
                .lock()
                .unwrap()
                .get(&(guild_id, setting.key()))
                .copied())
        }
    }

    #[tokio::test]
    async fn test_set_override_is_visible_without_storage_read() {
        let service = PermissionService::new(MockPermissionStore::new());
        service.get_overrides(1).await.unwrap();
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), 1);

        service.set_override(1, "isolate", 42).await.unwrap();
        let overrides = service.get_overrides(1).await.unwrap();

        assert!(overrides["isolate"].contains(&42));
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_override_on_uncached_guild_is_cached() {
        let service = PermissionService::new(MockPermissionStore::new());

        service.set_override(3, "log", 8).await.unwrap();
        let loads = service.store.guild_loads.load(Ordering::SeqCst);
        let overrides = service.get_overrides(3).await.unwrap();

        assert!(overrides["log"].contains(&8));
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), loads);
    }

    #[tokio::test]
    async fn test_miss_loads_from_storage_once() {
        let store = MockPermissionStore::new();
        store.insert_override(1, "config", 9).await.unwrap();
        let service = PermissionService::new(store);

        let first = service.get_overrides(1).await.unwrap();
        let second = service.get_overrides(1).await.unwrap();

        assert!(first["config"].contains(&9));
        assert_eq!(first, second);
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_cache_serves_every_guild() {
        let store = MockPermissionStore::new();
        store.insert_override(1, "isolate", 10).await.unwrap();
        store.insert_override(2, "log", 20).await.unwrap();
        let service = PermissionService::new(store);

        assert_eq!(service.warm_cache().await.unwrap(), 2);
        assert_eq!(service.roles_for(2, "log").await.unwrap(), vec![20]);
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_granting_twice_is_not_an_error() {
        let service = PermissionService::new(MockPermissionStore::new());
        service.set_override(1, "isolate", 42).await.unwrap();
        service.set_override(1, "isolate", 42).await.unwrap();

        assert_eq!(service.roles_for(1, "isolate").await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_storage_error_leaves_cache_untouched() {
        let service = PermissionService::new(MockPermissionStore::new());
        service.store.fail.store(true, Ordering::SeqCst);

        let result = service.get_overrides(1).await;
        assert!(matches!(result, Err(PermissionError::StorageError(_))));

        service.store.fail.store(false, Ordering::SeqCst);
        service.get_overrides(1).await.unwrap();
        assert_eq!(service.store.guild_loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_revoke_reports_missing_override() {
        let service = PermissionService::new(MockPermissionStore::new());

        let result = service.revoke_override(1, "isolate", 5).await;
        assert!(matches!(result, Err(PermissionError::OverrideNotFound(_))));

        service.set_override(1, "isolate", 6).await.unwrap();
        let result = service.revoke_override(1, "isolate", 5).await;
        assert!(matches!(
            result,
            Err(PermissionError::RoleNotGranted { role_id: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_revoke_removes_from_store_and_cache() {
        let service = PermissionService::new(MockPermissionStore::new());
        service.set_override(1, "isolate", 5).await.unwrap();
        service.set_override(1, "isolate", 6).await.unwrap();

        service.revoke_override(1, "isolate", 5).await.unwrap();

        assert_eq!(service.roles_for(1, "isolate").await.unwrap(), vec![6]);
        let stored = service.store.load_guild_overrides(1).await.unwrap();
        assert_eq!(stored, vec![("isolate".to_string(), 6)]);
    }

    #[tokio::test]
    async fn test_unset_setting_is_not_configured() {
        let service = PermissionService::new(MockPermissionStore::new());

        let result = service.isolation_role(1).await;
        assert!(matches!(
            result,
            Err(PermissionError::NotConfigured(GuildSetting::IsolationRole))
        ));

        service.set_isolation_role(1, 77).await.unwrap();
        service.set_isolation_role(1, 78).await.unwrap();
        assert_eq!(service.isolation_role(1).await.unwrap(), 78);
        assert!(service.log_channel(1).await.is_err());
    }
}
