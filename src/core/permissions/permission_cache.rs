// In-memory mirror of the `command_permissions` table.
//
// Locking rule: the RwLock is only ever held around map access, never across
// a storage round-trip. The service does its I/O first and then touches the
// cache.

use super::permission_models::{GuildOverrides, OverrideRow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Guild -> command -> authorized roles.
///
/// A cached guild entry is always a complete copy of that guild's rows plus
/// every write applied since. Writes against a guild that isn't cached are
/// skipped; the next read loads it fresh from storage.
pub struct PermissionCache {
    guilds: RwLock<HashMap<u64, Arc<GuildOverrides>>>,
    // Bumped on every write so a slow miss-load can tell it raced a writer.
    generation: AtomicU64,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self {
            guilds: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, guild_id: u64) -> Option<Arc<GuildOverrides>> {
        self.guilds.read().await.get(&guild_id).cloned()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Install a freshly loaded guild unless a write landed since `seen_generation`.
    ///
    /// Returns the entry callers should use: the one already cached if another
    /// task got there first, otherwise the loaded one.
    pub async fn install(
        &self,
        guild_id: u64,
        loaded: GuildOverrides,
        seen_generation: u64,
    ) -> Arc<GuildOverrides> {
        let loaded = Arc::new(loaded);
        let mut guilds = self.guilds.write().await;

        if let Some(existing) = guilds.get(&guild_id) {
            return Arc::clone(existing);
        }
        if self.generation() != seen_generation {
            // A write raced the load. Hand back what we read but don't cache it.
            return loaded;
        }

        guilds.insert(guild_id, Arc::clone(&loaded));
        loaded
    }

    /// Replace the whole cache from a full table scan.
    pub async fn replace_all(&self, rows: Vec<OverrideRow>) -> usize {
        let mut grouped: HashMap<u64, GuildOverrides> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.guild_id)
                .or_default()
                .entry(row.command)
                .or_default()
                .insert(row.role_id);
        }

        let count = grouped.len();
        let mut guilds = self.guilds.write().await;
        *guilds = grouped
            .into_iter()
            .map(|(guild_id, overrides)| (guild_id, Arc::new(overrides)))
            .collect();
        self.generation.fetch_add(1, Ordering::AcqRel);
        count
    }

    pub async fn add_role(&self, guild_id: u64, command: &str, role_id: u64) {
        let mut guilds = self.guilds.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(entry) = guilds.get_mut(&guild_id) {
            // Readers holding the old Arc keep their snapshot.
            Arc::make_mut(entry)
                .entry(command.to_string())
                .or_default()
                .insert(role_id);
        }
    }

    pub async fn remove_role(&self, guild_id: u64, command: &str, role_id: u64) {
        let mut guilds = self.guilds.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(entry) = guilds.get_mut(&guild_id) {
            let overrides = Arc::make_mut(entry);
            if let Some(roles) = overrides.get_mut(command) {
                roles.remove(&role_id);
                if roles.is_empty() {
                    overrides.remove(command);
                }
            }
        }
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(guild_id: u64, command: &str, role_id: u64) -> OverrideRow {
        OverrideRow {
            guild_id,
            command: command.to_string(),
            role_id,
        }
    }

    #[tokio::test]
    async fn test_replace_all_groups_rows_by_guild() {
        let cache = PermissionCache::new();
        let guilds = cache
            .replace_all(vec![
                row(1, "isolate", 10),
                row(1, "isolate", 11),
                row(1, "config", 12),
                row(2, "log", 20),
            ])
            .await;

        assert_eq!(guilds, 2);
        let first = cache.get(1).await.unwrap();
        assert_eq!(first["isolate"].len(), 2);
        assert!(first["config"].contains(&12));
        assert!(cache.get(2).await.unwrap()["log"].contains(&20));
    }

    #[tokio::test]
    async fn test_writes_skip_uncached_guilds() {
        let cache = PermissionCache::new();
        cache.add_role(7, "isolate", 1).await;
        assert!(cache.get(7).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_is_not_mutated_by_later_writes() {
        let cache = PermissionCache::new();
        let generation = cache.generation();
        cache.install(1, GuildOverrides::new(), generation).await;

        let before = cache.get(1).await.unwrap();
        cache.add_role(1, "isolate", 5).await;
        let after = cache.get(1).await.unwrap();

        assert!(before.get("isolate").is_none());
        assert!(after["isolate"].contains(&5));
    }

    #[tokio::test]
    async fn test_removing_last_role_drops_command() {
        let cache = PermissionCache::new();
        cache.replace_all(vec![row(1, "isolate", 5)]).await;
        cache.remove_role(1, "isolate", 5).await;
        assert!(cache.get(1).await.unwrap().get("isolate").is_none());
    }

    #[tokio::test]
    async fn test_install_after_racing_write_is_not_cached() {
        let cache = PermissionCache::new();
        let seen = cache.generation();
        cache.add_role(1, "isolate", 5).await;

        let returned = cache.install(1, GuildOverrides::new(), seen).await;
        assert!(returned.is_empty());
        assert!(cache.get(1).await.is_none());
    }
}
