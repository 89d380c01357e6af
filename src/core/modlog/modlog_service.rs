// Mod log service - posts moderator action records to the configured channel.

use super::modlog_models::ModLogEntry;
use crate::core::permissions::{PermissionError, PermissionService, PermissionStore};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ModLogError {
    #[error("Log channel not set. Please set it using /config setlogchannel.")]
    NotConfigured,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Failed to post to the log channel: {0}")]
    Delivery(String),
}

impl From<PermissionError> for ModLogError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NotConfigured(_) => ModLogError::NotConfigured,
            other => ModLogError::StorageError(other.to_string()),
        }
    }
}

/// Where rendered log entries end up.
#[async_trait]
pub trait ModLogSink: Send + Sync {
    async fn publish(&self, channel_id: u64, entry: &ModLogEntry) -> Result<(), String>;
}

pub struct ModLogService<S: PermissionStore> {
    permissions: Arc<PermissionService<S>>,
}

impl<S: PermissionStore> ModLogService<S> {
    pub fn new(permissions: Arc<PermissionService<S>>) -> Self {
        Self { permissions }
    }

    /// Post `entry` to the guild's log channel. Returns the channel used.
    pub async fn record<K>(&self, sink: &K, entry: &ModLogEntry) -> Result<u64, ModLogError>
    where
        K: ModLogSink + ?Sized,
    {
        let channel_id = self.permissions.log_channel(entry.guild_id).await?;
        sink.publish(channel_id, entry)
            .await
            .map_err(ModLogError::Delivery)?;

        info!(
            guild_id = entry.guild_id,
            user_id = entry.target_id,
            moderator_id = entry.moderator_id,
            action = entry.action.key(),
            "Moderator action logged"
        );
        Ok(channel_id)
    }
}
