// Discord layer - commands, event handlers and the adapters they use.

#[path = "commands/command_catalog.rs"]
pub mod commands;

pub mod auth;
pub mod embeds;
pub mod events;
pub mod gateway;
pub mod operator;
pub mod supervisor;

use crate::core::isolation::IsolationService;
use crate::core::modlog::ModLogService;
use crate::core::permissions::PermissionService;
use crate::infra::isolation::SqliteRoleStore;
use crate::infra::permissions::SqlitePermissionStore;
use operator::OperatorLink;
use std::sync::Arc;
use tracing::warn;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type Permissions = PermissionService<SqlitePermissionStore>;
pub type Isolation = IsolationService<SqliteRoleStore, SqlitePermissionStore>;
pub type ModLog = ModLogService<SqlitePermissionStore>;

/// Shared state handed to every command and event handler.
#[derive(Clone)]
pub struct Data {
    pub permissions: Arc<Permissions>,
    pub isolation: Arc<Isolation>,
    pub modlog: Arc<ModLog>,
    pub operator: Option<Arc<OperatorLink>>,
    pub dev_guild_id: Option<u64>,
}

impl Data {
    /// Report a fault to the operator channel, if one is configured.
    pub fn escalate(&self, message: impl Into<String>) {
        let message = message.into();
        match &self.operator {
            Some(operator) => operator.escalate(message),
            None => warn!("No operator channel configured; fault not escalated: {}", message),
        }
    }
}
