// Permission domain models - command overrides, guild settings and the
// native capabilities a command can be gated on.
//
// No Discord types in here. The Discord layer resolves serenity permission
// bits into `Capabilities` before calling into the core.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Command name -> roles allowed to run it, for a single guild.
///
/// Ordered collections so `viewperms` output is stable between calls.
pub type GuildOverrides = BTreeMap<String, BTreeSet<u64>>;

/// One row of the `command_permissions` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRow {
    pub guild_id: u64,
    pub command: String,
    pub role_id: u64,
}

/// Per-guild settings stored alongside the overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuildSetting {
    IsolationRole,
    LogChannel,
}

impl GuildSetting {
    /// Value of the `setting_name` column.
    pub fn key(&self) -> &'static str {
        match self {
            GuildSetting::IsolationRole => "isolation_role",
            GuildSetting::LogChannel => "log_channel",
        }
    }

    /// The command an admin runs to configure this setting.
    pub fn config_command(&self) -> &'static str {
        match self {
            GuildSetting::IsolationRole => "/config setisolationrole",
            GuildSetting::LogChannel => "/config setlogchannel",
        }
    }
}

impl fmt::Display for GuildSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuildSetting::IsolationRole => write!(f, "Isolation role"),
            GuildSetting::LogChannel => write!(f, "Log channel"),
        }
    }
}

/// Platform-native capability a command can be gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageRoles,
    ManageMessages,
    Administrator,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::ManageRoles => write!(f, "Manage Roles"),
            Capability::ManageMessages => write!(f, "Manage Messages"),
            Capability::Administrator => write!(f, "Administrator"),
        }
    }
}

/// Capability bits held by the acting member.
///
/// `manage_roles` / `manage_messages` come from the member's resolved
/// permissions in the invoking channel; `administrator` is true when any of
/// the member's roles carries the administrator bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub manage_roles: bool,
    pub manage_messages: bool,
    pub administrator: bool,
}

impl Capabilities {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageRoles => self.manage_roles,
            Capability::ManageMessages => self.manage_messages,
            Capability::Administrator => self.administrator,
        }
    }
}

/// Name under which overrides are stored. Related commands share one scope
/// so granting `isolate` also lets a role `restore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideScope {
    Isolation,
    Config,
    ModLog,
}

impl OverrideScope {
    pub const ALL: [OverrideScope; 3] = [
        OverrideScope::Isolation,
        OverrideScope::Config,
        OverrideScope::ModLog,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            OverrideScope::Isolation => "isolate",
            OverrideScope::Config => "config",
            OverrideScope::ModLog => "log",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.key() == key)
    }
}

/// Commands that go through the authorization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardedCommand {
    Isolate,
    Restore,
    Config,
    Log,
    ExternalLog,
}

impl GuardedCommand {
    pub fn name(&self) -> &'static str {
        match self {
            GuardedCommand::Isolate => "isolate",
            GuardedCommand::Restore => "restore",
            GuardedCommand::Config => "config",
            GuardedCommand::Log => "log",
            GuardedCommand::ExternalLog => "elog",
        }
    }

    /// The native capability that lets a member run this command outright.
    pub fn guard(&self) -> Capability {
        match self {
            GuardedCommand::Isolate | GuardedCommand::Restore => Capability::ManageRoles,
            GuardedCommand::Config => Capability::Administrator,
            GuardedCommand::Log | GuardedCommand::ExternalLog => Capability::ManageMessages,
        }
    }

    pub fn scope(&self) -> OverrideScope {
        match self {
            GuardedCommand::Isolate | GuardedCommand::Restore => OverrideScope::Isolation,
            GuardedCommand::Config => OverrideScope::Config,
            GuardedCommand::Log | GuardedCommand::ExternalLog => OverrideScope::ModLog,
        }
    }
}
