// Isolation domain models.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer renders them into embeds.

use thiserror::Error;

/// A guild role and its position in the hierarchy. Higher rank wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRank {
    pub id: u64,
    pub rank: u16,
}

/// The parts of a guild member the workflow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub user_id: u64,
    pub roles: Vec<u64>,
}

/// Who is isolating (or restoring) whom.
#[derive(Debug, Clone, Copy)]
pub struct IsolationRequest {
    pub guild_id: u64,
    pub issuer_id: u64,
    pub target_id: u64,
    /// The bot's own user ID; the bot never isolates itself.
    pub bot_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    Removed,
    Restored,
    /// The isolation role was taken off during a restore.
    IsolationLifted,
}

/// Outcome of a single live role mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub role_id: u64,
    pub action: RoleAction,
    pub outcome: Result<(), String>,
}

impl RoleChange {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// What an isolate / restore / rejoin actually did to the member.
#[derive(Debug, Clone)]
pub struct IsolationReport {
    pub guild_id: u64,
    pub user_id: u64,
    pub isolation_role: u64,
    pub changes: Vec<RoleChange>,
}

impl IsolationReport {
    pub fn failures(&self) -> impl Iterator<Item = &RoleChange> {
        self.changes.iter().filter(|c| !c.succeeded())
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Failure talking to the chat platform.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Not found")]
    NotFound,

    #[error("Discord API error: {0}")]
    Api(String),
}

/// How an `IsolationError` should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Guild setup is missing; tell the user how to fix it.
    Configuration,
    /// Expected refusal; tell the user why.
    Denial,
    /// Something broke; generic reply and escalate to the operator.
    Fault,
}

#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("Nice try, but I'm not isolating myself.")]
    TargetIsBot,

    #[error("Your highest role must be higher than the target user's highest role.")]
    InsufficientHierarchy,

    #[error("Isolation role not set. Please set it using /config setisolationrole.")]
    NotConfigured,

    #[error("User is already isolated.")]
    AlreadyIsolated,

    #[error("No roles found to restore. Are you sure this user was isolated using the bot?")]
    NoSavedRoles,

    #[error("User is not isolated.")]
    NotIsolated,

    #[error("User {0} is not a member of this server.")]
    MemberNotFound(u64),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Platform error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to add isolation role: {0}")]
    IsolationRoleGrant(String),
}

impl IsolationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IsolationError::NotConfigured => ErrorKind::Configuration,
            IsolationError::TargetIsBot
            | IsolationError::InsufficientHierarchy
            | IsolationError::AlreadyIsolated
            | IsolationError::NoSavedRoles
            | IsolationError::NotIsolated
            | IsolationError::MemberNotFound(_) => ErrorKind::Denial,
            IsolationError::StorageError(_)
            | IsolationError::Gateway(_)
            | IsolationError::IsolationRoleGrant(_) => ErrorKind::Fault,
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Highest rank among `member_roles`. Roles missing from `guild_roles` are
/// ignored rather than counted as rank 0.
pub fn highest_rank(member_roles: &[u64], guild_roles: &[RoleRank]) -> Option<u16> {
    member_roles
        .iter()
        .filter_map(|id| guild_roles.iter().find(|role| role.id == *id))
        .map(|role| role.rank)
        .max()
}

/// The issuer must strictly outrank the target. An issuer with no ranked role
/// never does; a target with no ranked role sits below everyone.
pub fn outranks(issuer: Option<u16>, target: Option<u16>) -> bool {
    match (issuer, target) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(issuer), Some(target)) => issuer > target,
    }
}

/// Saved role sets are stored as a comma-separated list of IDs.
pub fn encode_roles(roles: &[u64]) -> String {
    roles
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_roles(encoded: &str) -> Vec<u64> {
    encoded
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
