// Authorization engine - decides whether a member may run a guarded command.
//
// Order of checks:
// 1. The command's native capability (manage roles / manage messages)
// 2. Administrator on any of the member's roles
// 3. A per-guild override granting one of the member's roles
//
// An empty override set only closes the third path; it never denies a member
// who passes one of the first two.

use super::permission_models::{Capabilities, Capability, GuardedCommand};
use super::permission_service::{PermissionError, PermissionService, PermissionStore};
use tracing::debug;

/// The member invoking a command, already resolved by the platform layer.
#[derive(Debug, Clone)]
pub struct Invoker {
    pub user_id: u64,
    pub roles: Vec<u64>,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    NativeCapability(Capability),
    Administrator,
    Override { role_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allow(AllowReason),
    /// `missing` is the native capability that would have been enough.
    Deny { missing: Capability },
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow(_))
    }
}

impl<S: PermissionStore> PermissionService<S> {
    pub async fn authorize(
        &self,
        guild_id: u64,
        invoker: &Invoker,
        command: GuardedCommand,
    ) -> Result<AuthDecision, PermissionError> {
        let guard = command.guard();

        if guard != Capability::Administrator && invoker.capabilities.has(guard) {
            return Ok(AuthDecision::Allow(AllowReason::NativeCapability(guard)));
        }

        if invoker.capabilities.administrator {
            return Ok(AuthDecision::Allow(AllowReason::Administrator));
        }

        let allowed_roles = self.roles_for(guild_id, command.scope().key()).await?;
        if let Some(role_id) = allowed_roles
            .iter()
            .copied()
            .find(|role_id| invoker.roles.contains(role_id))
        {
            debug!(
                guild_id,
                user_id = invoker.user_id,
                role_id,
                command = command.name(),
                "Allowed through override"
            );
            return Ok(AuthDecision::Allow(AllowReason::Override { role_id }));
        }

        Ok(AuthDecision::Deny { missing: guard })
    }
}
