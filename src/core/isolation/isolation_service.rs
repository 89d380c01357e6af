// Isolation service - strip a member's roles and give them back later.
//
// This service handles:
// - isolate: save roles, remove them, grant the isolation role
// - restore: lift the isolation role, re-add saved roles, drop the record
// - rejoin: re-isolate a member who left and came back while isolated
//
// Roles are always written to storage before the first live mutation. If an
// isolate stops part way through, running it again picks up the saved record.
// Operations on the same (user, guild) are serialized by an advisory lock.

use super::isolation_models::{
    highest_rank, outranks, GatewayError, IsolationError, IsolationReport, IsolationRequest,
    MemberSnapshot, RoleAction, RoleChange, RoleRank,
};
use crate::core::permissions::{PermissionError, PermissionService, PermissionStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

// ============================================================================
// PORTS
// ============================================================================

/// Persistence for saved role sets. A record existing means the user is
/// isolated by the bot in that guild.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Insert or overwrite the saved roles for a member.
    async fn save_roles(
        &self,
        user_id: u64,
        guild_id: u64,
        roles: &[u64],
    ) -> Result<(), IsolationError>;

    async fn saved_roles(
        &self,
        user_id: u64,
        guild_id: u64,
    ) -> Result<Option<Vec<u64>>, IsolationError>;

    async fn delete_roles(&self, user_id: u64, guild_id: u64) -> Result<(), IsolationError>;
}

/// Live role operations on the chat platform.
#[async_trait]
pub trait MemberGateway: Send + Sync {
    /// `Ok(None)` when the user is not in the guild.
    async fn member(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<MemberSnapshot>, GatewayError>;

    async fn guild_roles(&self, guild_id: u64) -> Result<Vec<RoleRank>, GatewayError>;

    async fn add_role(&self, guild_id: u64, user_id: u64, role_id: u64)
        -> Result<(), GatewayError>;

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
    ) -> Result<(), GatewayError>;
}

impl From<PermissionError> for IsolationError {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::NotConfigured(_) => IsolationError::NotConfigured,
            other => IsolationError::StorageError(other.to_string()),
        }
    }
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct IsolationService<R: RoleStore, S: PermissionStore> {
    store: R,
    permissions: Arc<PermissionService<S>>,
    // (user_id, guild_id) -> advisory lock
    member_locks: DashMap<(u64, u64), Arc<Mutex<()>>>,
}

impl<R: RoleStore, S: PermissionStore> IsolationService<R, S> {
    pub fn new(store: R, permissions: Arc<PermissionService<S>>) -> Self {
        Self {
            store,
            permissions,
            member_locks: DashMap::new(),
        }
    }

    /// Strip the target's roles and grant the guild's isolation role.
    ///
    /// Per-role removal failures are recorded in the report and don't stop
    /// the loop. Failing to grant the isolation role is a hard error; the
    /// saved record survives and the next isolate resumes from it.
    pub async fn isolate<G>(
        &self,
        gateway: &G,
        request: &IsolationRequest,
    ) -> Result<IsolationReport, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        let lock = self.member_lock(request.target_id, request.guild_id);
        let guard = lock.lock().await;
        let result = self.isolate_locked(gateway, request).await;
        drop(guard);
        drop(lock);
        self.release_member_lock(request.target_id, request.guild_id);
        result
    }

    /// Undo an isolation: lift the isolation role, re-add saved roles, then
    /// delete the saved record whatever happened to individual roles.
    pub async fn restore<G>(
        &self,
        gateway: &G,
        request: &IsolationRequest,
    ) -> Result<IsolationReport, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        let lock = self.member_lock(request.target_id, request.guild_id);
        let guard = lock.lock().await;
        let result = self.restore_locked(gateway, request).await;
        drop(guard);
        drop(lock);
        self.release_member_lock(request.target_id, request.guild_id);
        result
    }

    /// Re-isolate a member who rejoined while a saved role set exists.
    ///
    /// Returns `Ok(None)` when the member isn't isolated. The saved record is
    /// left as it was; the roles they had before isolation are still in it.
    pub async fn reapply_on_join<G>(
        &self,
        gateway: &G,
        guild_id: u64,
        user_id: u64,
        joined_roles: &[u64],
    ) -> Result<Option<IsolationReport>, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        let lock = self.member_lock(user_id, guild_id);
        let guard = lock.lock().await;
        let result = self
            .reapply_locked(gateway, guild_id, user_id, joined_roles)
            .await;
        drop(guard);
        drop(lock);
        self.release_member_lock(user_id, guild_id);
        result
    }

    #[cfg(test)]
    async fn is_isolated(&self, user_id: u64, guild_id: u64) -> Result<bool, IsolationError> {
        Ok(self.store.saved_roles(user_id, guild_id).await?.is_some())
    }

    async fn isolate_locked<G>(
        &self,
        gateway: &G,
        request: &IsolationRequest,
    ) -> Result<IsolationReport, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        let target = self.check_hierarchy(gateway, request).await?;
        let guild_id = request.guild_id;
        let target_id = request.target_id;

        let isolation_role = self.permissions.isolation_role(guild_id).await?;
        if target.roles.contains(&isolation_role) {
            return Err(IsolationError::AlreadyIsolated);
        }

        let current: Vec<u64> = target
            .roles
            .iter()
            .copied()
            .filter(|role_id| *role_id != isolation_role)
            .collect();

        // A record without the isolation role means an earlier isolate stopped
        // before the grant. Its roles are already stripped, so keep them.
        let captured = match self.store.saved_roles(target_id, guild_id).await? {
            Some(saved) => {
                warn!(
                    guild_id,
                    user_id = target_id,
                    saved = saved.len(),
                    "Resuming interrupted isolation"
                );
                merge_roles(saved, &current)
            }
            None => current.clone(),
        };
        self.store.save_roles(target_id, guild_id, &captured).await?;
        info!(
            guild_id,
            user_id = target_id,
            issuer_id = request.issuer_id,
            roles = captured.len(),
            "Saved roles before isolation"
        );

        let mut changes = Vec::with_capacity(current.len());
        for role_id in current {
            let outcome = gateway
                .remove_role(guild_id, target_id, role_id)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!(guild_id, user_id = target_id, role_id, "Failed to remove role: {}", e);
            }
            changes.push(RoleChange {
                role_id,
                action: RoleAction::Removed,
                outcome,
            });
        }

        gateway
            .add_role(guild_id, target_id, isolation_role)
            .await
            .map_err(|e| IsolationError::IsolationRoleGrant(e.to_string()))?;
        info!(guild_id, user_id = target_id, "User isolated");

        Ok(IsolationReport {
            guild_id,
            user_id: target_id,
            isolation_role,
            changes,
        })
    }

    async fn restore_locked<G>(
        &self,
        gateway: &G,
        request: &IsolationRequest,
    ) -> Result<IsolationReport, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        let target = self.check_hierarchy(gateway, request).await?;
        let guild_id = request.guild_id;
        let target_id = request.target_id;

        let saved = self
            .store
            .saved_roles(target_id, guild_id)
            .await?
            .ok_or(IsolationError::NoSavedRoles)?;

        let isolation_role = self.permissions.isolation_role(guild_id).await?;
        if !target.roles.contains(&isolation_role) {
            return Err(IsolationError::NotIsolated);
        }

        let mut changes = Vec::with_capacity(saved.len() + 1);

        let lifted = gateway
            .remove_role(guild_id, target_id, isolation_role)
            .await
            .map_err(|e| e.to_string());
        if let Err(e) = &lifted {
            warn!(guild_id, user_id = target_id, "Failed to remove isolation role: {}", e);
        }
        changes.push(RoleChange {
            role_id: isolation_role,
            action: RoleAction::IsolationLifted,
            outcome: lifted,
        });

        for role_id in saved.into_iter().filter(|id| *id != isolation_role) {
            let outcome = gateway
                .add_role(guild_id, target_id, role_id)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!(guild_id, user_id = target_id, role_id, "Failed to restore role: {}", e);
            }
            changes.push(RoleChange {
                role_id,
                action: RoleAction::Restored,
                outcome,
            });
        }

        self.store.delete_roles(target_id, guild_id).await?;
        info!(
            guild_id,
            user_id = target_id,
            issuer_id = request.issuer_id,
            "User restored"
        );

        Ok(IsolationReport {
            guild_id,
            user_id: target_id,
            isolation_role,
            changes,
        })
    }

    async fn reapply_locked<G>(
        &self,
        gateway: &G,
        guild_id: u64,
        user_id: u64,
        joined_roles: &[u64],
    ) -> Result<Option<IsolationReport>, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        if self.store.saved_roles(user_id, guild_id).await?.is_none() {
            return Ok(None);
        }

        let isolation_role = self.permissions.isolation_role(guild_id).await?;

        let mut changes = Vec::new();
        for role_id in joined_roles.iter().copied().filter(|id| *id != isolation_role) {
            let outcome = gateway
                .remove_role(guild_id, user_id, role_id)
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!(guild_id, user_id, role_id, "Failed to remove role on rejoin: {}", e);
            }
            changes.push(RoleChange {
                role_id,
                action: RoleAction::Removed,
                outcome,
            });
        }

        if !joined_roles.contains(&isolation_role) {
            gateway
                .add_role(guild_id, user_id, isolation_role)
                .await
                .map_err(|e| IsolationError::IsolationRoleGrant(e.to_string()))?;
        }
        info!(guild_id, user_id, "Re-isolated member on rejoin");

        Ok(Some(IsolationReport {
            guild_id,
            user_id,
            isolation_role,
            changes,
        }))
    }

    /// Self-target and rank guards shared by isolate and restore. Returns the
    /// target so callers don't fetch it twice.
    async fn check_hierarchy<G>(
        &self,
        gateway: &G,
        request: &IsolationRequest,
    ) -> Result<MemberSnapshot, IsolationError>
    where
        G: MemberGateway + ?Sized,
    {
        if request.target_id == request.bot_id {
            return Err(IsolationError::TargetIsBot);
        }

        let guild_roles = gateway.guild_roles(request.guild_id).await?;
        let issuer = fetch_member(gateway, request.guild_id, request.issuer_id).await?;
        let target = fetch_member(gateway, request.guild_id, request.target_id).await?;

        let issuer_rank = highest_rank(&issuer.roles, &guild_roles);
        let target_rank = highest_rank(&target.roles, &guild_roles);
        if !outranks(issuer_rank, target_rank) {
            return Err(IsolationError::InsufficientHierarchy);
        }

        Ok(target)
    }

    fn member_lock(&self, user_id: u64, guild_id: u64) -> Arc<Mutex<()>> {
        Arc::clone(self.member_locks.entry((user_id, guild_id)).or_default().value())
    }

    /// Drop the lock entry once nobody else is holding or waiting on it.
    fn release_member_lock(&self, user_id: u64, guild_id: u64) {
        self.member_locks
            .remove_if(&(user_id, guild_id), |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Saved roles first, in their saved order, then any the member picked up since.
fn merge_roles(mut saved: Vec<u64>, current: &[u64]) -> Vec<u64> {
    for role_id in current {
        if !saved.contains(role_id) {
            saved.push(*role_id);
        }
    }
    saved
}

async fn fetch_member<G>(
    gateway: &G,
    guild_id: u64,
    user_id: u64,
) -> Result<MemberSnapshot, IsolationError>
where
    G: MemberGateway + ?Sized,
{
    match gateway.member(guild_id, user_id).await {
        Ok(Some(member)) => Ok(member),
        Ok(None) | Err(GatewayError::NotFound) => Err(IsolationError::MemberNotFound(user_id)),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permissions::permission_service::tests::MockPermissionStore;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;

    const GUILD: u64 = 1;
    const BOT: u64 = 900;
    const ISSUER: u64 = 10;
    const TARGET: u64 = 20;

    const MOD_ROLE: u64 = 100; // rank 10
    const ROLE_A: u64 = 31; // rank 3
    const ROLE_B: u64 = 32; // rank 2
    const ISOLATION: u64 = 50; // rank 1

    /// In-memory saved role store for testing
    #[derive(Default)]
    struct MockRoleStore {
        records: DashMap<(u64, u64), Vec<u64>>,
    }

    #[async_trait]
    impl RoleStore for MockRoleStore {
        async fn save_roles(
            &self,
            user_id: u64,
            guild_id: u64,
            roles: &[u64],
        ) -> Result<(), IsolationError> {
            self.records.insert((user_id, guild_id), roles.to_vec());
            Ok(())
        }

        async fn saved_roles(
            &self,
            user_id: u64,
            guild_id: u64,
        ) -> Result<Option<Vec<u64>>, IsolationError> {
            Ok(self.records.get(&(user_id, guild_id)).map(|r| r.clone()))
        }

        async fn delete_roles(&self, user_id: u64, guild_id: u64) -> Result<(), IsolationError> {
            self.records.remove(&(user_id, guild_id));
            Ok(())
        }
    }

    /// Fake guild with a member list and roles that can be made to fail.
    struct MockGateway {
        members: StdMutex<HashMap<u64, Vec<u64>>>,
        ranks: Vec<RoleRank>,
        failing_roles: HashSet<u64>,
    }

    impl MockGateway {
        fn new() -> Self {
            let mut members = HashMap::new();
            members.insert(ISSUER, vec![MOD_ROLE]);
            members.insert(TARGET, vec![ROLE_A, ROLE_B]);
            members.insert(BOT, vec![]);
            Self {
                members: StdMutex::new(members),
                ranks: vec![
                    RoleRank { id: MOD_ROLE, rank: 10 },
                    RoleRank { id: ROLE_A, rank: 3 },
                    RoleRank { id: ROLE_B, rank: 2 },
                    RoleRank { id: ISOLATION, rank: 1 },
                ],
                failing_roles: HashSet::new(),
            }
        }

        fn failing(mut self, role_id: u64) -> Self {
            self.failing_roles.insert(role_id);
            self
        }

        fn roles_of(&self, user_id: u64) -> Vec<u64> {
            self.members.lock().unwrap().get(&user_id).cloned().unwrap_or_default()
        }

        fn set_roles(&self, user_id: u64, roles: Vec<u64>) {
            self.members.lock().unwrap().insert(user_id, roles);
        }
    }

    #[async_trait]
    impl MemberGateway for MockGateway {
        async fn member(
            &self,
            _guild_id: u64,
            user_id: u64,
        ) -> Result<Option<MemberSnapshot>, GatewayError> {
            Ok(self
                .members
                .lock()
                .unwrap()
                .get(&user_id)
                .map(|roles| MemberSnapshot {
                    user_id,
                    roles: roles.clone(),
                }))
        }

        async fn guild_roles(&self, _guild_id: u64) -> Result<Vec<RoleRank>, GatewayError> {
            Ok(self.ranks.clone())
        }

        async fn add_role(
            &self,
            _guild_id: u64,
            user_id: u64,
            role_id: u64,
        ) -> Result<(), GatewayError> {
            // Give other tasks a chance to run, like a real HTTP call would.
            tokio::task::yield_now().await;
            if self.failing_roles.contains(&role_id) {
                return Err(GatewayError::Api("Missing Permissions".into()));
            }
            let mut members = self.members.lock().unwrap();
            let roles = members.entry(user_id).or_default();
            if !roles.contains(&role_id) {
                roles.push(role_id);
            }
            Ok(())
        }

        async fn remove_role(
            &self,
            _guild_id: u64,
            user_id: u64,
            role_id: u64,
        ) -> Result<(), GatewayError> {
            tokio::task::yield_now().await;
            if self.failing_roles.contains(&role_id) {
                return Err(GatewayError::Api("Missing Permissions".into()));
            }
            if let Some(roles) = self.members.lock().unwrap().get_mut(&user_id) {
                roles.retain(|r| *r != role_id);
            }
            Ok(())
        }
    }

    fn request() -> IsolationRequest {
        IsolationRequest {
            guild_id: GUILD,
            issuer_id: ISSUER,
            target_id: TARGET,
            bot_id: BOT,
        }
    }

    async fn configured_service() -> IsolationService<MockRoleStore, MockPermissionStore> {
        let permissions = Arc::new(PermissionService::new(MockPermissionStore::new()));
        permissions.set_isolation_role(GUILD, ISOLATION).await.unwrap();
        IsolationService::new(MockRoleStore::default(), permissions)
    }

    #[tokio::test]
    async fn test_isolate_then_restore_round_trip() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        let report = service.isolate(&gateway, &request()).await.unwrap();
        assert_eq!(gateway.roles_of(TARGET), vec![ISOLATION]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
        let removed: Vec<_> = report.changes.iter().map(|c| (c.role_id, c.action)).collect();
        assert_eq!(
            removed,
            vec![(ROLE_A, RoleAction::Removed), (ROLE_B, RoleAction::Removed)]
        );

        let report = service.restore(&gateway, &request()).await.unwrap();
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
        assert!(!service.is_isolated(TARGET, GUILD).await.unwrap());
        let restored: Vec<_> = report
            .changes
            .iter()
            .filter(|c| c.action == RoleAction::Restored)
            .map(|c| c.role_id)
            .collect();
        assert_eq!(restored, vec![ROLE_A, ROLE_B]);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn test_isolate_without_isolation_role_changes_nothing() {
        let permissions = Arc::new(PermissionService::new(MockPermissionStore::new()));
        let service = IsolationService::new(MockRoleStore::default(), permissions);
        let gateway = MockGateway::new();

        let result = service.isolate(&gateway, &request()).await;

        assert!(matches!(result, Err(IsolationError::NotConfigured)));
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
        assert!(!service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_isolate_is_denied_and_keeps_saved_roles() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        service.isolate(&gateway, &request()).await.unwrap();
        let result = service.isolate(&gateway, &request()).await;

        assert!(matches!(result, Err(IsolationError::AlreadyIsolated)));
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
    }

    #[tokio::test]
    async fn test_equal_rank_cannot_isolate() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        gateway.set_roles(ISSUER, vec![ROLE_A]);

        let result = service.isolate(&gateway, &request()).await;
        assert!(matches!(result, Err(IsolationError::InsufficientHierarchy)));
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
    }

    #[tokio::test]
    async fn test_issuer_without_roles_cannot_isolate_roleless_target() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        gateway.set_roles(ISSUER, vec![]);
        gateway.set_roles(TARGET, vec![]);

        let result = service.isolate(&gateway, &request()).await;
        assert!(matches!(result, Err(IsolationError::InsufficientHierarchy)));
    }

    #[tokio::test]
    async fn test_bot_cannot_be_isolated() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        let request = IsolationRequest {
            target_id: BOT,
            ..request()
        };

        assert!(matches!(
            service.isolate(&gateway, &request).await,
            Err(IsolationError::TargetIsBot)
        ));
        assert!(matches!(
            service.restore(&gateway, &request).await,
            Err(IsolationError::TargetIsBot)
        ));
    }

    #[tokio::test]
    async fn test_unknown_target_is_member_not_found() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        let request = IsolationRequest {
            target_id: 12345,
            ..request()
        };

        let result = service.isolate(&gateway, &request).await;
        assert!(matches!(result, Err(IsolationError::MemberNotFound(12345))));
    }

    #[tokio::test]
    async fn test_failed_role_removal_is_reported_not_fatal() {
        let service = configured_service().await;
        let gateway = MockGateway::new().failing(ROLE_B);

        let report = service.isolate(&gateway, &request()).await.unwrap();

        let failures: Vec<_> = report.failures().map(|c| c.role_id).collect();
        assert_eq!(failures, vec![ROLE_B]);
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_B, ISOLATION]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
    }

    #[tokio::test]
    async fn test_isolation_role_grant_failure_is_hard_error_after_saving() {
        let service = configured_service().await;
        let gateway = MockGateway::new().failing(ISOLATION);

        let result = service.isolate(&gateway, &request()).await;

        assert!(matches!(result, Err(IsolationError::IsolationRoleGrant(_))));
        assert!(service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_without_record_is_denied() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        let result = service.restore(&gateway, &request()).await;
        assert!(matches!(result, Err(IsolationError::NoSavedRoles)));
    }

    #[tokio::test]
    async fn test_restore_with_stale_record_is_not_isolated() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        service.store.save_roles(TARGET, GUILD, &[ROLE_A]).await.unwrap();

        let result = service.restore(&gateway, &request()).await;

        assert!(matches!(result, Err(IsolationError::NotIsolated)));
        assert!(service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_commits_even_when_a_role_fails() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        service.isolate(&gateway, &request()).await.unwrap();

        let gateway = MockGateway {
            failing_roles: HashSet::from([ROLE_A]),
            ..gateway
        };
        let report = service.restore(&gateway, &request()).await.unwrap();

        let failures: Vec<_> = report.failures().map(|c| c.role_id).collect();
        assert_eq!(failures, vec![ROLE_A]);
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_B]);
        assert!(!service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejoin_reapplies_isolation() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        service.isolate(&gateway, &request()).await.unwrap();

        // Left and came back with an auto-assigned role.
        gateway.set_roles(TARGET, vec![ROLE_B]);
        let report = service
            .reapply_on_join(&gateway, GUILD, TARGET, &[ROLE_B])
            .await
            .unwrap()
            .expect("member should be re-isolated");

        assert_eq!(report.changes.len(), 1);
        assert_eq!(gateway.roles_of(TARGET), vec![ISOLATION]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
    }

    #[tokio::test]
    async fn test_rejoin_of_normal_member_does_nothing() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        let result = service
            .reapply_on_join(&gateway, GUILD, TARGET, &[ROLE_A])
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
    }

    #[tokio::test]
    async fn test_member_locks_are_released() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        service.isolate(&gateway, &request()).await.unwrap();
        service.restore(&gateway, &request()).await.unwrap();

        assert!(service.member_locks.is_empty());
    }

    #[tokio::test]
    async fn test_isolate_after_failed_grant_resumes_and_restore_returns_roles() {
        let service = configured_service().await;
        let gateway = MockGateway::new().failing(ISOLATION);

        let result = service.isolate(&gateway, &request()).await;
        assert!(matches!(result, Err(IsolationError::IsolationRoleGrant(_))));
        assert!(gateway.roles_of(TARGET).is_empty());

        // Restore can't run without the isolation role; isolating again must
        // finish the job without losing the saved roles.
        let gateway = MockGateway {
            failing_roles: HashSet::new(),
            ..gateway
        };
        assert!(matches!(
            service.restore(&gateway, &request()).await,
            Err(IsolationError::NotIsolated)
        ));

        let report = service.isolate(&gateway, &request()).await.unwrap();
        assert!(report.changes.is_empty());
        assert_eq!(gateway.roles_of(TARGET), vec![ISOLATION]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );

        service.restore(&gateway, &request()).await.unwrap();
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
        assert!(!service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_resumed_isolation_keeps_roles_gained_in_between() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        service.store.save_roles(TARGET, GUILD, &[ROLE_A]).await.unwrap();
        gateway.set_roles(TARGET, vec![ROLE_B]);

        let report = service.isolate(&gateway, &request()).await.unwrap();

        let removed: Vec<_> = report.changes.iter().map(|c| c.role_id).collect();
        assert_eq!(removed, vec![ROLE_B]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
    }

    #[test]
    fn test_merge_roles_keeps_saved_order() {
        assert_eq!(merge_roles(vec![32, 31], &[31, 40]), vec![32, 31, 40]);
        assert_eq!(merge_roles(vec![], &[31]), vec![31]);
    }

    #[tokio::test]
    async fn test_concurrent_isolates_run_one_at_a_time() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        let (req_first, req_second) = (request(), request());
        let (first, second) = tokio::join!(
            service.isolate(&gateway, &req_first),
            service.isolate(&gateway, &req_second)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(IsolationError::AlreadyIsolated))));
        assert_eq!(gateway.roles_of(TARGET), vec![ISOLATION]);
        assert_eq!(
            service.store.saved_roles(TARGET, GUILD).await.unwrap(),
            Some(vec![ROLE_A, ROLE_B])
        );
        assert!(service.member_locks.is_empty());
    }

    #[tokio::test]
    async fn test_restore_waits_for_running_isolate() {
        let service = configured_service().await;
        let gateway = MockGateway::new();

        let (req_isolate, req_restore) = (request(), request());
        let (isolated, restored) = tokio::join!(
            service.isolate(&gateway, &req_isolate),
            service.restore(&gateway, &req_restore)
        );

        assert!(isolated.is_ok());
        let restored = restored.unwrap();
        assert_eq!(restored.failures().count(), 0);
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_A, ROLE_B]);
        assert!(!service.is_isolated(TARGET, GUILD).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejoin_logs_and_reports_failed_removal() {
        let service = configured_service().await;
        let gateway = MockGateway::new();
        service.isolate(&gateway, &request()).await.unwrap();

        let gateway = MockGateway {
            failing_roles: HashSet::from([ROLE_B]),
            ..gateway
        };
        gateway.set_roles(TARGET, vec![ROLE_B]);
        let report = service
            .reapply_on_join(&gateway, GUILD, TARGET, &[ROLE_B])
            .await
            .unwrap()
            .expect("member should be re-isolated");

        let failures: Vec<_> = report.failures().map(|c| c.role_id).collect();
        assert_eq!(failures, vec![ROLE_B]);
        assert_eq!(gateway.roles_of(TARGET), vec![ROLE_B, ISOLATION]);
    }
}
