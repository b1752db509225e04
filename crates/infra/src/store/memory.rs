//! In-memory stores for tests and local development.
//!
//! One `RwLock` guards principals and the policy tables together, so a role
//! deletion and the removal of its assignments happen under one write lock,
//! and a rule snapshot is taken under one read lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_auth::{
    Email, Grants, GrantsPatch, PermissionRule, PolicyTable, Principal, Profile, ResourceType,
    ResourceTypeName, Role, RoleName, RuleSnapshot,
};
use warden_core::{OwnedResource, PrincipalId, ResourceTypeId, RoleId, RuleId};

use super::{
    IdentityStore, OwnedStore, Page, Paged, PolicyStore, PrincipalCredentials, StoreError,
    StoreResult,
};

#[derive(Debug, Default)]
struct State {
    principals: BTreeMap<PrincipalId, PrincipalCredentials>,
    emails: HashMap<Email, PrincipalId>,
    policy: PolicyTable,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| poisoned())
    }

    fn modify_principal(
        &self,
        id: PrincipalId,
        f: impl FnOnce(&mut Principal) -> StoreResult<()>,
    ) -> StoreResult<Principal> {
        let mut state = self.write()?;
        let entry = state.principals.get_mut(&id).ok_or(StoreError::NotFound)?;
        f(&mut entry.principal)?;
        Ok(entry.principal.clone())
    }
}

fn poisoned() -> StoreError {
    StoreError::Unexpected(anyhow::anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn create_principal(&self, principal: Principal, password_hash: String) -> StoreResult<Principal> {
        let mut state = self.write()?;
        if state.emails.contains_key(&principal.email) {
            return Err(StoreError::Conflict(format!(
                "a user with email '{}' already exists",
                principal.email
            )));
        }
        if let Some(missing) = principal.roles.iter().find(|r| state.policy.role(**r).is_none()) {
            return Err(StoreError::Validation(format!("role {missing} does not exist")));
        }
        state.emails.insert(principal.email.clone(), principal.id);
        state.principals.insert(
            principal.id,
            PrincipalCredentials {
                principal: principal.clone(),
                password_hash,
            },
        );
        Ok(principal)
    }

    async fn get_principal(&self, id: PrincipalId) -> StoreResult<Principal> {
        let state = self.read()?;
        state
            .principals
            .get(&id)
            .map(|c| c.principal.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_credentials(&self, email: &Email) -> StoreResult<Option<PrincipalCredentials>> {
        let state = self.read()?;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.principals.get(id))
            .cloned())
    }

    async fn list_principals(&self) -> StoreResult<Vec<Principal>> {
        let state = self.read()?;
        Ok(state.principals.values().map(|c| c.principal.clone()).collect())
    }

    async fn update_profile(&self, id: PrincipalId, profile: Profile) -> StoreResult<Principal> {
        self.modify_principal(id, |p| {
            p.profile = profile;
            Ok(())
        })
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<Principal> {
        self.modify_principal(id, |p| {
            if active {
                p.activate();
            } else {
                p.deactivate();
            }
            Ok(())
        })
    }

    async fn assign_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal> {
        let mut state = self.write()?;
        if state.policy.role(role).is_none() {
            return Err(StoreError::Validation(format!("role {role} does not exist")));
        }
        let entry = state.principals.get_mut(&id).ok_or(StoreError::NotFound)?;
        entry.principal.assign_role(role);
        Ok(entry.principal.clone())
    }

    async fn revoke_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal> {
        self.modify_principal(id, |p| {
            p.revoke_role(role);
            Ok(())
        })
    }
}

#[async_trait]
impl PolicyStore for InMemoryStore {
    async fn create_role(&self, name: RoleName) -> StoreResult<Role> {
        Ok(self.write()?.policy.create_role(name)?)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(self.read()?.policy.roles().cloned().collect())
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<Role> {
        self.read()?.policy.role(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_role(&self, name: &RoleName) -> StoreResult<Option<Role>> {
        Ok(self.read()?.policy.role_by_name(name).cloned())
    }

    async fn rename_role(&self, id: RoleId, name: RoleName) -> StoreResult<Role> {
        Ok(self.write()?.policy.rename_role(id, name)?)
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.policy.remove_role(id).ok_or(StoreError::NotFound)?;
        for entry in state.principals.values_mut() {
            entry.principal.revoke_role(id);
        }
        Ok(())
    }

    async fn register_resource_type(&self, name: ResourceTypeName) -> StoreResult<ResourceType> {
        Ok(self.write()?.policy.register_resource_type(name)?)
    }

    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>> {
        Ok(self.read()?.policy.resource_types().cloned().collect())
    }

    async fn get_resource_type(&self, id: ResourceTypeId) -> StoreResult<ResourceType> {
        self.read()?
            .policy
            .resource_type(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_resource_type(&self, name: &ResourceTypeName) -> StoreResult<Option<ResourceType>> {
        Ok(self.read()?.policy.resource_type_by_name(name).cloned())
    }

    async fn delete_resource_type(&self, id: ResourceTypeId) -> StoreResult<()> {
        self.write()?
            .policy
            .remove_resource_type(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn create_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule> {
        Ok(self.write()?.policy.create_rule(role, resource_type, grants)?)
    }

    async fn upsert_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule> {
        let (rule, _created) = self.write()?.policy.upsert_rule(role, resource_type, grants)?;
        Ok(rule)
    }

    async fn update_rule(&self, id: RuleId, patch: GrantsPatch) -> StoreResult<PermissionRule> {
        Ok(self.write()?.policy.update_rule(id, &patch)?)
    }

    async fn get_rule(&self, id: RuleId) -> StoreResult<PermissionRule> {
        self.read()?.policy.rule(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list_rules(&self) -> StoreResult<Vec<PermissionRule>> {
        Ok(self.read()?.policy.rules().cloned().collect())
    }

    async fn delete_rule(&self, id: RuleId) -> StoreResult<()> {
        self.write()?
            .policy
            .remove_rule(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn rule_snapshot(
        &self,
        roles: &BTreeSet<RoleId>,
        resource_type: &ResourceTypeName,
    ) -> StoreResult<RuleSnapshot> {
        Ok(self.read()?.policy.snapshot_for(roles, resource_type))
    }
}

/// In-memory rows of one owned resource type, ordered by id (creation order).
#[derive(Debug)]
pub struct InMemoryOwnedStore<R: OwnedResource> {
    rows: RwLock<BTreeMap<R::Id, R>>,
}

impl<R: OwnedResource> InMemoryOwnedStore<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<R: OwnedResource> Default for InMemoryOwnedStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: OwnedResource> OwnedStore<R> for InMemoryOwnedStore<R> {
    async fn insert(&self, row: R) -> StoreResult<R> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.contains_key(&row.id()) {
            return Err(StoreError::Conflict(format!("row {} already exists", row.id())));
        }
        rows.insert(row.id(), row.clone());
        Ok(row)
    }

    async fn list_by_owner(&self, owner: PrincipalId, page: Page) -> StoreResult<Paged<R>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let owned: Vec<&R> = rows.values().filter(|r| r.is_owned_by(owner)).collect();
        let results = owned
            .iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .map(|r| (*r).clone())
            .collect();
        Ok(Paged {
            count: owned.len() as u64,
            page: page.number,
            page_size: page.size,
            results,
        })
    }

    async fn get_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<Option<R>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&id).filter(|r| r.is_owned_by(owner)).cloned())
    }

    async fn update_owned(&self, owner: PrincipalId, id: R::Id, patch: R::Patch) -> StoreResult<Option<R>> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let Some(row) = rows.get_mut(&id).filter(|r| r.is_owned_by(owner)) else {
            return Ok(None);
        };
        let mut updated = row.clone();
        updated.apply_patch(patch)?;
        *row = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<bool> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.get(&id).is_some_and(|r| r.is_owned_by(owner)) {
            rows.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
