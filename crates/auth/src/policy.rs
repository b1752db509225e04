//! In-memory permission rule table: roles, resource types and the
//! (role, resource type) → grants mapping, with the same cascade and
//! uniqueness rules as the relational schema.

use std::collections::{BTreeMap, HashMap};

use warden_core::{DomainError, DomainResult, ResourceTypeId, RoleId, RuleId};

use crate::{
    Grants, GrantsPatch, PermissionRule, ResourceType, ResourceTypeName, Role, RoleName,
    RuleSnapshot, RuleSource,
};

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    roles: BTreeMap<RoleId, Role>,
    role_names: HashMap<RoleName, RoleId>,
    resource_types: BTreeMap<ResourceTypeId, ResourceType>,
    resource_names: HashMap<ResourceTypeName, ResourceTypeId>,
    rules: BTreeMap<RuleId, PermissionRule>,
    rule_index: HashMap<(RoleId, ResourceTypeId), RuleId>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_role(&mut self, name: RoleName) -> DomainResult<Role> {
        if self.role_names.contains_key(&name) {
            return Err(DomainError::conflict(format!("role '{name}' already exists")));
        }
        let role = Role {
            id: RoleId::new(),
            name,
        };
        self.role_names.insert(role.name.clone(), role.id);
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    pub fn rename_role(&mut self, id: RoleId, name: RoleName) -> DomainResult<Role> {
        if let Some(existing) = self.role_names.get(&name) {
            if *existing != id {
                return Err(DomainError::conflict(format!("role '{name}' already exists")));
            }
        }
        let role = self.roles.get_mut(&id).ok_or(DomainError::NotFound)?;
        self.role_names.remove(&role.name);
        role.name = name;
        self.role_names.insert(role.name.clone(), id);
        Ok(role.clone())
    }

    /// Remove a role and every rule attached to it.
    pub fn remove_role(&mut self, id: RoleId) -> Option<Role> {
        let role = self.roles.remove(&id)?;
        self.role_names.remove(&role.name);
        self.remove_rules_where(|r| r.role_id == id);
        Some(role)
    }

    pub fn role(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(&id)
    }

    pub fn role_by_name(&self, name: &RoleName) -> Option<&Role> {
        self.role_names.get(name).and_then(|id| self.roles.get(id))
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resource types
    // ─────────────────────────────────────────────────────────────────────────

    pub fn register_resource_type(&mut self, name: ResourceTypeName) -> DomainResult<ResourceType> {
        if self.resource_names.contains_key(&name) {
            return Err(DomainError::conflict(format!(
                "resource type '{name}' is already registered"
            )));
        }
        let rt = ResourceType {
            id: ResourceTypeId::new(),
            name,
        };
        self.resource_names.insert(rt.name.clone(), rt.id);
        self.resource_types.insert(rt.id, rt.clone());
        Ok(rt)
    }

    /// Remove a resource type and every rule that refers to it.
    pub fn remove_resource_type(&mut self, id: ResourceTypeId) -> Option<ResourceType> {
        let rt = self.resource_types.remove(&id)?;
        self.resource_names.remove(&rt.name);
        self.remove_rules_where(|r| r.resource_type_id == id);
        Some(rt)
    }

    pub fn resource_type(&self, id: ResourceTypeId) -> Option<&ResourceType> {
        self.resource_types.get(&id)
    }

    pub fn resource_type_by_name(&self, name: &ResourceTypeName) -> Option<&ResourceType> {
        self.resource_names
            .get(name)
            .and_then(|id| self.resource_types.get(id))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.resource_types.values()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rules
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the rule for a (role, resource type) pair. Fails with `Conflict`
    /// when the pair already has one.
    pub fn create_rule(
        &mut self,
        role_id: RoleId,
        resource_type_id: ResourceTypeId,
        grants: Grants,
    ) -> DomainResult<PermissionRule> {
        self.ensure_rule_refs(role_id, resource_type_id)?;
        if self.rule_index.contains_key(&(role_id, resource_type_id)) {
            return Err(DomainError::conflict(
                "a rule for this role and resource type already exists",
            ));
        }
        let rule = PermissionRule {
            id: RuleId::new(),
            role_id,
            resource_type_id,
            grants,
        };
        self.rule_index.insert((role_id, resource_type_id), rule.id);
        self.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    /// Get-or-create the rule for a pair and overwrite all four flags.
    ///
    /// Returns the stored rule and whether it was newly created.
    pub fn upsert_rule(
        &mut self,
        role_id: RoleId,
        resource_type_id: ResourceTypeId,
        grants: Grants,
    ) -> DomainResult<(PermissionRule, bool)> {
        self.ensure_rule_refs(role_id, resource_type_id)?;
        if let Some(rule_id) = self.rule_index.get(&(role_id, resource_type_id)) {
            let rule = self.rules.get_mut(rule_id).ok_or(DomainError::NotFound)?;
            rule.grants = grants;
            return Ok((rule.clone(), false));
        }
        self.create_rule(role_id, resource_type_id, grants)
            .map(|rule| (rule, true))
    }

    pub fn update_rule(&mut self, id: RuleId, patch: &GrantsPatch) -> DomainResult<PermissionRule> {
        let rule = self.rules.get_mut(&id).ok_or(DomainError::NotFound)?;
        rule.grants = patch.apply(rule.grants);
        Ok(rule.clone())
    }

    pub fn remove_rule(&mut self, id: RuleId) -> Option<PermissionRule> {
        let rule = self.rules.remove(&id)?;
        self.rule_index.remove(&(rule.role_id, rule.resource_type_id));
        Some(rule)
    }

    pub fn rule(&self, id: RuleId) -> Option<&PermissionRule> {
        self.rules.get(&id)
    }

    pub fn rule_for(&self, role_id: RoleId, resource_type_id: ResourceTypeId) -> Option<&PermissionRule> {
        self.rule_index
            .get(&(role_id, resource_type_id))
            .and_then(|id| self.rules.get(id))
    }

    pub fn rules(&self) -> impl Iterator<Item = &PermissionRule> {
        self.rules.values()
    }

    /// Capture everything a decision over `name` needs for the given roles.
    pub fn snapshot_for<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a RoleId>,
        name: &ResourceTypeName,
    ) -> RuleSnapshot {
        let Some(rt) = self.resource_type_by_name(name) else {
            return RuleSnapshot::unregistered();
        };
        let grants = roles
            .into_iter()
            .filter_map(|role| self.rule_for(*role, rt.id).map(|rule| (*role, rule.grants)));
        RuleSnapshot::new(rt.name.clone(), rt.id, grants)
    }

    fn ensure_rule_refs(&self, role_id: RoleId, resource_type_id: ResourceTypeId) -> DomainResult<()> {
        if !self.roles.contains_key(&role_id) {
            return Err(DomainError::validation(format!("role {role_id} does not exist")));
        }
        if !self.resource_types.contains_key(&resource_type_id) {
            return Err(DomainError::validation(format!(
                "resource type {resource_type_id} does not exist"
            )));
        }
        Ok(())
    }

    fn remove_rules_where(&mut self, pred: impl Fn(&PermissionRule) -> bool) {
        let doomed: Vec<RuleId> = self.rules.values().filter(|r| pred(*r)).map(|r| r.id).collect();
        for id in doomed {
            self.remove_rule(id);
        }
    }
}

impl RuleSource for PolicyTable {
    fn resource_type_id(&self, name: &ResourceTypeName) -> Option<ResourceTypeId> {
        self.resource_names.get(name).copied()
    }

    fn grants(&self, role: RoleId, resource_type: ResourceTypeId) -> Option<Grants> {
        self.rule_for(role, resource_type).map(|r| r.grants)
    }
}
