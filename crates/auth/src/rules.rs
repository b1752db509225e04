//! Permission rules: the grant record for one (role, resource type) pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use warden_core::{ResourceTypeId, RoleId, RuleId};

use crate::{Action, ResourceTypeName};

/// Four independent boolean grants. Deny-by-default: every flag starts `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Grants {
    pub can_create: bool,
    pub can_read: bool,
    pub can_update: bool,
    pub can_delete: bool,
}

impl Grants {
    pub const NONE: Grants = Grants {
        can_create: false,
        can_read: false,
        can_update: false,
        can_delete: false,
    };

    pub const ALL: Grants = Grants {
        can_create: true,
        can_read: true,
        can_update: true,
        can_delete: true,
    };

    /// Grants exactly the listed actions.
    pub fn only(actions: &[Action]) -> Self {
        actions.iter().fold(Self::NONE, |g, a| g.with(*a))
    }

    pub fn with(mut self, action: Action) -> Self {
        *self.flag_mut(action) = true;
        self
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.can_create,
            Action::Read => self.can_read,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }

    /// Logical OR of two grant records.
    pub fn union(self, other: Grants) -> Self {
        Self {
            can_create: self.can_create || other.can_create,
            can_read: self.can_read || other.can_read,
            can_update: self.can_update || other.can_update,
            can_delete: self.can_delete || other.can_delete,
        }
    }

    pub fn allowed_actions(&self) -> Vec<Action> {
        Action::ALL.into_iter().filter(|a| self.allows(*a)).collect()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    fn flag_mut(&mut self, action: Action) -> &mut bool {
        match action {
            Action::Create => &mut self.can_create,
            Action::Read => &mut self.can_read,
            Action::Update => &mut self.can_update,
            Action::Delete => &mut self.can_delete,
        }
    }
}

/// Partial update of a grant record; `None` leaves the flag untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrantsPatch {
    pub can_create: Option<bool>,
    pub can_read: Option<bool>,
    pub can_update: Option<bool>,
    pub can_delete: Option<bool>,
}

impl GrantsPatch {
    pub fn apply(&self, grants: Grants) -> Grants {
        Grants {
            can_create: self.can_create.unwrap_or(grants.can_create),
            can_read: self.can_read.unwrap_or(grants.can_read),
            can_update: self.can_update.unwrap_or(grants.can_update),
            can_delete: self.can_delete.unwrap_or(grants.can_delete),
        }
    }
}

/// Exactly one rule exists per (role, resource type); see [`crate::PolicyTable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub id: RuleId,
    pub role_id: RoleId,
    pub resource_type_id: ResourceTypeId,
    #[serde(flatten)]
    pub grants: Grants,
}

/// Read-side view of the rule table consumed by the authorization engine.
pub trait RuleSource {
    /// Resolve a resource type name to its registered id.
    fn resource_type_id(&self, name: &ResourceTypeName) -> Option<ResourceTypeId>;

    /// Grants of the rule for (role, resource type), if such a rule exists.
    fn grants(&self, role: RoleId, resource_type: ResourceTypeId) -> Option<Grants>;
}

impl<T: RuleSource + ?Sized> RuleSource for &T {
    fn resource_type_id(&self, name: &ResourceTypeName) -> Option<ResourceTypeId> {
        (**self).resource_type_id(name)
    }

    fn grants(&self, role: RoleId, resource_type: ResourceTypeId) -> Option<Grants> {
        (**self).grants(role, resource_type)
    }
}

/// The slice of the rule table relevant to one decision: one resource type and
/// the rules of one principal's roles for it.
///
/// Stores build this in a single consistent read so the engine can run without
/// holding any lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSnapshot {
    resource: Option<(ResourceTypeName, ResourceTypeId)>,
    grants: HashMap<RoleId, Grants>,
}

impl RuleSnapshot {
    /// Snapshot for a resource type that is not registered.
    pub fn unregistered() -> Self {
        Self::default()
    }

    pub fn new(
        name: ResourceTypeName,
        resource_type_id: ResourceTypeId,
        grants: impl IntoIterator<Item = (RoleId, Grants)>,
    ) -> Self {
        Self {
            resource: Some((name, resource_type_id)),
            grants: grants.into_iter().collect(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.resource.is_some()
    }

    /// OR of every grant in the snapshot.
    pub fn effective_grants(&self) -> Grants {
        self.grants.values().fold(Grants::NONE, |acc, g| acc.union(*g))
    }
}

impl RuleSource for RuleSnapshot {
    fn resource_type_id(&self, name: &ResourceTypeName) -> Option<ResourceTypeId> {
        match &self.resource {
            Some((registered, id)) if registered == name => Some(*id),
            _ => None,
        }
    }

    fn grants(&self, role: RoleId, resource_type: ResourceTypeId) -> Option<Grants> {
        match &self.resource {
            Some((_, id)) if *id == resource_type => self.grants.get(&role).copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grants_deny_everything() {
        let g = Grants::default();
        assert_eq!(g, Grants::NONE);
        for a in Action::ALL {
            assert!(!g.allows(a));
        }
    }

    #[test]
    fn missing_fields_deserialize_as_false() {
        let g: Grants = serde_json::from_str(r#"{"can_read": true}"#).unwrap();
        assert!(g.can_read);
        assert!(!g.can_create && !g.can_update && !g.can_delete);
    }

    #[test]
    fn union_is_flagwise_or() {
        let read = Grants::only(&[Action::Read]);
        let create = Grants::only(&[Action::Create]);
        let both = read.union(create);
        assert_eq!(both.allowed_actions(), vec![Action::Create, Action::Read]);
    }

    #[test]
    fn patch_touches_only_given_flags() {
        let patch = GrantsPatch {
            can_update: Some(true),
            can_read: Some(false),
            ..Default::default()
        };
        let g = patch.apply(Grants::only(&[Action::Read, Action::Create]));
        assert_eq!(g, Grants::only(&[Action::Create, Action::Update]));
    }

    #[test]
    fn snapshot_only_answers_for_its_resource_type() {
        let orders = ResourceTypeName::parse("orders").unwrap();
        let reports = ResourceTypeName::parse("reports").unwrap();
        let rt = ResourceTypeId::new();
        let role = RoleId::new();
        let snap = RuleSnapshot::new(orders.clone(), rt, [(role, Grants::ALL)]);

        assert_eq!(snap.resource_type_id(&orders), Some(rt));
        assert_eq!(snap.resource_type_id(&reports), None);
        assert_eq!(snap.grants(role, rt), Some(Grants::ALL));
        assert_eq!(snap.grants(role, ResourceTypeId::new()), None);
        assert!(!RuleSnapshot::unregistered().is_registered());
    }

    #[test]
    fn rule_serializes_flags_at_top_level() {
        let rule = PermissionRule {
            id: RuleId::new(),
            role_id: RoleId::new(),
            resource_type_id: ResourceTypeId::new(),
            grants: Grants::only(&[Action::Read]),
        };
        let v = serde_json::to_value(&rule).unwrap();
        assert_eq!(v["can_read"], true);
        assert_eq!(v["can_delete"], false);
    }
}
