//! Resource access layer: authorization gate plus owner-scoped row access.
//!
//! Every operation first runs the authorization engine for its action, then
//! touches only rows owned by the requester. Rows owned by someone else and
//! rows that do not exist produce the same `AccessError::Denied`.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use warden_auth::{
    Action, AuthzError, Decision, Principal, ResourceTypeName, RuleSnapshot, authorize,
    authorize_method,
};
use warden_core::OwnedResource;

use crate::store::{OwnedStore, Page, Paged, PolicyStore, StoreError};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("forbidden")]
    Denied,

    #[error(transparent)]
    Misconfigured(#[from] AuthzError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Authorization gate bound to one resource type.
#[derive(Clone)]
pub struct AccessGate {
    resource_type: &'static str,
    policy: Arc<dyn PolicyStore>,
}

impl AccessGate {
    pub fn new(resource_type: &'static str, policy: Arc<dyn PolicyStore>) -> Self {
        Self {
            resource_type,
            policy,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Require `action` on this gate's resource type.
    pub async fn check(&self, principal: &Principal, action: Action) -> Result<(), AccessError> {
        let (name, snapshot) = self.snapshot(principal).await?;
        let decision = authorize(Some(principal), &name, action, &snapshot);
        self.enforce(principal, action.as_str(), decision)
    }

    /// Require the action derived from an HTTP method.
    pub async fn check_method(&self, principal: &Principal, method: &str) -> Result<(), AccessError> {
        let (name, snapshot) = self.snapshot(principal).await?;
        let decision = authorize_method(Some(principal), &name, method, &snapshot);
        self.enforce(principal, method, decision)
    }

    async fn snapshot(&self, principal: &Principal) -> Result<(ResourceTypeName, RuleSnapshot), AccessError> {
        let name = ResourceTypeName::parse(self.resource_type)
            .map_err(|_| AuthzError::Malformed(self.resource_type.to_string()))?;
        // The engine settles inactive and superuser principals without rules.
        if !principal.is_active || principal.is_superuser {
            return Ok((name, RuleSnapshot::unregistered()));
        }
        let snapshot = self.policy.rule_snapshot(&principal.roles, &name).await?;
        Ok((name, snapshot))
    }

    fn enforce(&self, principal: &Principal, action: &str, decision: Decision) -> Result<(), AccessError> {
        match decision {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                debug!(
                    principal_id = %principal.id,
                    resource_type = self.resource_type,
                    action,
                    reason = %reason,
                    "authorization denied"
                );
                Err(AccessError::Denied)
            }
        }
    }
}

/// Owner-scoped access to one resource type.
pub struct ResourceAccess<R: OwnedResource> {
    gate: AccessGate,
    rows: Arc<dyn OwnedStore<R>>,
}

impl<R: OwnedResource> Clone for ResourceAccess<R> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: OwnedResource> ResourceAccess<R> {
    pub fn new(gate: AccessGate, rows: Arc<dyn OwnedStore<R>>) -> Self {
        Self { gate, rows }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub async fn list_owned(&self, principal: &Principal, page: Page) -> Result<Paged<R>, AccessError> {
        self.gate.check(principal, Action::Read).await?;
        Ok(self.rows.list_by_owner(principal.id, page).await?)
    }

    pub async fn get_owned(&self, principal: &Principal, id: R::Id) -> Result<R, AccessError> {
        self.gate.check(principal, Action::Read).await?;
        self.rows
            .get_owned(principal.id, id)
            .await?
            .ok_or(AccessError::Denied)
    }

    /// The owner is always the requester; drafts cannot name one.
    pub async fn create_owned(&self, principal: &Principal, draft: R::Draft) -> Result<R, AccessError> {
        self.gate.check(principal, Action::Create).await?;
        let row = R::from_draft(R::Id::default(), principal.id, draft, Utc::now());
        Ok(self.rows.insert(row).await?)
    }

    pub async fn update_owned(&self, principal: &Principal, id: R::Id, patch: R::Patch) -> Result<R, AccessError> {
        self.gate.check(principal, Action::Update).await?;
        self.rows
            .update_owned(principal.id, id, patch)
            .await?
            .ok_or(AccessError::Denied)
    }

    pub async fn delete_owned(&self, principal: &Principal, id: R::Id) -> Result<(), AccessError> {
        self.gate.check(principal, Action::Delete).await?;
        if self.rows.delete_owned(principal.id, id).await? {
            Ok(())
        } else {
            Err(AccessError::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IdentityStore, InMemoryOwnedStore, InMemoryStore};
    use warden_auth::{Email, Grants, Profile, RoleName};
    use warden_core::{OrderId, RoleId};
    use warden_orders::{NewOrder, Order, OrderPatch};

    struct Fixture {
        store: Arc<InMemoryStore>,
        orders: ResourceAccess<Order>,
        manager: RoleId,
        full: RoleId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let rt = store
            .register_resource_type(ResourceTypeName::parse("orders").unwrap())
            .await
            .unwrap();
        let manager = store.create_role(RoleName::parse("Manager").unwrap()).await.unwrap();
        let full = store.create_role(RoleName::parse("Owner").unwrap()).await.unwrap();
        store
            .create_rule(manager.id, rt.id, Grants::only(&[Action::Read, Action::Create]))
            .await
            .unwrap();
        store.create_rule(full.id, rt.id, Grants::ALL).await.unwrap();

        let policy: Arc<dyn PolicyStore> = store.clone();
        let rows: Arc<dyn OwnedStore<Order>> = Arc::new(InMemoryOwnedStore::<Order>::new());
        Fixture {
            orders: ResourceAccess::new(AccessGate::new("orders", policy), rows),
            store,
            manager: manager.id,
            full: full.id,
        }
    }

    async fn principal_with(f: &Fixture, email: &str, roles: &[RoleId]) -> Principal {
        let p = Principal::new(
            Email::parse(email).unwrap(),
            Profile::new("Test", "User", None).unwrap(),
            Utc::now(),
        );
        let mut p = f.store.create_principal(p, "hash".into()).await.unwrap();
        for r in roles {
            p = f.store.assign_role(p.id, *r).await.unwrap();
        }
        p
    }

    fn draft(item: &str) -> NewOrder {
        NewOrder::new(item, 500).unwrap()
    }

    #[tokio::test]
    async fn manager_can_create_and_list_but_not_update() {
        let f = fixture().await;
        let m = principal_with(&f, "manager@example.com", &[f.manager]).await;

        let order = f.orders.create_owned(&m, draft("Widget")).await.unwrap();
        assert_eq!(order.owner, Some(m.id));
        assert_eq!(f.orders.list_owned(&m, Page::default()).await.unwrap().count, 1);

        let err = f
            .orders
            .update_owned(&m, order.id, OrderPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Denied));
        assert!(matches!(
            f.orders.delete_owned(&m, order.id).await.unwrap_err(),
            AccessError::Denied
        ));
    }

    #[tokio::test]
    async fn deactivated_manager_is_denied() {
        let f = fixture().await;
        let m = principal_with(&f, "manager@example.com", &[f.manager]).await;
        let m = f.store.set_active(m.id, false).await.unwrap();
        assert!(matches!(
            f.orders.create_owned(&m, draft("Widget")).await.unwrap_err(),
            AccessError::Denied
        ));
        assert!(matches!(
            f.orders.list_owned(&m, Page::default()).await.unwrap_err(),
            AccessError::Denied
        ));
    }

    #[tokio::test]
    async fn other_owners_rows_look_missing() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        let b = principal_with(&f, "b@example.com", &[f.full]).await;
        let order = f.orders.create_owned(&a, draft("Widget")).await.unwrap();

        for result in [
            f.orders.get_owned(&b, order.id).await.map(|_| ()),
            f.orders
                .update_owned(&b, order.id, OrderPatch::default())
                .await
                .map(|_| ()),
            f.orders.delete_owned(&b, order.id).await,
            f.orders.get_owned(&b, OrderId::new()).await.map(|_| ()),
        ] {
            assert!(matches!(result, Err(AccessError::Denied)));
        }
        assert_eq!(f.orders.list_owned(&b, Page::default()).await.unwrap().count, 0);
        assert_eq!(f.orders.get_owned(&a, order.id).await.unwrap().item, "Widget");
    }

    #[tokio::test]
    async fn owner_with_full_grants_can_update_and_delete() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        let order = f.orders.create_owned(&a, draft("Widget")).await.unwrap();
        let updated = f
            .orders
            .update_owned(
                &a,
                order.id,
                OrderPatch {
                    price: Some(750),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 750);
        f.orders.delete_owned(&a, order.id).await.unwrap();
        assert!(matches!(
            f.orders.get_owned(&a, order.id).await.unwrap_err(),
            AccessError::Denied
        ));
    }

    #[tokio::test]
    async fn superuser_bypasses_rules_but_stays_owner_scoped() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        let order = f.orders.create_owned(&a, draft("Widget")).await.unwrap();

        let mut root = principal_with(&f, "root@example.com", &[]).await;
        root.is_superuser = true;
        assert!(matches!(
            f.orders.get_owned(&root, order.id).await.unwrap_err(),
            AccessError::Denied
        ));
        f.orders.create_owned(&root, draft("Mine")).await.unwrap();
        assert_eq!(f.orders.list_owned(&root, Page::default()).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn unregistered_resource_type_is_denied() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        let policy: Arc<dyn PolicyStore> = f.store.clone();
        let gate = AccessGate::new("invoices", policy);
        assert!(matches!(gate.check(&a, Action::Read).await, Err(AccessError::Denied)));
    }

    #[tokio::test]
    async fn malformed_resource_type_is_a_configuration_error() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        let policy: Arc<dyn PolicyStore> = f.store.clone();
        let gate = AccessGate::new("Bad Name", policy);
        assert!(matches!(
            gate.check(&a, Action::Read).await,
            Err(AccessError::Misconfigured(AuthzError::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn unmapped_methods_are_denied() {
        let f = fixture().await;
        let a = principal_with(&f, "a@example.com", &[f.full]).await;
        assert!(f.orders.gate().check_method(&a, "GET").await.is_ok());
        assert!(matches!(
            f.orders.gate().check_method(&a, "OPTIONS").await,
            Err(AccessError::Denied)
        ));
    }
}
