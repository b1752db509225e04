use serde::Serialize;
use thiserror::Error;

use warden_core::{PrincipalId, RoleId};

use crate::{Action, Grants, Principal, ResourceTypeName, RuleSource};

/// Outcome of one authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Why a check was denied. Never sent to clients; for logs and explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    Unauthenticated,
    Inactive,
    UnknownResource,
    UnknownAction,
    NoGrant,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Inactive => "inactive",
            DenyReason::UnknownResource => "unknown_resource",
            DenyReason::UnknownAction => "unknown_action",
            DenyReason::NoGrant => "no_grant",
        }
    }
}

impl core::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The resource type string is not a valid name. A configuration bug in
    /// the caller, not an unknown resource.
    #[error("malformed resource type '{0}'")]
    Malformed(String),
}

/// Decide whether `principal` may perform `action` on `resource_type`.
///
/// - No IO
/// - No panics
/// - No locks (the rule source is a snapshot or a borrowed table)
///
/// Order of checks: active flag, superuser bypass, resource registration,
/// then the OR over the principal's roles.
pub fn authorize<R>(
    principal: Option<&Principal>,
    resource_type: &ResourceTypeName,
    action: Action,
    rules: &R,
) -> Decision
where
    R: RuleSource + ?Sized,
{
    evaluate(principal, resource_type, Some(action), rules)
}

/// Same as [`authorize`], deriving the action from an HTTP method. Methods
/// outside the fixed verb table are denied for everyone but superusers.
pub fn authorize_method<R>(
    principal: Option<&Principal>,
    resource_type: &ResourceTypeName,
    method: &str,
    rules: &R,
) -> Decision
where
    R: RuleSource + ?Sized,
{
    evaluate(principal, resource_type, Action::from_http_method(method), rules)
}

/// String entry point: validates the resource type name before evaluating.
/// An unrecognized action is a deny, a malformed resource name is an error.
pub fn try_authorize<R>(
    principal: Option<&Principal>,
    resource_type: &str,
    action: &str,
    rules: &R,
) -> Result<Decision, AuthzError>
where
    R: RuleSource + ?Sized,
{
    let name = ResourceTypeName::parse(resource_type)
        .map_err(|_| AuthzError::Malformed(resource_type.to_string()))?;
    Ok(evaluate(principal, &name, action.parse().ok(), rules))
}

fn evaluate<R>(
    principal: Option<&Principal>,
    resource_type: &ResourceTypeName,
    action: Option<Action>,
    rules: &R,
) -> Decision
where
    R: RuleSource + ?Sized,
{
    let Some(principal) = principal else {
        return Decision::Deny(DenyReason::Unauthenticated);
    };
    if !principal.is_active {
        return Decision::Deny(DenyReason::Inactive);
    }
    if principal.is_superuser {
        return Decision::Allow;
    }
    let Some(rt) = rules.resource_type_id(resource_type) else {
        return Decision::Deny(DenyReason::UnknownResource);
    };
    let Some(action) = action else {
        return Decision::Deny(DenyReason::UnknownAction);
    };

    let granted = principal
        .roles
        .iter()
        .filter_map(|role| rules.grants(*role, rt))
        .any(|g| g.allows(action));

    if granted {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NoGrant)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// This structure provides transparent, debuggable information about why
/// a request was allowed or denied. Only administrators ever see it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub resource_type: String,
    pub action: Action,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Details about the principal's state.
    pub principal: PrincipalState,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

/// Current state of the principal being checked.
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub principal_id: PrincipalId,
    pub is_active: bool,
    pub is_superuser: bool,
    pub roles: Vec<String>,

    /// Roles whose rule for the resource type grants the action.
    pub granting_roles: Vec<String>,

    /// OR of all role grants on the resource type.
    pub effective_grants: Grants,
}

/// Detailed reason why authorization was denied.
#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenyReason,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// Explain why an authorization decision was made (or would be made).
///
/// `role_name` maps role ids to display names; unknown ids are shown as the
/// raw id. The `granted` flag always agrees with [`authorize`].
pub fn explain_authorization<R, F>(
    principal: &Principal,
    resource_type: &ResourceTypeName,
    action: Action,
    rules: &R,
    role_name: F,
) -> AuthorizationExplanation
where
    R: RuleSource + ?Sized,
    F: Fn(RoleId) -> Option<String>,
{
    let display = |role: RoleId| role_name(role).unwrap_or_else(|| role.to_string());

    let rt = rules.resource_type_id(resource_type);
    let mut effective = Grants::NONE;
    let mut granting_roles = Vec::new();
    if let Some(rt) = rt {
        for role in &principal.roles {
            if let Some(g) = rules.grants(*role, rt) {
                effective = effective.union(g);
                if g.allows(action) {
                    granting_roles.push(display(*role));
                }
            }
        }
    }

    let state = PrincipalState {
        principal_id: principal.id,
        is_active: principal.is_active,
        is_superuser: principal.is_superuser,
        roles: principal.roles.iter().map(|r| display(*r)).collect(),
        granting_roles,
        effective_grants: effective,
    };

    let decision = authorize(Some(principal), resource_type, action, rules);
    let (reason, denial_reason) = match decision {
        Decision::Allow if principal.is_superuser => (
            "Principal is an active superuser; the rule table is bypassed".to_string(),
            None,
        ),
        Decision::Allow => (
            format!(
                "Role(s) {:?} grant '{}' on '{}'",
                state.granting_roles, action, resource_type
            ),
            None,
        ),
        Decision::Deny(kind) => {
            let (message, suggestions) = denial_details(kind, resource_type, action);
            (
                message.clone(),
                Some(DenialReason {
                    kind,
                    message,
                    suggestions,
                }),
            )
        }
    };

    AuthorizationExplanation {
        resource_type: resource_type.to_string(),
        action,
        granted: decision.is_allowed(),
        reason,
        principal: state,
        denial_reason,
    }
}

fn denial_details(
    kind: DenyReason,
    resource_type: &ResourceTypeName,
    action: Action,
) -> (String, Vec<String>) {
    match kind {
        DenyReason::Inactive => (
            "Principal is deactivated; every action is denied".to_string(),
            vec!["Reactivate the account if access should be restored".to_string()],
        ),
        DenyReason::Unauthenticated => ("No principal supplied".to_string(), Vec::new()),
        DenyReason::UnknownResource => (
            format!("Resource type '{resource_type}' is not registered"),
            vec![format!("Register '{resource_type}' as a resource type")],
        ),
        DenyReason::UnknownAction => ("Action is not recognized".to_string(), Vec::new()),
        DenyReason::NoGrant => (
            format!(
                "No assigned role grants '{}' ({}) on '{}'",
                action,
                action.grant_field(),
                resource_type
            ),
            vec![
                format!(
                    "Set {} on an existing rule for one of the principal's roles",
                    action.grant_field()
                ),
                format!("Assign a role that grants '{action}' on '{resource_type}'"),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{Email, PolicyTable, Profile, RoleName};

    struct Fixture {
        table: PolicyTable,
        manager: RoleId,
        tester: RoleId,
    }

    fn rt(name: &str) -> ResourceTypeName {
        ResourceTypeName::parse(name).unwrap()
    }

    fn fixture() -> Fixture {
        let mut table = PolicyTable::new();
        let orders = table.register_resource_type(rt("orders")).unwrap();
        table.register_resource_type(rt("reports")).unwrap();
        let manager = table.create_role(RoleName::parse("Manager").unwrap()).unwrap();
        let tester = table.create_role(RoleName::parse("Tester").unwrap()).unwrap();
        table
            .create_rule(manager.id, orders.id, Grants::only(&[Action::Create, Action::Read]))
            .unwrap();
        table
            .create_rule(tester.id, orders.id, Grants::only(&[Action::Read]))
            .unwrap();
        Fixture {
            table,
            manager: manager.id,
            tester: tester.id,
        }
    }

    fn principal(roles: &[RoleId]) -> Principal {
        let mut p = Principal::new(
            Email::parse("user@example.com").unwrap(),
            Profile::new("Test", "User", None).unwrap(),
            Utc::now(),
        );
        for r in roles {
            p.assign_role(*r);
        }
        p
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        let f = fixture();
        let d = authorize(None, &rt("orders"), Action::Read, &f.table);
        assert_eq!(d, Decision::Deny(DenyReason::Unauthenticated));
    }

    #[test]
    fn inactive_superuser_is_denied() {
        let f = fixture();
        let mut p = principal(&[f.manager]);
        p.is_superuser = true;
        p.deactivate();
        for action in Action::ALL {
            assert_eq!(
                authorize(Some(&p), &rt("orders"), action, &f.table),
                Decision::Deny(DenyReason::Inactive)
            );
        }
    }

    #[test]
    fn superuser_bypasses_rules() {
        let f = fixture();
        let mut p = principal(&[]);
        p.is_superuser = true;
        for action in Action::ALL {
            assert!(authorize(Some(&p), &rt("reports"), action, &f.table).is_allowed());
        }
        assert!(authorize_method(Some(&p), &rt("orders"), "HEAD", &f.table).is_allowed());
    }

    #[test]
    fn tester_and_manager_grants_are_ored() {
        let f = fixture();
        let tester = principal(&[f.tester]);
        assert!(authorize(Some(&tester), &rt("orders"), Action::Read, &f.table).is_allowed());
        assert_eq!(
            authorize(Some(&tester), &rt("orders"), Action::Create, &f.table),
            Decision::Deny(DenyReason::NoGrant)
        );

        let both = principal(&[f.tester, f.manager]);
        assert!(authorize(Some(&both), &rt("orders"), Action::Create, &f.table).is_allowed());
        assert!(!authorize(Some(&both), &rt("orders"), Action::Delete, &f.table).is_allowed());
    }

    #[test]
    fn manager_can_create_but_not_update_orders() {
        let f = fixture();
        let mut m = principal(&[f.manager]);
        assert!(authorize_method(Some(&m), &rt("orders"), "POST", &f.table).is_allowed());
        assert!(!authorize_method(Some(&m), &rt("orders"), "PUT", &f.table).is_allowed());
        assert!(!authorize_method(Some(&m), &rt("orders"), "PATCH", &f.table).is_allowed());
        m.deactivate();
        assert!(!authorize_method(Some(&m), &rt("orders"), "POST", &f.table).is_allowed());
    }

    #[test]
    fn unregistered_resource_is_denied() {
        let mut f = fixture();
        let invoices = rt("invoices");
        let p = principal(&[f.manager]);
        let orders = f.table.resource_type_by_name(&rt("orders")).unwrap().id;
        f.table.upsert_rule(f.manager, orders, Grants::ALL).unwrap();
        assert_eq!(
            authorize(Some(&p), &invoices, Action::Read, &f.table),
            Decision::Deny(DenyReason::UnknownResource)
        );
    }

    #[test]
    fn unknown_verbs_and_actions_are_denied() {
        let f = fixture();
        let p = principal(&[f.manager]);
        assert_eq!(
            authorize_method(Some(&p), &rt("orders"), "OPTIONS", &f.table),
            Decision::Deny(DenyReason::UnknownAction)
        );
        assert_eq!(
            try_authorize(Some(&p), "orders", "approve", &f.table),
            Ok(Decision::Deny(DenyReason::UnknownAction))
        );
        assert_eq!(
            try_authorize(Some(&p), "orders", "read", &f.table),
            Ok(Decision::Allow)
        );
    }

    #[test]
    fn malformed_resource_name_is_an_error() {
        let f = fixture();
        let p = principal(&[f.manager]);
        assert_eq!(
            try_authorize(Some(&p), "Orders!", "read", &f.table),
            Err(AuthzError::Malformed("Orders!".to_string()))
        );
    }

    #[test]
    fn snapshot_and_table_agree() {
        let f = fixture();
        let p = principal(&[f.tester]);
        let snap = f.table.snapshot_for(&p.roles, &rt("orders"));
        for action in Action::ALL {
            assert_eq!(
                authorize(Some(&p), &rt("orders"), action, &f.table),
                authorize(Some(&p), &rt("orders"), action, &snap),
            );
        }
    }

    #[test]
    fn explanation_names_granting_roles() {
        let f = fixture();
        let p = principal(&[f.tester, f.manager]);
        let names = |id: RoleId| f.table.role(id).map(|r| r.name.to_string());
        let ex = explain_authorization(&p, &rt("orders"), Action::Create, &f.table, names);
        assert!(ex.granted);
        assert_eq!(ex.principal.granting_roles, vec!["Manager".to_string()]);
        assert!(ex.principal.effective_grants.can_read);

        let ex = explain_authorization(&p, &rt("orders"), Action::Delete, &f.table, names);
        assert!(!ex.granted);
        let denial = ex.denial_reason.unwrap();
        assert_eq!(denial.kind, DenyReason::NoGrant);
        assert!(!denial.suggestions.is_empty());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_grants() -> impl Strategy<Value = Grants> {
            (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
                |(can_create, can_read, can_update, can_delete)| Grants {
                    can_create,
                    can_read,
                    can_update,
                    can_delete,
                },
            )
        }

        fn arb_action() -> impl Strategy<Value = Action> {
            prop_oneof![
                Just(Action::Create),
                Just(Action::Read),
                Just(Action::Update),
                Just(Action::Delete),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            /// Allowed iff at least one assigned role's rule sets the flag.
            #[test]
            fn decision_is_or_over_roles(
                grants in proptest::collection::vec(arb_grants(), 0..5),
                action in arb_action(),
            ) {
                let mut table = PolicyTable::new();
                let orders = table.register_resource_type(rt("orders")).unwrap();
                let mut p = principal(&[]);
                for (i, g) in grants.iter().enumerate() {
                    let role = table.create_role(RoleName::parse(&format!("role-{i}")).unwrap()).unwrap();
                    table.create_rule(role.id, orders.id, *g).unwrap();
                    p.assign_role(role.id);
                }
                let expected = grants.iter().any(|g| g.allows(action));
                prop_assert_eq!(
                    authorize(Some(&p), &rt("orders"), action, &table).is_allowed(),
                    expected
                );
            }

            /// Adding a role never turns an allow into a deny.
            #[test]
            fn adding_roles_is_monotonic(
                base in arb_grants(),
                extra in arb_grants(),
                action in arb_action(),
            ) {
                let mut table = PolicyTable::new();
                let orders = table.register_resource_type(rt("orders")).unwrap();
                let a = table.create_role(RoleName::parse("a").unwrap()).unwrap();
                let b = table.create_role(RoleName::parse("b").unwrap()).unwrap();
                table.create_rule(a.id, orders.id, base).unwrap();
                table.create_rule(b.id, orders.id, extra).unwrap();

                let mut p = principal(&[a.id]);
                let before = authorize(Some(&p), &rt("orders"), action, &table).is_allowed();
                p.assign_role(b.id);
                let after = authorize(Some(&p), &rt("orders"), action, &table).is_allowed();
                prop_assert!(!before || after);
            }

            /// Inactive principals are denied regardless of flags or grants.
            #[test]
            fn inactive_is_always_denied(
                grants in arb_grants(),
                action in arb_action(),
                superuser in any::<bool>(),
            ) {
                let mut table = PolicyTable::new();
                let orders = table.register_resource_type(rt("orders")).unwrap();
                let role = table.create_role(RoleName::parse("r").unwrap()).unwrap();
                table.create_rule(role.id, orders.id, grants).unwrap();
                let mut p = principal(&[role.id]);
                p.is_superuser = superuser;
                p.deactivate();
                prop_assert_eq!(
                    authorize(Some(&p), &rt("orders"), action, &table),
                    Decision::Deny(DenyReason::Inactive)
                );
            }
        }
    }
}
