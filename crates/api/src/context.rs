use warden_auth::Principal;
use warden_core::PrincipalId;

/// Principal context for a request.
///
/// Loaded from the identity store by the auth middleware on every request, so
/// flags and role assignments are as of this request, not as of token issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal.id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is_active(&self) -> bool {
        self.principal.is_active
    }

    pub fn is_admin(&self) -> bool {
        self.principal.is_admin()
    }
}
