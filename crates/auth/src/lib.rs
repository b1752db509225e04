//! `warden-auth` - pure authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it holds the RBAC data model
//! (principals, roles, resource types, permission rules), the authorization
//! engine, password policy, and access-token handling.

pub mod action;
pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod policy;
pub mod principal;
pub mod resource;
pub mod roles;
pub mod rules;

pub use action::{Action, UnknownAction};
pub use authorize::{
    AuthorizationExplanation, AuthzError, Decision, DenialReason, DenyReason, PrincipalState,
    authorize, authorize_method, explain_authorization, try_authorize,
};
pub use claims::{
    Hs256Jwt, IssuedToken, JwtClaims, JwtValidator, TokenIssuer, TokenValidationError,
    validate_claims,
};
pub use credentials::{
    CredentialError, hash_password, validate_new_password, verify_password, verify_password_or_dummy,
};
pub use policy::PolicyTable;
pub use principal::{Email, Principal, Profile, ProfilePatch};
pub use resource::{ResourceType, ResourceTypeName};
pub use roles::{Role, RoleName};
pub use rules::{Grants, GrantsPatch, PermissionRule, RuleSnapshot, RuleSource};
