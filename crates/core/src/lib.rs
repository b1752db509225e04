//! `warden-core` - shared domain primitives.
//!
//! This crate contains **pure domain** building blocks (no infrastructure concerns):
//! strongly-typed identifiers, the domain error model, and the ownership contract
//! implemented by every protected resource.

pub mod error;
pub mod id;
pub mod owned;

pub use error::{DomainError, DomainResult};
pub use id::{OrderId, PrincipalId, ReportId, ResourceTypeId, RoleId, RuleId};
pub use owned::OwnedResource;
