//! Ownership contract for protected resource instances.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::id::PrincipalId;

/// A resource instance that belongs to (at most) one principal.
///
/// Row-level scoping is expressed entirely through this trait: storage and
/// access layers never look at type-specific fields. An owner of `None` marks
/// an orphaned row, which no principal can see through the scoped API.
pub trait OwnedResource: Clone + Send + Sync + 'static {
    /// Strongly-typed identifier. `Default` yields a fresh id.
    type Id: Copy
        + Eq
        + Ord
        + core::hash::Hash
        + core::fmt::Debug
        + core::fmt::Display
        + Default
        + core::str::FromStr<Err = DomainError>
        + From<Uuid>
        + Into<Uuid>
        + Send
        + Sync
        + 'static;

    /// Validated creation input. Never carries an owner.
    type Draft: Send + Sync + 'static;

    /// Partial update input.
    type Patch: Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    fn owner(&self) -> Option<PrincipalId>;

    fn created_at(&self) -> DateTime<Utc>;

    /// Build a new instance owned by `owner`.
    fn from_draft(id: Self::Id, owner: PrincipalId, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Apply a partial update in place, validating the resulting state.
    fn apply_patch(&mut self, patch: Self::Patch) -> DomainResult<()>;

    /// `true` iff `principal` owns this row.
    fn is_owned_by(&self, principal: PrincipalId) -> bool {
        self.owner() == Some(principal)
    }
}
