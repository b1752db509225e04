//! Infrastructure layer: storage adapters (in-memory, Postgres), the
//! owner-scoped resource access layer and bootstrap seeding.

pub mod access;
pub mod seed;
pub mod store;

pub use access::{AccessError, AccessGate, ResourceAccess};
pub use seed::{SeedConfig, SeedError, SeedReport, seed_defaults};
pub use store::{
    IdentityStore, InMemoryOwnedStore, InMemoryStore, OwnedStore, Page, Paged, PolicyStore,
    PostgresStore, PrincipalCredentials, StoreError, StoreResult,
};
