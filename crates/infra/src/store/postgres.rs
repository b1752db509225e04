//! Postgres-backed store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate email, role name, resource name or (role, resource) rule |
//! | Database (foreign key violation) | `23503` | `Validation` | Rule or assignment refers to a missing role / resource type |
//! | Database (check constraint violation) | `23514` | `Validation` | Out-of-range column value |
//! | Anything else | Any other | `Unexpected` | Network errors, pool closed, decode failures |
//!
//! ## Atomicity
//!
//! Multi-statement operations run in one transaction. Rule snapshots are a
//! single statement, so a decision never sees a half-applied rule edit.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use warden_auth::{
    Email, Grants, GrantsPatch, PermissionRule, Principal, Profile, ResourceType,
    ResourceTypeName, Role, RoleName, RuleSnapshot,
};
use warden_core::{OrderId, OwnedResource, PrincipalId, ReportId, ResourceTypeId, RoleId, RuleId};
use warden_orders::Order;
use warden_reports::Report;

use super::{
    IdentityStore, OwnedStore, Page, Paged, PolicyStore, PrincipalCredentials, StoreError,
    StoreResult,
};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const PRINCIPAL_SELECT: &str = r#"
    SELECT
        p.id, p.email, p.password_hash, p.first_name, p.last_name, p.middle_name,
        p.is_active, p.is_superuser, p.is_staff, p.date_joined,
        COALESCE(
            array_agg(pr.role_id) FILTER (WHERE pr.role_id IS NOT NULL),
            '{}'
        ) AS role_ids
    FROM principals p
    LEFT JOIN principal_roles pr ON pr.principal_id = p.id
"#;

const RULE_COLUMNS: &str = "id, role_id, resource_type_id, can_create, can_read, can_update, can_delete";

/// Postgres store implementing every storage trait over one pool.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; cloning is cheap.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes when missing. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn load_principal(&self, id: PrincipalId) -> StoreResult<Principal> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        fetch_principal(&mut *conn, id)
            .await?
            .map(|c| c.principal)
            .ok_or(StoreError::NotFound)
    }
}

async fn fetch_principal(conn: &mut PgConnection, id: PrincipalId) -> StoreResult<Option<PrincipalCredentials>> {
    let sql = format!("{PRINCIPAL_SELECT} WHERE p.id = $1 GROUP BY p.id");
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("fetch_principal", e))?;
    row.as_ref().map(principal_from_row).transpose()
}

fn principal_from_row(row: &PgRow) -> StoreResult<PrincipalCredentials> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_principal", e);
    let email: String = row.try_get("email").map_err(decode)?;
    let role_ids: Vec<Uuid> = row.try_get("role_ids").map_err(decode)?;
    let principal = Principal {
        id: PrincipalId::from_uuid(row.try_get("id").map_err(decode)?),
        email: Email::parse(&email)
            .map_err(|e| StoreError::Unexpected(anyhow::anyhow!("stored email is invalid: {e}")))?,
        profile: Profile {
            first_name: row.try_get("first_name").map_err(decode)?,
            last_name: row.try_get("last_name").map_err(decode)?,
            middle_name: row.try_get("middle_name").map_err(decode)?,
        },
        is_active: row.try_get("is_active").map_err(decode)?,
        is_superuser: row.try_get("is_superuser").map_err(decode)?,
        is_staff: row.try_get("is_staff").map_err(decode)?,
        roles: role_ids.into_iter().map(RoleId::from_uuid).collect(),
        date_joined: row.try_get("date_joined").map_err(decode)?,
    };
    Ok(PrincipalCredentials {
        principal,
        password_hash: row.try_get("password_hash").map_err(decode)?,
    })
}

fn role_from_row(row: &PgRow) -> StoreResult<Role> {
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("decode_role", e))?;
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id").map_err(|e| map_sqlx_error("decode_role", e))?),
        name: RoleName::parse(&name)?,
    })
}

fn resource_type_from_row(row: &PgRow) -> StoreResult<ResourceType> {
    let name: String = row
        .try_get("name")
        .map_err(|e| map_sqlx_error("decode_resource_type", e))?;
    Ok(ResourceType {
        id: ResourceTypeId::from_uuid(
            row.try_get("id")
                .map_err(|e| map_sqlx_error("decode_resource_type", e))?,
        ),
        name: ResourceTypeName::parse(&name)?,
    })
}

fn rule_from_row(row: &PgRow) -> Result<PermissionRule, sqlx::Error> {
    Ok(PermissionRule {
        id: RuleId::from_uuid(row.try_get("id")?),
        role_id: RoleId::from_uuid(row.try_get("role_id")?),
        resource_type_id: ResourceTypeId::from_uuid(row.try_get("resource_type_id")?),
        grants: Grants {
            can_create: row.try_get("can_create")?,
            can_read: row.try_get("can_read")?,
            can_update: row.try_get("can_update")?,
            can_delete: row.try_get("can_delete")?,
        },
    })
}

#[async_trait]
impl IdentityStore for PostgresStore {
    #[instrument(skip(self, principal, password_hash), fields(principal_id = %principal.id), err)]
    async fn create_principal(&self, principal: Principal, password_hash: String) -> StoreResult<Principal> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO principals (
                id, email, password_hash, first_name, last_name, middle_name,
                is_active, is_superuser, is_staff, date_joined
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(principal.id.as_uuid())
        .bind(principal.email.as_str())
        .bind(&password_hash)
        .bind(&principal.profile.first_name)
        .bind(&principal.profile.last_name)
        .bind(&principal.profile.middle_name)
        .bind(principal.is_active)
        .bind(principal.is_superuser)
        .bind(principal.is_staff)
        .bind(principal.date_joined)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_principal", e))?;

        for role in &principal.roles {
            sqlx::query("INSERT INTO principal_roles (principal_id, role_id) VALUES ($1, $2)")
                .bind(principal.id.as_uuid())
                .bind(role.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_principal_role", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(principal)
    }

    #[instrument(skip(self), fields(principal_id = %id), err)]
    async fn get_principal(&self, id: PrincipalId) -> StoreResult<Principal> {
        self.load_principal(id).await
    }

    #[instrument(skip(self, email), err)]
    async fn find_credentials(&self, email: &Email) -> StoreResult<Option<PrincipalCredentials>> {
        let sql = format!("{PRINCIPAL_SELECT} WHERE p.email = $1 GROUP BY p.id");
        let row = sqlx::query(&sql)
            .bind(email.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_credentials", e))?;
        row.as_ref().map(principal_from_row).transpose()
    }

    #[instrument(skip(self), fields(principal_count = tracing::field::Empty), err)]
    async fn list_principals(&self) -> StoreResult<Vec<Principal>> {
        let sql = format!("{PRINCIPAL_SELECT} GROUP BY p.id ORDER BY p.id");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_principals", e))?;
        Span::current().record("principal_count", rows.len());
        rows.iter()
            .map(|r| principal_from_row(r).map(|c| c.principal))
            .collect()
    }

    #[instrument(skip(self, profile), fields(principal_id = %id), err)]
    async fn update_profile(&self, id: PrincipalId, profile: Profile) -> StoreResult<Principal> {
        let result = sqlx::query(
            "UPDATE principals SET first_name = $2, last_name = $3, middle_name = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.middle_name)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.load_principal(id).await
    }

    #[instrument(skip(self), fields(principal_id = %id), err)]
    async fn set_active(&self, id: PrincipalId, active: bool) -> StoreResult<Principal> {
        let result = sqlx::query("UPDATE principals SET is_active = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(active)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_active", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.load_principal(id).await
    }

    #[instrument(skip(self), fields(principal_id = %id, role_id = %role), err)]
    async fn assign_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let exists = sqlx::query("SELECT 1 FROM principals WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_principal", e))?;
        if exists.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        sqlx::query(
            "INSERT INTO principal_roles (principal_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(id.as_uuid())
        .bind(role.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;

        let principal = fetch_principal(&mut *tx, id).await?.ok_or(StoreError::NotFound)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(principal.principal)
    }

    #[instrument(skip(self), fields(principal_id = %id, role_id = %role), err)]
    async fn revoke_role(&self, id: PrincipalId, role: RoleId) -> StoreResult<Principal> {
        sqlx::query("DELETE FROM principal_roles WHERE principal_id = $1 AND role_id = $2")
            .bind(id.as_uuid())
            .bind(role.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_role", e))?;
        self.load_principal(id).await
    }
}

#[async_trait]
impl PolicyStore for PostgresStore {
    #[instrument(skip(self), fields(role = %name), err)]
    async fn create_role(&self, name: RoleName) -> StoreResult<Role> {
        let role = Role {
            id: RoleId::new(),
            name,
        };
        sqlx::query("INSERT INTO roles (id, name) VALUES ($1, $2)")
            .bind(role.id.as_uuid())
            .bind(role.name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_role", e))?;
        Ok(role)
    }

    #[instrument(skip(self), err)]
    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter().map(role_from_row).collect()
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn get_role(&self, id: RoleId) -> StoreResult<Role> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?;
        row.as_ref().map(role_from_row).transpose()?.ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), fields(role = %name), err)]
    async fn find_role(&self, name: &RoleName) -> StoreResult<Option<Role>> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_role", e))?;
        row.as_ref().map(role_from_row).transpose()
    }

    #[instrument(skip(self), fields(role_id = %id, role = %name), err)]
    async fn rename_role(&self, id: RoleId, name: RoleName) -> StoreResult<Role> {
        let result = sqlx::query("UPDATE roles SET name = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("rename_role", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(Role { id, name })
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete_role(&self, id: RoleId) -> StoreResult<()> {
        // Rules and assignments go with it (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(resource_type = %name), err)]
    async fn register_resource_type(&self, name: ResourceTypeName) -> StoreResult<ResourceType> {
        let rt = ResourceType {
            id: ResourceTypeId::new(),
            name,
        };
        sqlx::query("INSERT INTO resource_types (id, name) VALUES ($1, $2)")
            .bind(rt.id.as_uuid())
            .bind(rt.name.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("register_resource_type", e))?;
        Ok(rt)
    }

    #[instrument(skip(self), err)]
    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>> {
        let rows = sqlx::query("SELECT id, name FROM resource_types ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_resource_types", e))?;
        rows.iter().map(resource_type_from_row).collect()
    }

    #[instrument(skip(self), fields(resource_type_id = %id), err)]
    async fn get_resource_type(&self, id: ResourceTypeId) -> StoreResult<ResourceType> {
        let row = sqlx::query("SELECT id, name FROM resource_types WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_resource_type", e))?;
        row.as_ref()
            .map(resource_type_from_row)
            .transpose()?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), fields(resource_type = %name), err)]
    async fn find_resource_type(&self, name: &ResourceTypeName) -> StoreResult<Option<ResourceType>> {
        let row = sqlx::query("SELECT id, name FROM resource_types WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_resource_type", e))?;
        row.as_ref().map(resource_type_from_row).transpose()
    }

    #[instrument(skip(self), fields(resource_type_id = %id), err)]
    async fn delete_resource_type(&self, id: ResourceTypeId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM resource_types WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_resource_type", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %role, resource_type_id = %resource_type), err)]
    async fn create_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule> {
        let sql = format!(
            r#"
            INSERT INTO permission_rules ({RULE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RULE_COLUMNS}
            "#
        );
        let row = bind_grants(
            sqlx::query(&sql)
                .bind(RuleId::new().as_uuid())
                .bind(role.as_uuid())
                .bind(resource_type.as_uuid()),
            grants,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_rule", e))?;
        rule_from_row(&row).map_err(|e| map_sqlx_error("decode_rule", e))
    }

    #[instrument(skip(self), fields(role_id = %role, resource_type_id = %resource_type), err)]
    async fn upsert_rule(
        &self,
        role: RoleId,
        resource_type: ResourceTypeId,
        grants: Grants,
    ) -> StoreResult<PermissionRule> {
        let sql = format!(
            r#"
            INSERT INTO permission_rules ({RULE_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (role_id, resource_type_id) DO UPDATE SET
                can_create = EXCLUDED.can_create,
                can_read = EXCLUDED.can_read,
                can_update = EXCLUDED.can_update,
                can_delete = EXCLUDED.can_delete
            RETURNING {RULE_COLUMNS}
            "#
        );
        let row = bind_grants(
            sqlx::query(&sql)
                .bind(RuleId::new().as_uuid())
                .bind(role.as_uuid())
                .bind(resource_type.as_uuid()),
            grants,
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_rule", e))?;
        rule_from_row(&row).map_err(|e| map_sqlx_error("decode_rule", e))
    }

    #[instrument(skip(self, patch), fields(rule_id = %id), err)]
    async fn update_rule(&self, id: RuleId, patch: GrantsPatch) -> StoreResult<PermissionRule> {
        let sql = format!(
            r#"
            UPDATE permission_rules SET
                can_create = COALESCE($2, can_create),
                can_read = COALESCE($3, can_read),
                can_update = COALESCE($4, can_update),
                can_delete = COALESCE($5, can_delete)
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(patch.can_create)
            .bind(patch.can_read)
            .bind(patch.can_update)
            .bind(patch.can_delete)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_rule", e))?
            .ok_or(StoreError::NotFound)?;
        rule_from_row(&row).map_err(|e| map_sqlx_error("decode_rule", e))
    }

    #[instrument(skip(self), fields(rule_id = %id), err)]
    async fn get_rule(&self, id: RuleId) -> StoreResult<PermissionRule> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM permission_rules WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_rule", e))?
            .ok_or(StoreError::NotFound)?;
        rule_from_row(&row).map_err(|e| map_sqlx_error("decode_rule", e))
    }

    #[instrument(skip(self), err)]
    async fn list_rules(&self) -> StoreResult<Vec<PermissionRule>> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM permission_rules ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_rules", e))?;
        rows.iter()
            .map(|r| rule_from_row(r).map_err(|e| map_sqlx_error("decode_rule", e)))
            .collect()
    }

    #[instrument(skip(self), fields(rule_id = %id), err)]
    async fn delete_rule(&self, id: RuleId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM permission_rules WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_rule", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, roles), fields(resource_type = %resource_type, role_count = roles.len()), err)]
    async fn rule_snapshot(
        &self,
        roles: &BTreeSet<RoleId>,
        resource_type: &ResourceTypeName,
    ) -> StoreResult<RuleSnapshot> {
        let role_ids: Vec<Uuid> = roles.iter().map(|r| *r.as_uuid()).collect();
        // One row per matching rule, or a single row with NULL rule columns
        // when the type is registered but no role has a rule for it.
        let rows = sqlx::query(
            r#"
            SELECT
                rt.id AS resource_type_id,
                r.role_id,
                r.can_create,
                r.can_read,
                r.can_update,
                r.can_delete
            FROM resource_types rt
            LEFT JOIN permission_rules r
                ON r.resource_type_id = rt.id AND r.role_id = ANY($2)
            WHERE rt.name = $1
            "#,
        )
        .bind(resource_type.as_str())
        .bind(&role_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("rule_snapshot", e))?;

        let Some(first) = rows.first() else {
            return Ok(RuleSnapshot::unregistered());
        };
        let decode = |e: sqlx::Error| map_sqlx_error("decode_rule_snapshot", e);
        let rt_id = ResourceTypeId::from_uuid(first.try_get("resource_type_id").map_err(decode)?);

        let mut grants = Vec::with_capacity(rows.len());
        for row in &rows {
            let role: Option<Uuid> = row.try_get("role_id").map_err(decode)?;
            let Some(role) = role else { continue };
            grants.push((
                RoleId::from_uuid(role),
                Grants {
                    can_create: row.try_get("can_create").map_err(decode)?,
                    can_read: row.try_get("can_read").map_err(decode)?,
                    can_update: row.try_get("can_update").map_err(decode)?,
                    can_delete: row.try_get("can_delete").map_err(decode)?,
                },
            ));
        }
        Ok(RuleSnapshot::new(resource_type.clone(), rt_id, grants))
    }
}

fn bind_grants<'q>(
    query: Query<'q, Postgres, PgArguments>,
    grants: Grants,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(grants.can_create)
        .bind(grants.can_read)
        .bind(grants.can_update)
        .bind(grants.can_delete)
}

// ─────────────────────────────────────────────────────────────────────────────
// Owned resource tables
// ─────────────────────────────────────────────────────────────────────────────

/// Table mapping for an owned resource.
///
/// `COLUMNS` lists the id first and the owner column last; `bind_insert` binds
/// values in that order and `bind_update` binds the mutable columns starting at
/// `$3` (`$1` is the id, `$2` the owner).
pub trait PgOwned: OwnedResource {
    const TABLE: &'static str;
    const OWNER_COLUMN: &'static str;
    const COLUMNS: &'static str;
    const INSERT_PLACEHOLDERS: &'static str;
    const UPDATE_SET: &'static str;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
    fn bind_insert<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments>;
    fn bind_update<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments>;
}

fn decode_price(raw: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

impl PgOwned for Order {
    const TABLE: &'static str = "orders";
    const OWNER_COLUMN: &'static str = "owner_id";
    const COLUMNS: &'static str = "id, item, price, created_at, owner_id";
    const INSERT_PLACEHOLDERS: &'static str = "$1, $2, $3, $4, $5";
    const UPDATE_SET: &'static str = "item = $3, price = $4";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let owner: Option<Uuid> = row.try_get("owner_id")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get("id")?),
            item: row.try_get("item")?,
            price: decode_price(row.try_get("price")?)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            owner: owner.map(PrincipalId::from_uuid),
        })
    }

    fn bind_insert<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.id.as_uuid())
            .bind(&self.item)
            // Bounded by MAX_PRICE, which fits in i64.
            .bind(self.price as i64)
            .bind(self.created_at)
            .bind(self.owner.map(Uuid::from))
    }

    fn bind_update<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query.bind(&self.item).bind(self.price as i64)
    }
}

impl PgOwned for Report {
    const TABLE: &'static str = "reports";
    const OWNER_COLUMN: &'static str = "author_id";
    const COLUMNS: &'static str = "id, title, content, created_at, author_id";
    const INSERT_PLACEHOLDERS: &'static str = "$1, $2, $3, $4, $5";
    const UPDATE_SET: &'static str = "title = $3, content = $4";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let author: Option<Uuid> = row.try_get("author_id")?;
        Ok(Report {
            id: ReportId::from_uuid(row.try_get("id")?),
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            author: author.map(PrincipalId::from_uuid),
        })
    }

    fn bind_insert<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.id.as_uuid())
            .bind(&self.title)
            .bind(&self.content)
            .bind(self.created_at)
            .bind(self.author.map(Uuid::from))
    }

    fn bind_update<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query.bind(&self.title).bind(&self.content)
    }
}

#[async_trait]
impl<R> OwnedStore<R> for PostgresStore
where
    R: PgOwned,
{
    #[instrument(skip(self, row), fields(table = R::TABLE, id = %row.id()), err)]
    async fn insert(&self, row: R) -> StoreResult<R> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            R::COLUMNS,
            R::INSERT_PLACEHOLDERS
        );
        row.bind_insert(sqlx::query(&sql))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_owned", e))?;
        Ok(row)
    }

    #[instrument(skip(self), fields(table = R::TABLE, owner = %owner, row_count = tracing::field::Empty), err)]
    async fn list_by_owner(&self, owner: PrincipalId, page: Page) -> StoreResult<Paged<R>> {
        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {} = $1", R::TABLE, R::OWNER_COLUMN);
        let list_sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 ORDER BY id LIMIT $2 OFFSET $3",
            R::COLUMNS,
            R::TABLE,
            R::OWNER_COLUMN
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        let count: i64 = sqlx::query_scalar(&count_sql)
            .bind(owner.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_owned", e))?;
        let rows = sqlx::query(&list_sql)
            .bind(owner.as_uuid())
            .bind(i64::from(page.size))
            .bind(page.offset() as i64)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("list_owned", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let results = rows
            .iter()
            .map(R::from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_owned", e))?;
        Span::current().record("row_count", results.len());
        Ok(Paged {
            count: count.max(0) as u64,
            page: page.number,
            page_size: page.size,
            results,
        })
    }

    #[instrument(skip(self), fields(table = R::TABLE, owner = %owner, id = %id), err)]
    async fn get_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<Option<R>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND {} = $2",
            R::COLUMNS,
            R::TABLE,
            R::OWNER_COLUMN
        );
        let row = sqlx::query(&sql)
            .bind(Into::<Uuid>::into(id))
            .bind(owner.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_owned", e))?;
        row.as_ref()
            .map(R::from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_owned", e))
    }

    #[instrument(skip(self, patch), fields(table = R::TABLE, owner = %owner, id = %id), err)]
    async fn update_owned(&self, owner: PrincipalId, id: R::Id, patch: R::Patch) -> StoreResult<Option<R>> {
        let select_sql = format!(
            "SELECT {} FROM {} WHERE id = $1 AND {} = $2 FOR UPDATE",
            R::COLUMNS,
            R::TABLE,
            R::OWNER_COLUMN
        );
        let update_sql = format!(
            "UPDATE {} SET {} WHERE id = $1 AND {} = $2",
            R::TABLE,
            R::UPDATE_SET,
            R::OWNER_COLUMN
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(&select_sql)
            .bind(Into::<Uuid>::into(id))
            .bind(owner.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_owned", e))?;
        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };

        let mut current = R::from_row(&row).map_err(|e| map_sqlx_error("decode_owned", e))?;
        if let Err(e) = current.apply_patch(patch) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e.into());
        }

        current
            .bind_update(sqlx::query(&update_sql).bind(Into::<Uuid>::into(id)).bind(owner.as_uuid()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_owned", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(current))
    }

    #[instrument(skip(self), fields(table = R::TABLE, owner = %owner, id = %id), err)]
    async fn delete_owned(&self, owner: PrincipalId, id: R::Id) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1 AND {} = $2", R::TABLE, R::OWNER_COLUMN);
        let result = sqlx::query(&sql)
            .bind(Into::<Uuid>::into(id))
            .bind(owner.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_owned", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map SQLx errors to `StoreError`, keeping the operation name for logs.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(conflict_message(db_err.constraint())),
                Some("23503") => StoreError::Validation(
                    "referenced role, resource type or principal does not exist".to_string(),
                ),
                Some("23514") => StoreError::Validation(msg),
                _ => StoreError::Unexpected(anyhow::anyhow!(msg)),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Unexpected(anyhow::anyhow!("sqlx error in {}: {}", operation, err)),
    }
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("principals_email_key") => "a user with this email already exists".to_string(),
        Some("roles_name_key") => "a role with this name already exists".to_string(),
        Some("resource_types_name_key") => "a resource type with this name already exists".to_string(),
        Some("permission_rules_role_id_resource_type_id_key") => {
            "a rule for this role and resource type already exists".to_string()
        }
        _ => "unique constraint violated".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::Action;

    /// Connects to `DATABASE_URL` and bootstraps the schema; `None` when unset.
    async fn store() -> Option<PostgresStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PostgresStore::connect(&url).await.unwrap();
        store.ensure_schema().await.unwrap();
        Some(store)
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::now_v7().simple())
    }

    #[tokio::test]
    #[ignore = "needs a Postgres reachable through DATABASE_URL"]
    async fn rule_snapshot_reads_the_rules_of_the_given_roles() {
        let Some(store) = store().await else { return };
        let rt = store
            .register_resource_type(ResourceTypeName::parse(&unique("docs")).unwrap())
            .await
            .unwrap();
        let reader = store.create_role(RoleName::parse(&unique("reader")).unwrap()).await.unwrap();
        let writer = store.create_role(RoleName::parse(&unique("writer")).unwrap()).await.unwrap();
        let outsider = store.create_role(RoleName::parse(&unique("outsider")).unwrap()).await.unwrap();
        store.create_rule(reader.id, rt.id, Grants::only(&[Action::Read])).await.unwrap();
        store.create_rule(writer.id, rt.id, Grants::only(&[Action::Create])).await.unwrap();
        store.create_rule(outsider.id, rt.id, Grants::ALL).await.unwrap();

        let roles = BTreeSet::from([reader.id, writer.id]);
        let snapshot = store.rule_snapshot(&roles, &rt.name).await.unwrap();
        assert!(snapshot.is_registered());
        assert_eq!(snapshot.effective_grants(), Grants::only(&[Action::Read, Action::Create]));

        // Registered type, but none of the roles has a rule for it.
        let snapshot = store.rule_snapshot(&BTreeSet::new(), &rt.name).await.unwrap();
        assert!(snapshot.is_registered());
        assert!(snapshot.effective_grants().is_empty());

        let missing = ResourceTypeName::parse(&unique("invoices")).unwrap();
        let snapshot = store.rule_snapshot(&roles, &missing).await.unwrap();
        assert!(!snapshot.is_registered());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres reachable through DATABASE_URL"]
    async fn duplicate_rule_pair_conflicts_and_upsert_overwrites() {
        let Some(store) = store().await else { return };
        let rt = store
            .register_resource_type(ResourceTypeName::parse(&unique("ledgers")).unwrap())
            .await
            .unwrap();
        let role = store.create_role(RoleName::parse(&unique("clerk")).unwrap()).await.unwrap();

        let rule = store.create_rule(role.id, rt.id, Grants::only(&[Action::Read])).await.unwrap();
        let err = store.create_rule(role.id, rt.id, Grants::ALL).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let upserted = store.upsert_rule(role.id, rt.id, Grants::only(&[Action::Update])).await.unwrap();
        assert_eq!(upserted.id, rule.id);
        assert_eq!(upserted.grants, Grants::only(&[Action::Update]));

        let dup_role = store.create_role(role.name.clone()).await.unwrap_err();
        assert!(matches!(dup_role, StoreError::Conflict(_)));

        let err = store
            .create_rule(RoleId::new(), rt.id, Grants::ALL)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
