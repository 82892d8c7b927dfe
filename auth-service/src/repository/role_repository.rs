//! # Role Repository
//!
//! CRUD over `roles`. Cycle detection itself lives in
//! [`shared::rbac::role::RoleGraph`]; this repository's job is to load the
//! full role set so the service layer can build a graph and check
//! `would_create_cycle` before persisting a `parent_id` change.

use shared::errors::ApiError;
use shared::rbac::permission::Permission;
use shared::rbac::role::Role as RbacRole;
use sqlx::PgPool;
use uuid::Uuid;

use super::{map_unique_violation, Cursor, Order};
use crate::domain::{NewRole, Role};

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_role: NewRole) -> Result<Role, ApiError> {
        sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, permissions, parent_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_role.name)
        .bind(&new_role.permissions)
        .bind(new_role.parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_roles_name", "role"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, ApiError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, ApiError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    /// Every role, disabled included, for building a fresh `RoleGraph` —
    /// `to_rbac_role` is what zeroes a disabled role's permissions, not this
    /// query, since the graph still needs the role present for descendants
    /// to walk through it. Role counts are small relative to request volume,
    /// so this is a full table scan rather than a bounded page.
    pub async fn list_all(&self) -> Result<Vec<Role>, ApiError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn list(
        &self,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<Role>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, Role>(
                    r#"SELECT * FROM roles
                       WHERE (created_at, id) < ($1, $2)
                       ORDER BY created_at DESC, id DESC LIMIT $3"#,
                )
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Desc, None) => {
                sqlx::query_as::<_, Role>(
                    "SELECT * FROM roles ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, Role>(
                    r#"SELECT * FROM roles
                       WHERE (created_at, id) > ($1, $2)
                       ORDER BY created_at ASC, id ASC LIMIT $3"#,
                )
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, None) => {
                sqlx::query_as::<_, Role>(
                    "SELECT * FROM roles ORDER BY created_at ASC, id ASC LIMIT $1",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(ApiError::DatabaseError)?;

        let has_more = rows.len() as i64 > limit;
        let mut rows = rows;
        rows.truncate(limit as usize);
        Ok((rows, has_more))
    }

    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        permissions: Option<Vec<String>>,
        parent_id: Option<Option<Uuid>>,
    ) -> Result<Role, ApiError> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("role:{id}"),
            })?;

        let new_name = name.map(str::to_string).unwrap_or(current.name);
        let new_permissions = permissions.unwrap_or(current.permissions);
        let new_parent_id = parent_id.unwrap_or(current.parent_id);

        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $1, permissions = $2, parent_id = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(new_name)
        .bind(new_permissions)
        .bind(new_parent_id)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_roles_name", "role"))
    }

    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE roles SET disabled = $1, updated_at = NOW() WHERE id = $2")
            .bind(disabled)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("role:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(role: &Role) -> Cursor {
        Cursor {
            created_at: role.created_at,
            id: role.id,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Loads every role `FOR UPDATE`, scoped to an already-open transaction.
    /// Used by the service layer to build a `RoleGraph` and run
    /// `would_create_cycle` inside the same write unit that performs the
    /// `parent_id` mutation, per §5's concurrency model — row locks held for
    /// the transaction's lifetime prevent a concurrent reparenting from
    /// slipping a cycle past a stale snapshot.
    pub async fn list_all_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Vec<Role>, ApiError> {
        sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY created_at ASC FOR UPDATE")
            .fetch_all(&mut **tx)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn update_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        name: Option<&str>,
        permissions: Option<Vec<String>>,
        parent_id: Option<Option<Uuid>>,
    ) -> Result<Role, ApiError> {
        let current = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(ApiError::DatabaseError)?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("role:{id}"),
            })?;

        let new_name = name.map(str::to_string).unwrap_or(current.name);
        let new_permissions = permissions.unwrap_or(current.permissions);
        let new_parent_id = parent_id.unwrap_or(current.parent_id);

        sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = $1, permissions = $2, parent_id = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(new_name)
        .bind(new_permissions)
        .bind(new_parent_id)
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, "idx_roles_name", "role"))
    }
}

/// Converts a persisted role row into the evaluator's in-memory
/// representation. A permission string that no longer maps to a known
/// [`Permission`] variant (e.g. left behind by a downgrade) is dropped
/// rather than rejected outright — stale grants should shrink, not crash
/// evaluation for every principal holding the role.
///
/// A disabled role keeps its place in the graph (it must still be reachable
/// so a descendant role's ancestor walk doesn't break), but its own
/// permission set comes back empty: disabled roles contribute nothing.
pub fn to_rbac_role(role: &Role) -> RbacRole {
    RbacRole {
        id: role.id,
        name: role.name.clone(),
        parent_id: role.parent_id,
        permissions: if role.disabled {
            Vec::new()
        } else {
            role.permissions
                .iter()
                .filter_map(|s| Permission::from_str(s))
                .collect()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_role(permissions: Vec<String>) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "Sample".to_string(),
            permissions,
            parent_id: None,
            disabled: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_to_rbac_role_drops_unknown_permission_strings() {
        let role = sample_role(vec!["user.get".to_string(), "not.a.real.permission".to_string()]);
        let rbac_role = to_rbac_role(&role);
        assert_eq!(rbac_role.permissions.len(), 1);
    }

    #[test]
    fn test_to_rbac_role_preserves_identity() {
        let role = sample_role(vec![]);
        let rbac_role = to_rbac_role(&role);
        assert_eq!(rbac_role.id, role.id);
        assert_eq!(rbac_role.name, role.name);
    }

    #[test]
    fn test_to_rbac_role_disabled_contributes_no_permissions() {
        let mut role = sample_role(vec!["user.get".to_string()]);
        role.disabled = true;
        let rbac_role = to_rbac_role(&role);
        assert!(rbac_role.permissions.is_empty());
        // Still present under its own id/parent so descendants can walk through it.
        assert_eq!(rbac_role.id, role.id);
    }
}
