//! # Role Assignment Repository
//!
//! CRUD over `role_assignments`, plus the [`RoleAssignmentLookup`]
//! implementation the permission evaluator queries for each hop up the
//! tenancy tree.

use async_trait::async_trait;
use shared::errors::ApiError;
use shared::rbac::RoleAssignmentLookup;
use sqlx::PgPool;
use uuid::Uuid;

use super::role_repository::to_rbac_role;
use super::{map_unique_violation, Cursor};
use crate::domain::{NewRoleAssignment, Role, RoleAssignment};

#[derive(Debug, Clone)]
pub struct RoleAssignmentRepository {
    pool: PgPool,
}

impl RoleAssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        new_assignment: NewRoleAssignment,
    ) -> Result<RoleAssignment, ApiError> {
        sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments (target_id, role_id, resource_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_assignment.target_id)
        .bind(new_assignment.role_id)
        .bind(new_assignment.resource_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, "idx_role_assignments_unique", "role_assignment")
        })
    }

    /// Same insert, scoped to an already-open transaction — the invite
    /// orchestrator's atomic accept path grants the baseline role alongside
    /// the membership row it creates.
    pub async fn create_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new_assignment: NewRoleAssignment,
    ) -> Result<RoleAssignment, ApiError> {
        sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments (target_id, role_id, resource_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_assignment.target_id)
        .bind(new_assignment.role_id)
        .bind(new_assignment.resource_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            map_unique_violation(e, "idx_role_assignments_unique", "role_assignment")
        })
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<RoleAssignment>, ApiError> {
        sqlx::query_as::<_, RoleAssignment>("SELECT * FROM role_assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    /// Every assignment `target_id` holds directly at `resource_id` (not
    /// including inherited ones from ancestor resources).
    pub async fn list_for_target_and_resource(
        &self,
        target_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, ApiError> {
        sqlx::query_as::<_, RoleAssignment>(
            "SELECT * FROM role_assignments WHERE target_id = $1 AND resource_id = $2",
        )
        .bind(target_id)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn list_for_resource(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<RoleAssignment>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, RoleAssignment>(
                    r#"SELECT * FROM role_assignments
                       WHERE resource_id = $1 AND (assigned_at, id) < ($2, $3)
                       ORDER BY assigned_at DESC, id DESC LIMIT $4"#,
                )
                .bind(resource_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, RoleAssignment>(
                    r#"SELECT * FROM role_assignments WHERE resource_id = $1
                       ORDER BY assigned_at DESC, id DESC LIMIT $2"#,
                )
                .bind(resource_id)
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

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM role_assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("role_assignment:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(assignment: &RoleAssignment) -> Cursor {
        Cursor {
            created_at: assignment.assigned_at,
            id: assignment.id,
        }
    }
}

#[async_trait]
impl RoleAssignmentLookup for RoleAssignmentRepository {
    async fn assigned_roles(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<shared::rbac::Role>, ApiError> {
        let rows: Vec<(Uuid, String, Vec<String>, Option<Uuid>)> = sqlx::query_as(
            r#"
            SELECT r.id, r.name, r.permissions, r.parent_id
            FROM role_assignments ra
            JOIN roles r ON r.id = ra.role_id
            WHERE ra.target_id = $1 AND ra.resource_id = $2 AND r.disabled = false
            "#,
        )
        .bind(principal_id)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(rows
            .into_iter()
            .map(|(id, name, permissions, parent_id)| {
                to_rbac_role(&Role {
                    id,
                    name,
                    permissions,
                    parent_id,
                    disabled: false,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_role_assignment_struct() {
        let new_assignment = NewRoleAssignment {
            target_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
        };
        assert_ne!(new_assignment.target_id, new_assignment.role_id);
    }
}
