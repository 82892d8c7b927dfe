//! # Tenancy Repository
//!
//! CRUD over `organizations`, `projects`, and their membership tables, plus
//! [`TenancyHierarchy`], the [`ResourceHierarchy`] implementation the
//! permission evaluator walks to climb from a project to its organization
//! to the platform root.

use async_trait::async_trait;
use shared::errors::ApiError;
use shared::rbac::ResourceHierarchy;
use sqlx::PgPool;
use uuid::Uuid;

use super::{map_unique_violation, Cursor, Order};
use crate::domain::{
    Member, NewMember, NewOrganization, NewProject, Organization, Project, PLATFORM_ID,
};

#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_org: NewOrganization) -> Result<Organization, ApiError> {
        sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, metadata)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&new_org.name)
        .bind(&new_org.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_organizations_name", "organization"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>, ApiError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Organization>, ApiError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn list(
        &self,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<Organization>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, Organization>(
                    r#"SELECT * FROM organizations
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
                sqlx::query_as::<_, Organization>(
                    "SELECT * FROM organizations ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, Organization>(
                    r#"SELECT * FROM organizations
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
                sqlx::query_as::<_, Organization>(
                    "SELECT * FROM organizations ORDER BY created_at ASC, id ASC LIMIT $1",
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
        metadata: Option<serde_json::Value>,
    ) -> Result<Organization, ApiError> {
        sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = COALESCE($1, name),
                metadata = COALESCE($2, metadata),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(metadata)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_organizations_name", "organization"))?
        .ok_or_else(|| ApiError::NotFound {
            resource: format!("organization:{id}"),
        })
    }

    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE organizations SET disabled = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(disabled)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("organization:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(org: &Organization) -> Cursor {
        Cursor {
            created_at: org.created_at,
            id: org.id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_project: NewProject) -> Result<Project, ApiError> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (organization_id, name, metadata)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_project.organization_id)
        .bind(&new_project.name)
        .bind(&new_project.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_projects_org_name", "project"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, ApiError> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_org_and_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Option<Project>, ApiError> {
        sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE organization_id = $1 AND name = $2",
        )
        .bind(organization_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn list_by_organization(
        &self,
        organization_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<Project>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, Project>(
                    r#"SELECT * FROM projects
                       WHERE organization_id = $1 AND (created_at, id) < ($2, $3)
                       ORDER BY created_at DESC, id DESC LIMIT $4"#,
                )
                .bind(organization_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Desc, None) => {
                sqlx::query_as::<_, Project>(
                    r#"SELECT * FROM projects WHERE organization_id = $1
                       ORDER BY created_at DESC, id DESC LIMIT $2"#,
                )
                .bind(organization_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, Project>(
                    r#"SELECT * FROM projects
                       WHERE organization_id = $1 AND (created_at, id) > ($2, $3)
                       ORDER BY created_at ASC, id ASC LIMIT $4"#,
                )
                .bind(organization_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, None) => {
                sqlx::query_as::<_, Project>(
                    r#"SELECT * FROM projects WHERE organization_id = $1
                       ORDER BY created_at ASC, id ASC LIMIT $2"#,
                )
                .bind(organization_id)
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
        metadata: Option<serde_json::Value>,
    ) -> Result<Project, ApiError> {
        sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($1, name),
                metadata = COALESCE($2, metadata),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(metadata)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_projects_org_name", "project"))?
        .ok_or_else(|| ApiError::NotFound {
            resource: format!("project:{id}"),
        })
    }

    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        let result =
            sqlx::query("UPDATE projects SET disabled = $1, updated_at = NOW() WHERE id = $2")
                .bind(disabled)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("project:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(project: &Project) -> Cursor {
        Cursor {
            created_at: project.created_at,
            id: project.id,
        }
    }
}

/// Membership CRUD shared in shape by organizations and projects, but kept
/// as two repositories (rather than one parameterized over table name)
/// since sqlx's `query_as!` needs the table name at compile time and the
/// two tables have independent foreign keys.
#[derive(Debug, Clone)]
pub struct OrganizationMemberRepository {
    pool: PgPool,
}

impl OrganizationMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, new_member: NewMember) -> Result<Member, ApiError> {
        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO organization_members (resource_id, user_id, metadata)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_member.resource_id)
        .bind(new_member.user_id)
        .bind(&new_member.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "organization_members_pkey", "organization_member"))
    }

    /// Same insert, scoped to an already-open transaction — the invite
    /// orchestrator's atomic accept path.
    pub async fn add_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new_member: NewMember,
    ) -> Result<Member, ApiError> {
        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO organization_members (resource_id, user_id, metadata)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_member.resource_id)
        .bind(new_member.user_id)
        .bind(&new_member.metadata)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, "organization_members_pkey", "organization_member"))
    }

    pub async fn find(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>, ApiError> {
        sqlx::query_as::<_, Member>(
            "SELECT * FROM organization_members WHERE resource_id = $1 AND user_id = $2",
        )
        .bind(resource_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn list(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<Member>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, Member>(
                    r#"SELECT * FROM organization_members
                       WHERE resource_id = $1 AND (joined_at, user_id) < ($2, $3)
                       ORDER BY joined_at DESC, user_id DESC LIMIT $4"#,
                )
                .bind(resource_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Member>(
                    r#"SELECT * FROM organization_members WHERE resource_id = $1
                       ORDER BY joined_at DESC, user_id DESC LIMIT $2"#,
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

    pub async fn remove(&self, resource_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query(
            "DELETE FROM organization_members WHERE resource_id = $1 AND user_id = $2",
        )
        .bind(resource_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("organization_member:{resource_id}:{user_id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(member: &Member) -> Cursor {
        Cursor {
            created_at: member.joined_at,
            id: member.user_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectMemberRepository {
    pool: PgPool,
}

impl ProjectMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn add(&self, new_member: NewMember) -> Result<Member, ApiError> {
        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO project_members (resource_id, user_id, metadata)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_member.resource_id)
        .bind(new_member.user_id)
        .bind(&new_member.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "project_members_pkey", "project_member"))
    }

    /// Same insert, scoped to an already-open transaction — the invite
    /// orchestrator's atomic accept path.
    pub async fn add_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        new_member: NewMember,
    ) -> Result<Member, ApiError> {
        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO project_members (resource_id, user_id, metadata)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(new_member.resource_id)
        .bind(new_member.user_id)
        .bind(&new_member.metadata)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, "project_members_pkey", "project_member"))
    }

    pub async fn find(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Member>, ApiError> {
        sqlx::query_as::<_, Member>(
            "SELECT * FROM project_members WHERE resource_id = $1 AND user_id = $2",
        )
        .bind(resource_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn list(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<Member>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, Member>(
                    r#"SELECT * FROM project_members
                       WHERE resource_id = $1 AND (joined_at, user_id) < ($2, $3)
                       ORDER BY joined_at DESC, user_id DESC LIMIT $4"#,
                )
                .bind(resource_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Member>(
                    r#"SELECT * FROM project_members WHERE resource_id = $1
                       ORDER BY joined_at DESC, user_id DESC LIMIT $2"#,
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

    pub async fn remove(&self, resource_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE resource_id = $1 AND user_id = $2")
                .bind(resource_id)
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("project_member:{resource_id}:{user_id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(member: &Member) -> Cursor {
        Cursor {
            created_at: member.joined_at,
            id: member.user_id,
        }
    }
}

/// [`ResourceHierarchy`] over the tenancy tree: project -> organization ->
/// platform. Holds its own pool clone (cheap; `PgPool` is `Arc`-backed)
/// rather than borrowing `OrganizationRepository`/`ProjectRepository`, so it
/// can be held independently by the permission evaluator's call sites.
#[derive(Debug, Clone)]
pub struct TenancyHierarchy {
    pool: PgPool,
}

impl TenancyHierarchy {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceHierarchy for TenancyHierarchy {
    async fn parent_of(&self, resource_id: Uuid) -> Result<Option<Uuid>, ApiError> {
        if resource_id == PLATFORM_ID {
            return Ok(None);
        }

        let project_parent: Option<(Uuid,)> =
            sqlx::query_as("SELECT organization_id FROM projects WHERE id = $1")
                .bind(resource_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;

        if let Some((organization_id,)) = project_parent {
            return Ok(Some(organization_id));
        }

        let is_organization: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM organizations WHERE id = $1")
                .bind(resource_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;

        if is_organization.is_some() {
            return Ok(Some(PLATFORM_ID));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_organization_struct() {
        let new_org = NewOrganization {
            name: "acme".to_string(),
            metadata: serde_json::json!({}),
        };
        assert_eq!(new_org.name, "acme");
    }

    #[test]
    fn test_platform_id_is_nil_uuid() {
        assert_eq!(PLATFORM_ID, Uuid::nil());
    }
}
