//! # Tenancy Service
//!
//! Business logic for organizations, projects, and their memberships.
//! Permission checks are the caller's job (the HTTP layer calls
//! `PermissionService::check` before invoking these methods); this service
//! enforces the invariants the repository layer can't: a project must name
//! a live organization, and a new member must not already be seated.

use std::sync::Arc;

use shared::errors::ApiError;
use uuid::Uuid;

use crate::domain::{Member, NewMember, NewOrganization, NewProject, Organization, Project};
use crate::repository::{
    Cursor, Order, OrganizationMemberRepository, OrganizationRepository, ProjectMemberRepository,
    ProjectRepository,
};

#[derive(Clone)]
pub struct TenancyService {
    organizations: Arc<OrganizationRepository>,
    projects: Arc<ProjectRepository>,
    org_members: Arc<OrganizationMemberRepository>,
    project_members: Arc<ProjectMemberRepository>,
}

impl TenancyService {
    pub fn new(
        organizations: Arc<OrganizationRepository>,
        projects: Arc<ProjectRepository>,
        org_members: Arc<OrganizationMemberRepository>,
        project_members: Arc<ProjectMemberRepository>,
    ) -> Self {
        Self {
            organizations,
            projects,
            org_members,
            project_members,
        }
    }

    pub async fn create_organization(&self, new_org: NewOrganization) -> Result<Organization, ApiError> {
        self.organizations.create(new_org).await
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Organization, ApiError> {
        self.organizations
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("organization:{id}"),
            })
    }

    pub async fn list_organizations(
        &self,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<Organization>, bool), ApiError> {
        self.organizations.list(cursor, limit, order).await
    }

    pub async fn update_organization(
        &self,
        id: Uuid,
        name: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Organization, ApiError> {
        self.organizations.update(id, name, metadata).await
    }

    pub async fn set_organization_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        self.organizations.set_disabled(id, disabled).await
    }

    /// Creates a project under `organization_id`, rejecting the request
    /// outright if the organization doesn't exist or is disabled — a
    /// disabled organization's tree is frozen, new children included.
    pub async fn create_project(&self, new_project: NewProject) -> Result<Project, ApiError> {
        let org = self
            .organizations
            .find_by_id(new_project.organization_id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("organization:{}", new_project.organization_id),
            })?;
        if org.disabled {
            return Err(ApiError::Forbidden {
                resource_id: org.id.to_string(),
            });
        }
        self.projects.create(new_project).await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Project, ApiError> {
        self.projects
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("project:{id}"),
            })
    }

    pub async fn list_projects_by_organization(
        &self,
        organization_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<Project>, bool), ApiError> {
        self.projects
            .list_by_organization(organization_id, cursor, limit, order)
            .await
    }

    pub async fn update_project(
        &self,
        id: Uuid,
        name: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> Result<Project, ApiError> {
        self.projects.update(id, name, metadata).await
    }

    pub async fn set_project_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        self.projects.set_disabled(id, disabled).await
    }

    pub async fn add_organization_member(&self, new_member: NewMember) -> Result<Member, ApiError> {
        self.org_members.add(new_member).await
    }

    pub async fn list_organization_members(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<Member>, bool), ApiError> {
        self.org_members.list(resource_id, cursor, limit).await
    }

    pub async fn remove_organization_member(&self, resource_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.org_members.remove(resource_id, user_id).await
    }

    pub async fn add_project_member(&self, new_member: NewMember) -> Result<Member, ApiError> {
        self.project_members.add(new_member).await
    }

    pub async fn list_project_members(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<Member>, bool), ApiError> {
        self.project_members.list(resource_id, cursor, limit).await
    }

    pub async fn remove_project_member(&self, resource_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
        self.project_members.remove(resource_id, user_id).await
    }
}
