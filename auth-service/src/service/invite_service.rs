//! # Invite Orchestrator
//!
//! Issues and accepts invites to an organization or project. Acceptance is
//! the one place this service needs a hand-rolled transaction: membership
//! creation, the baseline role grant, and the invite's deletion all have to
//! land together, or not at all, so a crash between steps never leaves
//! someone a member with no role or consumes an invite nobody actually
//! joined with.

use std::sync::Arc;

use chrono::Utc;
use shared::errors::ApiError;
use shared::rbac::role::seed;
use uuid::Uuid;

use crate::domain::{Invite, NewInvite, NewMember, NewRoleAssignment, PLATFORM_ID};
use crate::repository::{
    InviteRepository, OrganizationMemberRepository, OrganizationRepository, ProjectMemberRepository,
    ProjectRepository, RoleAssignmentRepository, RoleRepository,
};

/// Which tenancy node an invite targets, and therefore which membership
/// table and baseline role apply on acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteResourceKind {
    Organization,
    Project,
}

#[derive(Clone)]
pub struct InviteService {
    invites: Arc<InviteRepository>,
    organizations: Arc<OrganizationRepository>,
    projects: Arc<ProjectRepository>,
    org_members: Arc<OrganizationMemberRepository>,
    project_members: Arc<ProjectMemberRepository>,
    roles: Arc<RoleRepository>,
    role_assignments: Arc<RoleAssignmentRepository>,
}

impl InviteService {
    pub fn new(
        invites: Arc<InviteRepository>,
        organizations: Arc<OrganizationRepository>,
        projects: Arc<ProjectRepository>,
        org_members: Arc<OrganizationMemberRepository>,
        project_members: Arc<ProjectMemberRepository>,
        roles: Arc<RoleRepository>,
        role_assignments: Arc<RoleAssignmentRepository>,
    ) -> Self {
        Self {
            invites,
            organizations,
            projects,
            org_members,
            project_members,
            roles,
            role_assignments,
        }
    }

    async fn resource_kind(&self, resource_id: Uuid) -> Result<InviteResourceKind, ApiError> {
        if resource_id == PLATFORM_ID {
            return Err(ApiError::BadRequest {
                message: "cannot invite to the platform root".to_string(),
            });
        }
        if self.projects.find_by_id(resource_id).await?.is_some() {
            return Ok(InviteResourceKind::Project);
        }
        if self.organizations.find_by_id(resource_id).await?.is_some() {
            return Ok(InviteResourceKind::Organization);
        }
        Err(ApiError::NotFound {
            resource: format!("resource:{resource_id}"),
        })
    }

    /// Returns the live invite for `(email, resource_id)` if one exists;
    /// otherwise deletes any expired leftover and creates a fresh one. A
    /// second invite request for someone already invited is idempotent
    /// rather than an error — re-sending an invite email shouldn't require
    /// the caller to first look up and cancel the old one.
    pub async fn create(
        &self,
        resource_id: Uuid,
        email: String,
        invited_by: Uuid,
        temporary_token: String,
        ttl: chrono::Duration,
    ) -> Result<Invite, ApiError> {
        self.resource_kind(resource_id).await?;

        if let Some(existing) = self
            .invites
            .find_by_email_and_resource(&email, resource_id)
            .await?
        {
            if !existing.is_expired(Utc::now()) {
                return Ok(existing);
            }
            self.invites.delete(existing.id).await?;
        }

        self.invites
            .create(NewInvite {
                resource_id,
                email,
                invited_by,
                temporary_token,
                expires_at: Utc::now() + ttl,
                metadata: serde_json::json!({}),
            })
            .await
    }

    /// Accepts an invite by its token, seating `user_id` as a member and
    /// granting the resource kind's baseline viewer role, then consuming
    /// the invite — all inside one transaction via `InviteRepository::pool`,
    /// since a partial failure here must roll back rather than leave a
    /// membership with no role or a consumed invite nobody joined with.
    pub async fn accept(&self, token: &str, user_id: Uuid) -> Result<(), ApiError> {
        let invite = self
            .invites
            .find_by_token(token)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: "invite".to_string(),
            })?;

        if invite.is_expired(Utc::now()) {
            return Err(ApiError::Expired {
                kind: "invite".to_string(),
            });
        }

        let kind = self.resource_kind(invite.resource_id).await?;
        let baseline_role_name = match kind {
            InviteResourceKind::Organization => seed::ORGANIZATION_VIEWER,
            InviteResourceKind::Project => seed::PROJECT_VIEWER,
        };
        let baseline_role = self
            .roles
            .find_by_name(baseline_role_name)
            .await?
            .ok_or_else(|| ApiError::InternalError {
                message: format!("baseline role {baseline_role_name} is not seeded"),
            })?;

        let mut tx = self.invites.pool().begin().await.map_err(ApiError::DatabaseError)?;

        let new_member = NewMember {
            resource_id: invite.resource_id,
            user_id,
            metadata: serde_json::json!({}),
        };
        match kind {
            InviteResourceKind::Organization => {
                self.org_members.add_in_transaction(&mut tx, new_member).await?
            }
            InviteResourceKind::Project => {
                self.project_members.add_in_transaction(&mut tx, new_member).await?
            }
        };

        self.role_assignments
            .create_in_transaction(
                &mut tx,
                NewRoleAssignment {
                    target_id: user_id,
                    role_id: baseline_role.id,
                    resource_id: invite.resource_id,
                },
            )
            .await?;

        self.invites.delete_in_transaction(&mut tx, invite.id).await?;

        tx.commit().await.map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Invite, ApiError> {
        self.invites
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("invite:{id}"),
            })
    }

    pub async fn cancel(&self, id: Uuid) -> Result<(), ApiError> {
        self.invites.delete(id).await
    }
}
