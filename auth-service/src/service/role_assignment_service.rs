//! # Role Assignment Service
//!
//! Grants and revokes roles at a resource. Creation enforces the
//! assignment-legality rule from the permission model: the caller must
//! already hold `iam.setPolicy` at the target resource, and the role being
//! handed out must be one the caller could already exercise there
//! themselves (`PermissionService::can_assign`) — nobody can grant a role
//! stronger than their own.

use std::sync::Arc;

use shared::auth::Principal;
use shared::errors::ApiError;
use shared::rbac::Permission;
use uuid::Uuid;

use crate::domain::{NewRoleAssignment, RoleAssignment};
use crate::repository::{role_repository, Cursor, RoleAssignmentRepository, RoleRepository};
use crate::service::permission_service::PermissionService;

#[derive(Clone)]
pub struct RoleAssignmentService {
    assignments: Arc<RoleAssignmentRepository>,
    roles: Arc<RoleRepository>,
    permissions: Arc<PermissionService>,
}

impl RoleAssignmentService {
    pub fn new(
        assignments: Arc<RoleAssignmentRepository>,
        roles: Arc<RoleRepository>,
        permissions: Arc<PermissionService>,
    ) -> Self {
        Self {
            assignments,
            roles,
            permissions,
        }
    }

    pub async fn create(
        &self,
        assigner: &Principal,
        new_assignment: NewRoleAssignment,
    ) -> Result<RoleAssignment, ApiError> {
        self.permissions
            .check(assigner, new_assignment.resource_id, Permission::IamSetPolicy)
            .await?;

        let role = self
            .roles
            .find_by_id(new_assignment.role_id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("role:{}", new_assignment.role_id),
            })?;
        let rbac_role = role_repository::to_rbac_role(&role);

        let allowed = self
            .permissions
            .can_assign(
                assigner.assignment_target_id(),
                new_assignment.resource_id,
                &rbac_role,
            )
            .await?;
        if !allowed {
            return Err(ApiError::Forbidden {
                resource_id: new_assignment.resource_id.to_string(),
            });
        }

        self.assignments.create(new_assignment).await
    }

    pub async fn list_for_resource(
        &self,
        resource_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<(Vec<RoleAssignment>, bool), ApiError> {
        self.assignments.list_for_resource(resource_id, cursor, limit).await
    }

    pub async fn list_for_target_and_resource(
        &self,
        target_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<RoleAssignment>, ApiError> {
        self.assignments
            .list_for_target_and_resource(target_id, resource_id)
            .await
    }

    pub async fn delete(&self, assigner: &Principal, id: Uuid) -> Result<(), ApiError> {
        let assignment = self
            .assignments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("role_assignment:{id}"),
            })?;
        self.permissions
            .check(assigner, assignment.resource_id, Permission::IamSetPolicy)
            .await?;
        self.assignments.delete(id).await
    }
}
