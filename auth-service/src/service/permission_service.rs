//! # Permission Service
//!
//! Builds a [`PermissionEvaluator`] fresh for each check from the current
//! role graph and assignment table, then layers the one thing the evaluator
//! doesn't know about: API-key scope isolation. An API key's principal id
//! is restricted to the resource it was minted under (and that resource's
//! descendants via the normal hierarchy walk) — see
//! [`shared::auth::middleware::Principal::restricted_to`].

use std::sync::Arc;

use shared::auth::Principal;
use shared::errors::ApiError;
use shared::rbac::{Permission, PermissionEvaluator, ResourceHierarchy, Role as RbacRole, RoleGraph};
use uuid::Uuid;

use crate::repository::{role_repository, RoleAssignmentRepository, RoleRepository, TenancyHierarchy};

#[derive(Clone)]
pub struct PermissionService {
    roles: Arc<RoleRepository>,
    assignments: Arc<RoleAssignmentRepository>,
    hierarchy: Arc<TenancyHierarchy>,
}

impl PermissionService {
    pub fn new(
        roles: Arc<RoleRepository>,
        assignments: Arc<RoleAssignmentRepository>,
        hierarchy: Arc<TenancyHierarchy>,
    ) -> Self {
        Self {
            roles,
            assignments,
            hierarchy,
        }
    }

    async fn role_graph(&self) -> Result<RoleGraph, ApiError> {
        let roles = self.roles.list_all().await?;
        Ok(RoleGraph::new(
            roles.iter().map(role_repository::to_rbac_role).collect(),
        ))
    }

    /// Resolves whether `principal` may exercise `required` at `resource_id`.
    ///
    /// An API key restricted to some other resource is rejected before the
    /// evaluator ever runs a hierarchy walk — a key minted under project P
    /// must never pass a check at a sibling project or at the organization
    /// that owns P, even if a role assignment would otherwise grant it.
    pub async fn check(
        &self,
        principal: &Principal,
        resource_id: Uuid,
        required: Permission,
    ) -> Result<(), ApiError> {
        if let Some(restricted_to) = principal.restricted_to() {
            if !self.is_same_or_descendant(resource_id, restricted_to).await? {
                return Err(ApiError::Forbidden {
                    resource_id: resource_id.to_string(),
                });
            }
        }

        let graph = self.role_graph().await?;
        let evaluator = PermissionEvaluator::new(
            self.assignments.as_ref(),
            self.hierarchy.as_ref(),
            &graph,
        );
        evaluator
            .evaluate(principal.assignment_target_id(), resource_id, required)
            .await
    }

    /// Whether `candidate` is `root` itself or a descendant of it, walking
    /// up `candidate`'s ancestry via the same hierarchy the evaluator uses.
    async fn is_same_or_descendant(&self, candidate: Uuid, root: Uuid) -> Result<bool, ApiError> {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == root {
                return Ok(true);
            }
            current = self.hierarchy.parent_of(id).await?;
        }
        Ok(false)
    }

    /// Whether `assigner` already holds every permission `role` expands to
    /// at `resource_id` — the legality rule role-assignment creation must
    /// satisfy before handing out a role nobody above the assigner granted.
    pub async fn can_assign(
        &self,
        assigner_id: Uuid,
        resource_id: Uuid,
        role: &RbacRole,
    ) -> Result<bool, ApiError> {
        let graph = self.role_graph().await?;
        let evaluator = PermissionEvaluator::new(
            self.assignments.as_ref(),
            self.hierarchy.as_ref(),
            &graph,
        );
        evaluator.can_assign(assigner_id, resource_id, role).await
    }
}
