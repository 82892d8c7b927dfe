//! # Permission Evaluator
//!
//! Answers the one question the rest of the service cares about: can this
//! principal do `required` at `resource_id`? A role assignment at an
//! ancestor resource (platform grants over an organization, an organization
//! grants over its projects) counts, so the evaluator walks up the tenancy
//! tree via [`ResourceHierarchy`] checking [`RoleAssignmentLookup`] at each
//! level before expanding each candidate role through [`RoleGraph`].
//!
//! Both lookup traits are implemented against Postgres by `auth-service`'s
//! repositories; kept here as traits so the evaluation logic has no sqlx
//! dependency and can be exercised with in-memory fakes in tests.

use crate::errors::ApiError;
use crate::rbac::permission::Permission;
use crate::rbac::role::{Role, RoleGraph};
use async_trait::async_trait;
use uuid::Uuid;

/// Looks up the roles a principal (user or API key) has been assigned at a
/// specific resource (not including inherited assignments from ancestors;
/// the evaluator walks the hierarchy itself).
#[async_trait]
pub trait RoleAssignmentLookup: Send + Sync {
    async fn assigned_roles(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Vec<Role>, ApiError>;
}

/// Resolves a resource's immediate parent in the platform -> organization ->
/// project tree. Returns `None` for the platform root or an unknown resource.
#[async_trait]
pub trait ResourceHierarchy: Send + Sync {
    async fn parent_of(&self, resource_id: Uuid) -> Result<Option<Uuid>, ApiError>;
}

/// Evaluates permission checks and role-assignment legality against a
/// snapshot of the role graph for the current tenant.
pub struct PermissionEvaluator<'a> {
    assignments: &'a dyn RoleAssignmentLookup,
    hierarchy: &'a dyn ResourceHierarchy,
    roles: &'a RoleGraph,
}

impl<'a> PermissionEvaluator<'a> {
    pub fn new(
        assignments: &'a dyn RoleAssignmentLookup,
        hierarchy: &'a dyn ResourceHierarchy,
        roles: &'a RoleGraph,
    ) -> Self {
        Self {
            assignments,
            hierarchy,
            roles,
        }
    }

    /// `Ok(())` if `principal_id` holds `required` at `resource_id`, via a
    /// role assigned directly there or at any ancestor. `Err(Forbidden)`
    /// otherwise.
    pub async fn evaluate(
        &self,
        principal_id: Uuid,
        resource_id: Uuid,
        required: Permission,
    ) -> Result<(), ApiError> {
        let mut current = Some(resource_id);

        while let Some(rid) = current {
            let roles = self.assignments.assigned_roles(principal_id, rid).await?;
            for role in &roles {
                if self.roles.expand_permissions(role).contains(&required) {
                    return Ok(());
                }
            }
            current = self.hierarchy.parent_of(rid).await?;
        }

        Err(ApiError::Forbidden {
            resource_id: resource_id.to_string(),
        })
    }

    /// Whether `assigner_id` is allowed to grant `role` at `resource_id`:
    /// only if they already hold every permission the role would expand to,
    /// evaluated through this same evaluator so the legality check can
    /// never be looser than request-time enforcement.
    pub async fn can_assign(
        &self,
        assigner_id: Uuid,
        resource_id: Uuid,
        role: &Role,
    ) -> Result<bool, ApiError> {
        for permission in self.roles.expand_permissions(role) {
            if self
                .evaluate(assigner_id, resource_id, permission)
                .await
                .is_err()
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeAssignments(Mutex<HashMap<(Uuid, Uuid), Vec<Role>>>);

    #[async_trait]
    impl RoleAssignmentLookup for FakeAssignments {
        async fn assigned_roles(
            &self,
            principal_id: Uuid,
            resource_id: Uuid,
        ) -> Result<Vec<Role>, ApiError> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .get(&(principal_id, resource_id))
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FakeHierarchy(Mutex<HashMap<Uuid, Uuid>>);

    #[async_trait]
    impl ResourceHierarchy for FakeHierarchy {
        async fn parent_of(&self, resource_id: Uuid) -> Result<Option<Uuid>, ApiError> {
            Ok(self.0.lock().unwrap().get(&resource_id).copied())
        }
    }

    fn viewer_role() -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "ProjectViewer".into(),
            parent_id: None,
            permissions: vec![Permission::ProjectGet],
        }
    }

    #[tokio::test]
    async fn test_direct_assignment_grants_permission() {
        let principal = Uuid::new_v4();
        let project = Uuid::new_v4();
        let role = viewer_role();

        let assignments = FakeAssignments(Mutex::new(HashMap::from([(
            (principal, project),
            vec![role.clone()],
        )])));
        let hierarchy = FakeHierarchy(Mutex::new(HashMap::new()));
        let graph = RoleGraph::new(vec![role]);

        let evaluator = PermissionEvaluator::new(&assignments, &hierarchy, &graph);
        assert!(evaluator
            .evaluate(principal, project, Permission::ProjectGet)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_ancestor_assignment_cascades_down() {
        let principal = Uuid::new_v4();
        let org = Uuid::new_v4();
        let project = Uuid::new_v4();
        let role = viewer_role();

        let assignments = FakeAssignments(Mutex::new(HashMap::from([(
            (principal, org),
            vec![role.clone()],
        )])));
        let hierarchy = FakeHierarchy(Mutex::new(HashMap::from([(project, org)])));
        let graph = RoleGraph::new(vec![role]);

        let evaluator = PermissionEvaluator::new(&assignments, &hierarchy, &graph);
        assert!(evaluator
            .evaluate(principal, project, Permission::ProjectGet)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unassigned_principal_is_forbidden() {
        let principal = Uuid::new_v4();
        let project = Uuid::new_v4();

        let assignments = FakeAssignments(Mutex::new(HashMap::new()));
        let hierarchy = FakeHierarchy(Mutex::new(HashMap::new()));
        let graph = RoleGraph::new(vec![]);

        let evaluator = PermissionEvaluator::new(&assignments, &hierarchy, &graph);
        let result = evaluator
            .evaluate(principal, project, Permission::ProjectGet)
            .await;
        assert!(matches!(result, Err(ApiError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_can_assign_requires_superset_of_role_permissions() {
        let assigner = Uuid::new_v4();
        let project = Uuid::new_v4();
        let viewer = viewer_role();
        let owner = Role {
            id: Uuid::new_v4(),
            name: "ProjectOwner".into(),
            parent_id: None,
            permissions: vec![Permission::ProjectGet, Permission::ProjectDelete],
        };

        let assignments = FakeAssignments(Mutex::new(HashMap::from([(
            (assigner, project),
            vec![viewer.clone()],
        )])));
        let hierarchy = FakeHierarchy(Mutex::new(HashMap::new()));
        let graph = RoleGraph::new(vec![viewer.clone(), owner.clone()]);

        let evaluator = PermissionEvaluator::new(&assignments, &hierarchy, &graph);

        // Assigner only has ProjectGet; cannot grant ProjectOwner (needs ProjectDelete too).
        assert!(!evaluator.can_assign(assigner, project, &owner).await.unwrap());
        // But can grant a role no stronger than their own.
        assert!(evaluator.can_assign(assigner, project, &viewer).await.unwrap());
    }
}
