//! # Role Graph
//!
//! Roles form a DAG via `parent_id`: a role inherits every permission of its
//! ancestors. Grounded in `any_auth.types.role.check_for_cycles` — cycles
//! must be rejected before a `parent_id` mutation is persisted, not
//! discovered later while expanding permissions.

use crate::rbac::permission::Permission;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Seed role names the platform ships with. Assignable at the tenancy level
/// their name implies (platform / organization / project); nothing stops a
/// deployment from defining more via `iam.roles.create`.
pub mod seed {
    pub const PLATFORM_MANAGER: &str = "PlatformManager";
    pub const PLATFORM_CREATOR: &str = "PlatformCreator";
    pub const ORGANIZATION_OWNER: &str = "OrganizationOwner";
    pub const ORGANIZATION_EDITOR: &str = "OrganizationEditor";
    pub const ORGANIZATION_VIEWER: &str = "OrganizationViewer";
    pub const PROJECT_OWNER: &str = "ProjectOwner";
    pub const PROJECT_EDITOR: &str = "ProjectEditor";
    pub const PROJECT_VIEWER: &str = "ProjectViewer";
}

/// A role: a name, the permissions it directly grants, and an optional
/// parent it inherits from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub permissions: Vec<Permission>,
}

/// The full set of roles known to a tenant, indexed for cheap ancestor
/// walks. Built fresh per request from the role repository; cheap to
/// reconstruct since role counts are small relative to request volume.
pub struct RoleGraph {
    roles: HashMap<Uuid, Role>,
}

impl RoleGraph {
    pub fn new(roles: Vec<Role>) -> Self {
        Self {
            roles: roles.into_iter().map(|r| (r.id, r)).collect(),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Role> {
        self.roles.get(&id)
    }

    /// The transitive closure of permissions a role grants: its own plus
    /// every ancestor's, found by walking `parent_id`.
    ///
    /// Stops if it revisits a role id, so a role graph that somehow has a
    /// cycle (it shouldn't, `would_create_cycle` is checked on write)
    /// degrades to "whatever was reachable before the cycle" instead of
    /// looping forever.
    pub fn expand_permissions(&self, role: &Role) -> HashSet<Permission> {
        let mut permissions = HashSet::new();
        let mut visited = HashSet::new();
        let mut current = Some(role.clone());

        while let Some(r) = current {
            if !visited.insert(r.id) {
                break;
            }
            permissions.extend(r.permissions.iter().copied());
            current = r.parent_id.and_then(|parent_id| self.roles.get(&parent_id).cloned());
        }

        permissions
    }

    /// Would setting `role_id`'s parent to `proposed_parent_id` introduce a
    /// cycle? Checked before persisting any `parent_id` change.
    pub fn would_create_cycle(&self, role_id: Uuid, proposed_parent_id: Uuid) -> bool {
        if role_id == proposed_parent_id {
            return true;
        }

        let mut current = Some(proposed_parent_id);
        let mut visited = HashSet::new();

        while let Some(id) = current {
            if id == role_id {
                return true;
            }
            if !visited.insert(id) {
                // Existing cycle unrelated to this mutation; don't compound it.
                return true;
            }
            current = self.roles.get(&id).and_then(|r| r.parent_id);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: Uuid, parent_id: Option<Uuid>, permissions: Vec<Permission>) -> Role {
        Role {
            id,
            name: id.to_string(),
            parent_id,
            permissions,
        }
    }

    #[test]
    fn test_expand_permissions_includes_ancestors() {
        let grandparent_id = Uuid::new_v4();
        let parent_id = Uuid::new_v4();
        let child_id = Uuid::new_v4();

        let grandparent = role(grandparent_id, None, vec![Permission::OrgList]);
        let parent = role(parent_id, Some(grandparent_id), vec![Permission::OrgGet]);
        let child = role(child_id, Some(parent_id), vec![Permission::OrgUpdate]);

        let graph = RoleGraph::new(vec![grandparent, parent.clone(), child.clone()]);
        let expanded = graph.expand_permissions(&child);

        assert!(expanded.contains(&Permission::OrgUpdate));
        assert!(expanded.contains(&Permission::OrgGet));
        assert!(expanded.contains(&Permission::OrgList));
    }

    #[test]
    fn test_would_create_cycle_detects_self_parent() {
        let id = Uuid::new_v4();
        let graph = RoleGraph::new(vec![role(id, None, vec![])]);
        assert!(graph.would_create_cycle(id, id));
    }

    #[test]
    fn test_would_create_cycle_detects_indirect_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        // a -> b -> c (c has no parent yet)
        let graph = RoleGraph::new(vec![
            role(a, None, vec![]),
            role(b, Some(a), vec![]),
            role(c, Some(b), vec![]),
        ]);

        // Setting a's parent to c would close the loop a -> b -> c -> a.
        assert!(graph.would_create_cycle(a, c));
    }

    #[test]
    fn test_would_create_cycle_allows_valid_reparenting() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let graph = RoleGraph::new(vec![
            role(a, None, vec![]),
            role(b, None, vec![]),
            role(c, Some(a), vec![]),
        ]);

        assert!(!graph.would_create_cycle(c, b));
    }
}
