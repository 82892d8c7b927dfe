//! # Declarative Registries
//!
//! Loads `permissions.yml` and `roles.yml` at compile time via
//! `include_str!` and parses them with `serde_yaml`, the same
//! config-from-file idiom used for environment configuration
//! (`shared::config`), applied here to data that changes by editing a file
//! rather than redeploying with new env vars.

use crate::rbac::permission::Permission;
use serde::Deserialize;
use std::sync::OnceLock;

const PERMISSIONS_YAML: &str = include_str!("permissions.yml");
const ROLES_YAML: &str = include_str!("roles.yml");

#[derive(Debug, Deserialize)]
struct PermissionDefinitionRaw {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct PermissionsFile {
    permissions: Vec<PermissionDefinitionRaw>,
}

/// A documented permission entry, as declared in `permissions.yml`.
#[derive(Debug, Clone)]
pub struct PermissionDefinition {
    pub permission: Permission,
    pub description: String,
}

fn permission_definitions() -> &'static Vec<PermissionDefinition> {
    static DEFS: OnceLock<Vec<PermissionDefinition>> = OnceLock::new();
    DEFS.get_or_init(|| {
        let raw: PermissionsFile =
            serde_yaml::from_str(PERMISSIONS_YAML).expect("permissions.yml must parse");
        raw.permissions
            .into_iter()
            .map(|d| PermissionDefinition {
                permission: Permission::from_str(&d.name)
                    .unwrap_or_else(|| panic!("permissions.yml names unknown permission {}", d.name)),
                description: d.description,
            })
            .collect()
    })
}

/// Every permission definition, loaded once. Used by documentation /
/// discovery endpoints and to validate `permissions.yml` stays in lockstep
/// with the `Permission` enum (every variant must appear here, and every
/// entry here must be a known variant).
pub fn all_permission_definitions() -> &'static [PermissionDefinition] {
    permission_definitions()
}

#[derive(Debug, Deserialize)]
struct RoleSeedRaw {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RolesFile {
    roles: Vec<RoleSeedRaw>,
}

/// A seed role as declared in `roles.yml`, before names have been resolved
/// to database ids. The role repository resolves `parent_name` against
/// already-inserted seed roles when materializing these.
#[derive(Debug, Clone)]
pub struct RoleSeed {
    pub name: String,
    pub parent_name: Option<String>,
    pub permissions: Vec<Permission>,
}

fn role_seeds() -> &'static Vec<RoleSeed> {
    static SEEDS: OnceLock<Vec<RoleSeed>> = OnceLock::new();
    SEEDS.get_or_init(|| {
        let raw: RolesFile = serde_yaml::from_str(ROLES_YAML).expect("roles.yml must parse");
        raw.roles
            .into_iter()
            .map(|r| RoleSeed {
                name: r.name,
                parent_name: r.parent,
                permissions: r
                    .permissions
                    .iter()
                    .map(|p| {
                        Permission::from_str(p)
                            .unwrap_or_else(|| panic!("roles.yml names unknown permission {p}"))
                    })
                    .collect(),
            })
            .collect()
    })
}

/// Seed roles to materialize on first boot, in declaration order (parents
/// are declared after the juniors they point to, so inserting in this order
/// never references a not-yet-inserted row... actually callers should
/// insert parent-less roles first; see `auth-service`'s role repository).
pub fn seed_roles() -> &'static [RoleSeed] {
    role_seeds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_yaml_covers_every_enum_variant() {
        let declared: std::collections::HashSet<_> = all_permission_definitions()
            .iter()
            .map(|d| d.permission)
            .collect();
        for perm in Permission::ALL {
            assert!(declared.contains(perm), "{perm} missing from permissions.yml");
        }
    }

    #[test]
    fn test_role_seeds_parents_resolve_to_declared_names() {
        let names: std::collections::HashSet<_> =
            seed_roles().iter().map(|r| r.name.as_str()).collect();
        for seed in seed_roles() {
            if let Some(parent) = &seed.parent_name {
                assert!(names.contains(parent.as_str()), "unknown parent {parent}");
            }
        }
    }
}
