//! # OAuth 2.0 Scope Registry
//!
//! Maps standard OAuth 2.0 scope strings to the permissions they grant.
//! A token's `scope` claim is expanded to permissions once at evaluation
//! time rather than stored denormalized.

use crate::rbac::permission::Permission;

/// Scopes understood by the authorization endpoint. Anything else is
/// rejected with `invalid_scope`.
pub const KNOWN_SCOPES: &[&str] = &[
    "openid",
    "profile",
    "email",
    "address",
    "phone",
    "offline_access",
    "api",
    "user:read",
    "user:write",
    "organization:read",
    "organization:write",
    "project:read",
    "project:write",
];

/// Permissions granted by a single scope. OIDC identity scopes
/// (`openid`/`profile`/`email`/`address`/`phone`) and `offline_access` grant
/// no RBAC permissions of their own; they only shape the token contents.
pub fn scope_to_permissions(scope: &str) -> &'static [Permission] {
    match scope {
        "user:read" => &[Permission::UserGet, Permission::UserList],
        "user:write" => &[
            Permission::UserCreate,
            Permission::UserUpdate,
            Permission::UserDelete,
            Permission::UserDisable,
            Permission::UserInvite,
        ],
        "organization:read" => &[
            Permission::OrgGet,
            Permission::OrgList,
            Permission::OrgMemberList,
            Permission::OrgMemberGet,
        ],
        "organization:write" => &[
            Permission::OrgCreate,
            Permission::OrgUpdate,
            Permission::OrgDelete,
            Permission::OrgDisable,
            Permission::OrgMemberCreate,
            Permission::OrgMemberDelete,
        ],
        "project:read" => &[
            Permission::ProjectGet,
            Permission::ProjectList,
            Permission::ProjectMemberList,
            Permission::ProjectMemberGet,
        ],
        "project:write" => &[
            Permission::ProjectCreate,
            Permission::ProjectUpdate,
            Permission::ProjectDelete,
            Permission::ProjectDisable,
            Permission::ProjectMemberCreate,
            Permission::ProjectMemberDelete,
        ],
        _ => &[],
    }
}

/// Expands a space-delimited `scope` claim into the union of permissions
/// it grants, deduplicated.
pub fn scopes_to_permissions(scope: &str) -> Vec<Permission> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for token in scope.split_whitespace() {
        for perm in scope_to_permissions(token) {
            if seen.insert(*perm) {
                out.push(*perm);
            }
        }
    }
    out
}

/// Returns `true` if every space-delimited token in `scope` is a scope this
/// service recognizes.
pub fn validate_scope_string(scope: &str) -> bool {
    scope.split_whitespace().all(|s| KNOWN_SCOPES.contains(&s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_scopes_grant_no_permissions() {
        assert!(scope_to_permissions("openid").is_empty());
        assert!(scope_to_permissions("offline_access").is_empty());
    }

    #[test]
    fn test_scopes_to_permissions_deduplicates() {
        let perms = scopes_to_permissions("user:read user:read organization:read");
        let user_get_count = perms.iter().filter(|p| **p == Permission::UserGet).count();
        assert_eq!(user_get_count, 1);
    }

    #[test]
    fn test_validate_scope_string() {
        assert!(validate_scope_string("openid profile user:read"));
        assert!(!validate_scope_string("openid nonsense"));
    }
}
