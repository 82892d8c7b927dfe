//! # Permission Registry
//!
//! A closed set of fine-grained permission strings, grouped by resource
//! namespace (`user.*`, `organization.*`, `project.*`, `api-key.*`, `iam.*`).
//!
//! Unlike a flat rank-based role enum, this is a capability list: a
//! principal's effective access is the union of
//! permissions their assigned roles expand to (see [`crate::rbac::role`]),
//! not a single rank.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One fine-grained capability. The wire representation (`as_str`) is the
/// dotted string used throughout the permission registry and API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UserCreate,
    UserGet,
    UserList,
    UserUpdate,
    UserDelete,
    UserDisable,
    UserInvite,

    OrgCreate,
    OrgGet,
    OrgList,
    OrgUpdate,
    OrgDelete,
    OrgDisable,
    OrgMemberList,
    OrgMemberCreate,
    OrgMemberGet,
    OrgMemberDelete,

    ProjectCreate,
    ProjectGet,
    ProjectList,
    ProjectUpdate,
    ProjectDelete,
    ProjectDisable,
    ProjectMemberList,
    ProjectMemberCreate,
    ProjectMemberGet,
    ProjectMemberDelete,

    ApiKeyList,
    ApiKeyCreate,
    ApiKeyGet,
    ApiKeyUpdate,
    ApiKeyDelete,

    IamSetPolicy,
    IamGetPolicy,
    IamRolesCreate,
    IamRolesGet,
    IamRolesList,
    IamRolesUpdate,
    IamRolesDelete,
}

impl Permission {
    /// All permissions known to the registry, in declaration order.
    pub const ALL: &'static [Permission] = &[
        Self::UserCreate,
        Self::UserGet,
        Self::UserList,
        Self::UserUpdate,
        Self::UserDelete,
        Self::UserDisable,
        Self::UserInvite,
        Self::OrgCreate,
        Self::OrgGet,
        Self::OrgList,
        Self::OrgUpdate,
        Self::OrgDelete,
        Self::OrgDisable,
        Self::OrgMemberList,
        Self::OrgMemberCreate,
        Self::OrgMemberGet,
        Self::OrgMemberDelete,
        Self::ProjectCreate,
        Self::ProjectGet,
        Self::ProjectList,
        Self::ProjectUpdate,
        Self::ProjectDelete,
        Self::ProjectDisable,
        Self::ProjectMemberList,
        Self::ProjectMemberCreate,
        Self::ProjectMemberGet,
        Self::ProjectMemberDelete,
        Self::ApiKeyList,
        Self::ApiKeyCreate,
        Self::ApiKeyGet,
        Self::ApiKeyUpdate,
        Self::ApiKeyDelete,
        Self::IamSetPolicy,
        Self::IamGetPolicy,
        Self::IamRolesCreate,
        Self::IamRolesGet,
        Self::IamRolesList,
        Self::IamRolesUpdate,
        Self::IamRolesDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreate => "user.create",
            Self::UserGet => "user.get",
            Self::UserList => "user.list",
            Self::UserUpdate => "user.update",
            Self::UserDelete => "user.delete",
            Self::UserDisable => "user.disable",
            Self::UserInvite => "user.invite",
            Self::OrgCreate => "organization.create",
            Self::OrgGet => "organization.get",
            Self::OrgList => "organization.list",
            Self::OrgUpdate => "organization.update",
            Self::OrgDelete => "organization.delete",
            Self::OrgDisable => "organization.disable",
            Self::OrgMemberList => "organization.member.list",
            Self::OrgMemberCreate => "organization.member.create",
            Self::OrgMemberGet => "organization.member.get",
            Self::OrgMemberDelete => "organization.member.delete",
            Self::ProjectCreate => "project.create",
            Self::ProjectGet => "project.get",
            Self::ProjectList => "project.list",
            Self::ProjectUpdate => "project.update",
            Self::ProjectDelete => "project.delete",
            Self::ProjectDisable => "project.disable",
            Self::ProjectMemberList => "project.member.list",
            Self::ProjectMemberCreate => "project.member.create",
            Self::ProjectMemberGet => "project.member.get",
            Self::ProjectMemberDelete => "project.member.delete",
            Self::ApiKeyList => "api-key.list",
            Self::ApiKeyCreate => "api-key.create",
            Self::ApiKeyGet => "api-key.get",
            Self::ApiKeyUpdate => "api-key.update",
            Self::ApiKeyDelete => "api-key.delete",
            Self::IamSetPolicy => "iam.setPolicy",
            Self::IamGetPolicy => "iam.getPolicy",
            Self::IamRolesCreate => "iam.roles.create",
            Self::IamRolesGet => "iam.roles.get",
            Self::IamRolesList => "iam.roles.list",
            Self::IamRolesUpdate => "iam.roles.update",
            Self::IamRolesDelete => "iam.roles.delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Permission::from_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown permission: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_permission_round_trips_through_its_string() {
        for perm in Permission::ALL {
            assert_eq!(Permission::from_str(perm.as_str()), Some(*perm));
        }
    }

    #[test]
    fn test_unknown_permission_string_is_none() {
        assert_eq!(Permission::from_str("user.teleport"), None);
    }
}
