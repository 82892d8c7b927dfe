//! # Data Transfer Objects
//!
//! Request and response shapes for the HTTP boundary. Entities never
//! serialize directly — a `User` carries `hashed_password`, an `ApiKey`
//! carries `salt`/`hashed_key`, and neither may leave the process. Every
//! `*View` struct here is the response-safe projection of its entity;
//! every `*Request` struct is what a handler deserializes and validates
//! before calling into the service layer.
//!
//! Timestamps cross the boundary as Unix seconds, matching the pagination
//! cursor's `created_at` tie-break and keeping every response shape
//! timezone-free.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use shared::validation::validators;
use validator::Validate;

use crate::domain::{
    ApiKey, Invite, Member, OAuthClient, Organization, Project, Role, RoleAssignment, User,
};
use crate::repository::Order;

fn unix(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Distinguishes an absent JSON key (outer `None`, "leave it alone") from an
/// explicit `null` (`Some(None)`, "clear it") for `Option<Option<T>>` fields.
/// Plain `#[serde(default)]` collapses both cases to `None`, which is wrong
/// for a field like `parentId` where "clear the parent" is a real request.
fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

// =============================================================================
// Pagination
// =============================================================================

/// Query parameters accepted by every list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub order: Option<String>,
    pub after: Option<Uuid>,
    pub before: Option<Uuid>,
}

impl PageParams {
    /// Clamps the caller's `limit` into `1..=100`, defaulting to 20.
    pub fn limit_or_default(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    pub fn order_or_default(&self) -> Order {
        match self.order.as_deref() {
            Some("asc") => Order::Asc,
            _ => Order::Desc,
        }
    }
}

/// The envelope every list endpoint returns.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub object: &'static str,
    pub data: Vec<T>,
    pub first_id: Option<String>,
    pub last_id: Option<String>,
    pub has_more: bool,
}

impl<T> ListResponse<T> {
    pub fn new(data: Vec<T>, has_more: bool, id_of: impl Fn(&T) -> String) -> Self {
        let first_id = data.first().map(&id_of);
        let last_id = data.last().map(&id_of);
        Self {
            object: "list",
            data,
            first_id,
            last_id,
            has_more,
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            phone: u.phone,
            disabled: u.disabled,
            metadata: u.metadata,
            created_at: unix(u.created_at),
            updated_at: unix(u.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

// =============================================================================
// ORGANIZATIONS / PROJECTS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationView {
    pub id: Uuid,
    pub name: String,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Organization> for OrganizationView {
    fn from(o: Organization) -> Self {
        Self {
            id: o.id,
            name: o.name,
            disabled: o.disabled,
            metadata: o.metadata,
            created_at: unix(o.created_at),
            updated_at: unix(o.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: String,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: Option<String>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Project> for ProjectView {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            organization_id: p.organization_id,
            name: p.name,
            disabled: p.disabled,
            metadata: p.metadata,
            created_at: unix(p.created_at),
            updated_at: unix(p.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: String,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: Option<String>,
    pub metadata: Option<JsonValue>,
}

// =============================================================================
// MEMBERS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub joined_at: i64,
}

impl From<Member> for MemberView {
    fn from(m: Member) -> Self {
        Self {
            resource_id: m.resource_id,
            user_id: m.user_id,
            disabled: m.disabled,
            metadata: m.metadata,
            joined_at: unix(m.joined_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
}

// =============================================================================
// ROLES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub parent_id: Option<Uuid>,
    pub disabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<Role> for RoleView {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            permissions: r.permissions,
            parent_id: r.parent_id,
            disabled: r.disabled,
            created_at: unix(r.created_at),
            updated_at: unix(r.updated_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: String,
    pub permissions: Vec<String>,
    pub parent_id: Option<Uuid>,
}

/// A present-but-null `parentId` ("make this role parentless") and an
/// absent `parentId` ("don't touch it") are different requests, so this
/// carries `Option<Option<Uuid>>` the same way `RoleService::update` does.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 100))]
    #[validate(custom(function = "validators::not_blank"))]
    pub name: Option<String>,
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub parent_id: Option<Option<Uuid>>,
}

// =============================================================================
// ROLE ASSIGNMENTS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentView {
    pub id: Uuid,
    pub target_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
    pub assigned_at: i64,
}

impl From<RoleAssignment> for RoleAssignmentView {
    fn from(a: RoleAssignment) -> Self {
        Self {
            id: a.id,
            target_id: a.target_id,
            role_id: a.role_id,
            resource_id: a.resource_id,
            assigned_at: unix(a.assigned_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleAssignmentRequest {
    pub target_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
}

/// Query for `GET /v1/role-assignments` — role assignments aren't nested
/// under a resource path, since one assignment list spans whichever
/// organization or project the caller names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRoleAssignmentsQuery {
    pub resource_id: Uuid,
    #[serde(flatten)]
    pub page: PageParams,
}

// =============================================================================
// API KEYS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub prefix: String,
    pub decorator: String,
    pub expires_at: Option<i64>,
    pub disabled: bool,
    pub created_at: i64,
}

impl From<ApiKey> for ApiKeyView {
    fn from(k: ApiKey) -> Self {
        Self {
            id: k.id,
            user_id: k.user_id,
            resource_id: k.resource_id,
            prefix: k.prefix,
            decorator: k.decorator,
            expires_at: k.expires_at.map(unix),
            disabled: k.disabled,
            created_at: unix(k.created_at),
        }
    }
}

/// Returned exactly once, at creation — `secret` is the only time the
/// plaintext key is ever transmitted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyCreatedView {
    #[serde(flatten)]
    pub key: ApiKeyView,
    pub secret: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub resource_id: Uuid,
    #[validate(length(min = 1, max = 20))]
    pub decorator: String,
    pub expires_at: Option<i64>,
}

// =============================================================================
// INVITES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteView {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub expires_at: i64,
    pub created_at: i64,
}

impl From<Invite> for InviteView {
    fn from(i: Invite) -> Self {
        Self {
            id: i.id,
            resource_id: i.resource_id,
            email: i.email,
            invited_by: i.invited_by,
            expires_at: unix(i.expires_at),
            created_at: unix(i.created_at),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

// =============================================================================
// CONSOLE SESSIONS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub identifier: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub expires_at: i64,
}

// =============================================================================
// OAUTH 2.0 / OIDC
// =============================================================================

/// Query string of `GET /oauth2/authorize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuthorizeQuery {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    #[serde(default)]
    pub scope: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
}

/// `application/x-www-form-urlencoded` body of `POST /oauth2/token`, per
/// RFC 6749 §4.1.3 / §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenForm {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenResponseDto {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// `POST /oauth2/revoke` body, per RFC 7009 §2.1.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RevokeForm {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// `POST /oauth2/introspect` body, per RFC 7662 §2.1.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IntrospectForm {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct IntrospectResponseDto {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponseDto {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `GET /.well-known/openid-configuration`, per OIDC Discovery §3.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub scopes_supported: Vec<&'static str>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub code_challenge_methods_supported: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientView {
    pub id: Uuid,
    pub client_id: String,
    pub client_type: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub allowed_grant_types: Vec<String>,
    pub project_id: Option<Uuid>,
    pub disabled: bool,
    pub created_at: i64,
}

impl From<OAuthClient> for OAuthClientView {
    fn from(c: OAuthClient) -> Self {
        Self {
            id: c.id,
            client_id: c.client_id,
            client_type: c.client_type,
            name: c.name,
            redirect_uris: c.redirect_uris,
            allowed_scopes: c.allowed_scopes,
            allowed_grant_types: c.allowed_grant_types,
            project_id: c.project_id,
            disabled: c.disabled,
            created_at: unix(c.created_at),
        }
    }
}

/// Returned once, at registration — `client_secret` is absent for public
/// clients and present exactly here for confidential ones.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientCreatedView {
    #[serde(flatten)]
    pub client: OAuthClientView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOAuthClientRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub client_type: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub allowed_grant_types: Vec<String>,
    pub project_id: Option<Uuid>,
}

// =============================================================================
// PRINCIPAL / PERMISSIONS
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalView {
    pub kind: &'static str,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatePermissionRequest {
    pub resource_id: Uuid,
    #[validate(length(min = 1))]
    pub permission: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatePermissionResponse {
    pub allowed: bool,
}

// =============================================================================
// MISC
// =============================================================================

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_default_order_is_desc() {
        let params = PageParams {
            limit: None,
            order: None,
            after: None,
            before: None,
        };
        assert_eq!(params.limit_or_default(), 20);
        assert_eq!(params.order_or_default(), Order::Desc);
    }

    #[test]
    fn test_page_params_clamps_limit() {
        let params = PageParams {
            limit: Some(500),
            order: Some("asc".to_string()),
            after: None,
            before: None,
        };
        assert_eq!(params.limit_or_default(), 100);
        assert_eq!(params.order_or_default(), Order::Asc);
    }

    #[test]
    fn test_page_params_rejects_zero_limit() {
        let params = PageParams {
            limit: Some(0),
            order: None,
            after: None,
            before: None,
        };
        assert_eq!(params.limit_or_default(), 1);
    }

    #[test]
    fn test_create_user_request_validates_password_length() {
        let req = CreateUserRequest {
            username: "grace".to_string(),
            email: Some("grace@example.com".to_string()),
            full_name: None,
            phone: None,
            password: "short".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_list_response_derives_first_last_id() {
        let resp = ListResponse::new(vec!["a", "b", "c"], true, |s| s.to_string());
        assert_eq!(resp.first_id.as_deref(), Some("a"));
        assert_eq!(resp.last_id.as_deref(), Some("c"));
        assert!(resp.has_more);
    }
}
