//! # Domain Entities
//!
//! Core persistent objects for the authorization kernel: principals (users,
//! API keys), the OAuth2/OIDC protocol state (clients, codes, tokens), the
//! RBAC role graph, the tenancy tree (organizations, projects, memberships),
//! invites, and console sessions. Each struct maps to one table under
//! `db/migrations/postgresql/`.
//!
//! Entities carry every column a repository can select; API-facing shapes
//! that must hide fields (`hashed_password`, `salt`, `hashed_key`) live in
//! `api::dto` instead of here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Synthetic root of the resource hierarchy. No row in `organizations` or
/// `projects` carries this id; it exists purely so platform-scoped role
/// assignments have a `resource_id` to attach to.
pub const PLATFORM_ID: Uuid = Uuid::nil();

// =============================================================================
// USER
// =============================================================================

/// Complete user record. Never serialize directly to an API response —
/// `hashed_password` must not leave the process. See `api::dto::UserView`.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub hashed_password: String,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to register a new user. `hashed_password` is already
/// hashed by the caller (`shared::auth::password::PasswordHasher`).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub hashed_password: String,
    pub metadata: JsonValue,
}

// =============================================================================
// TENANCY
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub organization_id: Uuid,
    pub name: String,
    pub metadata: JsonValue,
}

/// Membership row for either an organization or a project. The two tables
/// share this shape but not a parent table, so `resource_id` carries no FK
/// (see `OrganizationMemberRepository`/`ProjectMemberRepository`).
#[derive(Debug, Clone, FromRow)]
pub struct Member {
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub disabled: bool,
    pub metadata: JsonValue,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub metadata: JsonValue,
}

// =============================================================================
// ROLE GRAPH
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub parent_id: Option<Uuid>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub permissions: Vec<String>,
    pub parent_id: Option<Uuid>,
}

/// Grants `role_id` to `target_id` (a `User.id` or `ApiKey.id`) at
/// `resource_id` (an `Organization.id`, `Project.id`, or [`PLATFORM_ID`]).
#[derive(Debug, Clone, FromRow)]
pub struct RoleAssignment {
    pub id: Uuid,
    pub target_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoleAssignment {
    pub target_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
}

// =============================================================================
// OAUTH2 CLIENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Public,
    Confidential,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Public => "public",
            ClientType::Confidential => "confidential",
        }
    }
}

impl std::str::FromStr for ClientType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(ClientType::Public),
            "confidential" => Ok(ClientType::Confidential),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OAuthClient {
    pub id: Uuid,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub client_type: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub allowed_grant_types: Vec<String>,
    pub project_id: Option<Uuid>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl OAuthClient {
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential.as_str()
    }

    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.allowed_grant_types.iter().any(|g| g == grant_type)
    }

    /// Exact match on `(scheme, host, path)`; query strings on the
    /// registered URI are not compared (RFC 6749 redirect-URI matching).
    pub fn registers_redirect_uri(&self, candidate: &str) -> bool {
        let candidate_parts = split_redirect_uri(candidate);
        self.redirect_uris
            .iter()
            .any(|registered| split_redirect_uri(registered) == candidate_parts)
    }
}

fn split_redirect_uri(uri: &str) -> (String, String, String) {
    match url::Url::parse(uri) {
        Ok(parsed) => (
            parsed.scheme().to_string(),
            parsed.host_str().unwrap_or("").to_string(),
            parsed.path().to_string(),
        ),
        Err(_) => (String::new(), String::new(), uri.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct NewOAuthClient {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub client_type: ClientType,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub allowed_grant_types: Vec<String>,
    pub project_id: Option<Uuid>,
}

// =============================================================================
// AUTHORIZATION CODE
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub user_id: Uuid,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub auth_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn has_pkce(&self) -> bool {
        self.code_challenge.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub user_id: Uuid,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub auth_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// OAUTH2 TOKEN
// =============================================================================

/// A minted access/refresh token pair. When the access token is a JWT,
/// `id` is its `jti` (so introspection and revocation can look tokens up by
/// either the opaque id or the token string); refresh tokens are always
/// opaque random strings.
#[derive(Debug, Clone, FromRow)]
pub struct OAuth2Token {
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: String,
    pub user_id: Uuid,
    pub client_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub authorization_code_id: Option<String>,
}

impl OAuth2Token {
    pub fn scope_set(&self) -> std::collections::HashSet<&str> {
        self.scope.split_whitespace().collect()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewOAuth2Token {
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: String,
    pub user_id: Uuid,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub authorization_code_id: Option<String>,
}

// =============================================================================
// API KEY
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub prefix: String,
    pub salt: Vec<u8>,
    pub hashed_key: Vec<u8>,
    pub decorator: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub prefix: String,
    pub salt: Vec<u8>,
    pub hashed_key: Vec<u8>,
    pub decorator: String,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// INVITE
// =============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct Invite {
    pub id: Uuid,
    pub resource_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub temporary_token: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub resource_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub temporary_token: String,
    pub expires_at: DateTime<Utc>,
    pub metadata: JsonValue,
}

// =============================================================================
// SESSION (console only)
// =============================================================================

/// Server-stored mapping from an opaque cookie value to a local token pair.
/// `user_id` pins the snapshot the cookie was issued for; principal
/// resolution rejects the session if the pinned user no longer matches or
/// the pair has expired.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub cookie_value: String,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub cookie_value: String,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}
