//! # Repository Layer
//!
//! Data access for the authorization kernel: one repository struct per
//! collection in `db/migrations/postgresql/`, each holding a `PgPool` clone
//! and exposing raw `sqlx::query_as::<_, T>`/`.bind()` chains. No business
//! rules live here (cycle checks, assignment legality, scope translation are
//! the service layer's job) — only CRUD, uniqueness, and cursor pagination.
//!
//! Several repositories additionally implement a `shared` trait
//! (`PrincipalUserStore`, `PrincipalApiKeyStore`, `PrincipalSessionStore`,
//! `ResourceHierarchy`, `RoleAssignmentLookup`) so `shared::auth`/
//! `shared::rbac` can drive permission evaluation and principal resolution
//! without depending on `sqlx` directly.

pub mod api_key_repository;
pub mod authorization_code_repository;
pub mod invite_repository;
pub mod oauth_client_repository;
pub mod oauth_token_repository;
pub mod role_assignment_repository;
pub mod role_repository;
pub mod session_repository;
pub mod tenancy_repository;
pub mod user_repository;

pub use api_key_repository::ApiKeyRepository;
pub use authorization_code_repository::AuthorizationCodeRepository;
pub use invite_repository::InviteRepository;
pub use oauth_client_repository::OAuthClientRepository;
pub use oauth_token_repository::OAuth2TokenRepository;
pub use role_assignment_repository::RoleAssignmentRepository;
pub use role_repository::RoleRepository;
pub use session_repository::SessionRepository;
pub use tenancy_repository::{
    OrganizationMemberRepository, OrganizationRepository, ProjectMemberRepository,
    ProjectRepository, TenancyHierarchy,
};
pub use user_repository::UserRepository;

use shared::errors::ApiError;

/// Cursor for `(created_at, id)`-ordered pagination, matching the tie-break
/// every collection's `idx_*_created_at_id` index is built for.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub id: uuid::Uuid,
}

/// Page direction. `Desc` (newest first) is the API default per
/// the pagination envelope's `order` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Maps a `sqlx::Error` to `ApiError`, surfacing a unique-constraint
/// violation on `constraint_name` as `Conflict { resource }` rather than a
/// generic `InternalError`. Every other database error passes through via
/// `ApiError`'s own `#[from] sqlx::Error` conversion.
pub(crate) fn map_unique_violation(
    err: sqlx::Error,
    constraint_name: &str,
    resource: &str,
) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.constraint() == Some(constraint_name) {
            return ApiError::Conflict {
                resource: resource.to_string(),
            };
        }
    }
    ApiError::DatabaseError(err)
}
