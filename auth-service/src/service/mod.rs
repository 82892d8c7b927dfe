//! # Service Layer
//!
//! Business logic for the authorization kernel, sitting between the HTTP
//! handlers and the repository layer. Each service wraps one or more
//! repositories plus whatever `shared` primitive it needs (JWT, password
//! hashing, the revocation set, the permission evaluator) and exposes
//! operations in terms of domain entities, never `sqlx` rows directly.
//!
//! ## Service Responsibilities
//!
//! | Service                  | Responsibility                                       |
//! |---------------------------|------------------------------------------------------|
//! | [`PermissionService`]    | Evaluates whether a principal may act on a resource   |
//! | [`OAuthService`]         | `/oauth2/*` authorize/token/revoke/introspect/userinfo |
//! | [`InviteService`]        | Issues and accepts organization/project invites       |
//! | [`SessionService`]       | Password login, logout, console sessions              |
//! | [`RoleService`]          | Role CRUD, cycle-safe reparenting, built-in seeding    |
//! | [`RoleAssignmentService`]| Grants/revokes roles, enforcing assignment legality    |
//! | [`TenancyService`]       | Organizations, projects, and their memberships        |
//! | [`ApiKeyService`]        | Issues, lists, and revokes API keys                   |

pub mod api_key_service;
pub mod invite_service;
pub mod oauth_service;
pub mod permission_service;
pub mod role_assignment_service;
pub mod role_service;
pub mod session_service;
pub mod tenancy_service;

pub use api_key_service::ApiKeyService;
pub use invite_service::InviteService;
pub use oauth_service::OAuthService;
pub use permission_service::PermissionService;
pub use role_assignment_service::RoleAssignmentService;
pub use role_service::RoleService;
pub use session_service::SessionService;
pub use tenancy_service::TenancyService;
