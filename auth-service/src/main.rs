//! # Authentication & Authorization Service
//!
//! A multi-tenant OAuth 2.0 / OIDC identity provider with hierarchical
//! RBAC. This service follows **Clean Architecture** principles with clear
//! separation between layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! │  PermissionService · OAuthService · InviteService                │
//! │  SessionService · RoleService · RoleAssignmentService            │
//! │  TenancyService · ApiKeyService                                  │
//! └─────────────────────────────┼───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                 │
//! │  One repository per table, sqlx-backed, cursor-paginated         │
//! └─────────────────────────────┼───────────────────────────────────┘
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (domain/)                       │
//! │  Entities, `New*` constructors, the `PLATFORM_ID` hierarchy root │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Endpoints
//!
//! - `/v1/users`, `/v1/organizations`, `/v1/organizations/{id}/projects`,
//!   `/v1/roles`, `/v1/role-assignments`, `/v1/api-keys` — resource CRUD,
//!   permission-checked per request via [`shared::auth::Principal`].
//! - `/oauth2/{authorize,token,revoke,introspect,userinfo}` plus discovery
//!   and JWKS documents.
//! - `/me`, `/me/permissions`, `/me/permissions/evaluate`, `/verify`,
//!   `/login`, `/logout`, `/logout-all`.
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`shared::config::AppConfig`].

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::auth::{jwt::JwtService, password::PasswordHasher, PrincipalResolver};
use shared::config::AppConfig;
use shared::database;
use shared::revocation::build_revocation_set;
use shared::tracing_config;
use std::sync::Arc;
use tracing::info;

mod api;
mod domain;
mod repository;
mod service;

use api::routes;
use repository::{
    ApiKeyRepository, AuthorizationCodeRepository, InviteRepository, OAuthClientRepository,
    OAuth2TokenRepository, OrganizationMemberRepository, OrganizationRepository,
    ProjectMemberRepository, ProjectRepository, RoleAssignmentRepository, RoleRepository,
    SessionRepository, TenancyHierarchy, UserRepository,
};
use service::{
    ApiKeyService, InviteService, OAuthService, PermissionService, RoleAssignmentService,
    RoleService, SessionService, TenancyService,
};

/// Shared application state injected into every handler via
/// [`actix_web::web::Data`]. Each field is one service or repository the
/// handlers call directly — there's no facade service wrapping all of
/// them, since the handlers already sit at the seam between HTTP and the
/// service layer.
pub struct AppState {
    pub service_name: String,
    pub password_hasher: Arc<PasswordHasher>,
    pub users: Arc<UserRepository>,
    pub permissions: Arc<PermissionService>,
    pub tenancy: Arc<TenancyService>,
    pub roles: Arc<RoleService>,
    pub role_assignments: Arc<RoleAssignmentService>,
    pub api_keys: Arc<ApiKeyService>,
    pub invites: Arc<InviteService>,
    pub sessions: Arc<SessionService>,
    pub oauth: Arc<OAuthService>,
    pub oauth_clients: Arc<OAuthClientRepository>,
    pub jwt: Arc<JwtService>,
}

/// Application entry point and server initialization.
///
/// # Initialization Sequence
///
/// 1. Load configuration from environment variables
/// 2. Initialize structured logging/tracing
/// 3. Create PostgreSQL connection pool
/// 4. Build the revocation set (Redis if configured, in-process otherwise)
/// 5. Instantiate repositories and services, seed built-in roles
/// 6. Configure and start the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting auth-service"
    );

    let db_pool = database::create_pool(&config.database)
        .await
        .expect("Failed to create database pool");

    let revocation = build_revocation_set(&config.cache)
        .await
        .expect("Failed to initialize revocation set");

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
    let password_hasher = Arc::new(PasswordHasher::new());

    let users = Arc::new(UserRepository::new(db_pool.clone()));
    let organizations = Arc::new(OrganizationRepository::new(db_pool.clone()));
    let projects = Arc::new(ProjectRepository::new(db_pool.clone()));
    let org_members = Arc::new(OrganizationMemberRepository::new(db_pool.clone()));
    let project_members = Arc::new(ProjectMemberRepository::new(db_pool.clone()));
    let hierarchy = Arc::new(TenancyHierarchy::new(db_pool.clone()));
    let roles_repo = Arc::new(RoleRepository::new(db_pool.clone()));
    let role_assignments_repo = Arc::new(RoleAssignmentRepository::new(db_pool.clone()));
    let api_keys_repo = Arc::new(ApiKeyRepository::new(db_pool.clone()));
    let invites_repo = Arc::new(InviteRepository::new(db_pool.clone()));
    let sessions_repo = Arc::new(SessionRepository::new(db_pool.clone()));
    let oauth_clients_repo = Arc::new(OAuthClientRepository::new(db_pool.clone()));
    let oauth_codes_repo = Arc::new(AuthorizationCodeRepository::new(db_pool.clone()));
    let oauth_tokens_repo = Arc::new(OAuth2TokenRepository::new(db_pool.clone()));

    let permissions = Arc::new(PermissionService::new(
        roles_repo.clone(),
        role_assignments_repo.clone(),
        hierarchy,
    ));
    let tenancy = Arc::new(TenancyService::new(
        organizations.clone(),
        projects.clone(),
        org_members.clone(),
        project_members.clone(),
    ));
    let role_service = Arc::new(RoleService::new(roles_repo.clone()));
    role_service
        .seed_builtin_roles()
        .await
        .expect("Failed to seed built-in roles");
    let role_assignments = Arc::new(RoleAssignmentService::new(
        role_assignments_repo.clone(),
        roles_repo.clone(),
        permissions.clone(),
    ));
    let api_keys = Arc::new(ApiKeyService::new(api_keys_repo.clone()));
    let invites = Arc::new(InviteService::new(
        invites_repo,
        organizations,
        projects,
        org_members,
        project_members,
        roles_repo,
        role_assignments_repo,
    ));
    let sessions = Arc::new(SessionService::new(
        users.clone(),
        sessions_repo.clone(),
        jwt_service.clone(),
        revocation.clone(),
        password_hasher.clone(),
    ));
    let oauth = Arc::new(OAuthService::new(
        oauth_clients_repo.clone(),
        oauth_codes_repo,
        oauth_tokens_repo,
        users.clone(),
        jwt_service.clone(),
    ));

    let principal_resolver = web::Data::new(PrincipalResolver::new(
        jwt_service.clone(),
        revocation,
        users.clone(),
        api_keys_repo,
        sessions_repo,
    ));

    let app_state = web::Data::new(AppState {
        service_name: config.service_name.clone(),
        password_hasher,
        users,
        permissions,
        tenancy,
        roles: role_service,
        role_assignments,
        api_keys,
        invites,
        sessions,
        oauth,
        oauth_clients: oauth_clients_repo,
        jwt: jwt_service,
    });

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin() // TODO: Configure specific origins for production
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .app_data(principal_resolver.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
