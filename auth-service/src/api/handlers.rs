//! # Request Handlers
//!
//! Extracts and validates the HTTP request, calls into the service layer,
//! and shapes the response. Handlers never touch `sqlx` or the role graph
//! directly — every piece of business logic lives one layer down.
//!
//! ## Error rendering
//!
//! Most handlers return `Result<HttpResponse, ApiError>` and let
//! `ResponseError for ApiError` render the generic envelope via `?`. The
//! `/oauth2/*` handlers are the exception: RFC 6749 requires its own JSON
//! or redirect error shape, so they match on the service result explicitly
//! instead of propagating through `ApiError`'s default rendering (see
//! `oauth_json_error` and `oauth_service::AuthorizeFailure`).

use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse};
use base64::Engine as _;
use shared::auth::Principal;
use shared::errors::{ApiError, OAuthErrorBody};
use shared::rbac::Permission;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{
    ClientType, NewMember, NewOAuthClient, NewOrganization, NewProject, NewRole, NewRoleAssignment,
    NewUser, PLATFORM_ID,
};
use crate::repository::Cursor;
use crate::service::oauth_service::{AuthorizeFailure, AuthorizeRequest, TokenRequest};
use crate::service::session_service::generate_opaque_token;
use crate::AppState;

use super::dto::*;

/// Resolves the `after`/`before` query id to the `(timestamp, id)` cursor
/// the repository layer pages on, given the entity's own timestamp field.
/// `after` and `before` aren't distinguished beyond this (both just name
/// the cursor row; direction comes from `order`), matching how plain
/// `limit`/`order`/cursor pagination is defined over this API.
fn cursor_of(created_at: chrono::DateTime<chrono::Utc>, id: Uuid) -> Cursor {
    Cursor { created_at, id }
}

// =============================================================================
// HEALTH
// =============================================================================

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        service: state.service_name.clone(),
    })
}

// =============================================================================
// USERS
// =============================================================================

pub async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    shared::auth::password::PasswordValidator::validate(&body.password).map_err(|errors| {
        ApiError::BadRequest {
            message: errors.join("; "),
        }
    })?;
    let hashed_password = state.password_hasher.hash(&body.password)?;
    let user = state
        .users
        .create(NewUser {
            username: body.username.clone(),
            email: body.email.clone(),
            full_name: body.full_name.clone(),
            phone: body.phone.clone(),
            hashed_password,
            metadata: serde_json::json!({}),
        })
        .await?;
    Ok(HttpResponse::Created().json(UserView::from(user)))
}

pub async fn get_user(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::UserGet)
        .await?;
    let user = state
        .users
        .find_by_id(path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound {
            resource: "user".to_string(),
        })?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn list_users(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::UserList)
        .await?;

    let cursor = match query.after.or(query.before) {
        None => None,
        Some(id) => state
            .users
            .find_by_id(id)
            .await?
            .map(|u| cursor_of(u.created_at, u.id)),
    };

    let (users, has_more) = state
        .users
        .list(cursor, query.limit_or_default(), query.order_or_default())
        .await?;
    let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |u| u.id.to_string())))
}

pub async fn update_user(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::UserUpdate)
        .await?;
    let user = state
        .users
        .update_profile(path.into_inner(), body.full_name.as_deref(), body.phone.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

pub async fn set_user_disabled(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<SetDisabledRequest>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::UserDisable)
        .await?;
    state.users.set_disabled(path.into_inner(), body.disabled).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

pub async fn create_organization(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<CreateOrganizationRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::OrgCreate)
        .await?;
    let org = state
        .tenancy
        .create_organization(NewOrganization {
            name: body.name.clone(),
            metadata: body.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
        })
        .await?;
    Ok(HttpResponse::Created().json(OrganizationView::from(org)))
}

pub async fn get_organization(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    state.permissions.check(&principal, id, Permission::OrgGet).await?;
    let org = state.tenancy.get_organization(id).await?;
    Ok(HttpResponse::Ok().json(OrganizationView::from(org)))
}

pub async fn list_organizations(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::OrgList)
        .await?;
    let cursor = match query.after.or(query.before) {
        None => None,
        Some(id) => state
            .tenancy
            .get_organization(id)
            .await
            .map(|o| cursor_of(o.created_at, o.id))
            .ok(),
    };
    let (orgs, has_more) = state
        .tenancy
        .list_organizations(cursor, query.limit_or_default(), query.order_or_default())
        .await?;
    let views: Vec<OrganizationView> = orgs.into_iter().map(OrganizationView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |o| o.id.to_string())))
}

pub async fn update_organization(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrganizationRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let id = path.into_inner();
    state
        .permissions
        .check(&principal, id, Permission::OrgUpdate)
        .await?;
    let org = state
        .tenancy
        .update_organization(id, body.name.as_deref(), body.metadata.clone())
        .await?;
    Ok(HttpResponse::Ok().json(OrganizationView::from(org)))
}

pub async fn set_organization_disabled(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<SetDisabledRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    state
        .permissions
        .check(&principal, id, Permission::OrgDisable)
        .await?;
    state.tenancy.set_organization_disabled(id, body.disabled).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_organization_member(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<AddMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let resource_id = path.into_inner();
    state
        .permissions
        .check(&principal, resource_id, Permission::OrgMemberCreate)
        .await?;
    let member = state
        .tenancy
        .add_organization_member(NewMember {
            resource_id,
            user_id: body.user_id,
            metadata: body.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
        })
        .await?;
    Ok(HttpResponse::Created().json(MemberView::from(member)))
}

pub async fn list_organization_members(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let resource_id = path.into_inner();
    state
        .permissions
        .check(&principal, resource_id, Permission::OrgMemberList)
        .await?;
    let (members, has_more) = state
        .tenancy
        .list_organization_members(resource_id, None, query.limit_or_default())
        .await?;
    let views: Vec<MemberView> = members.into_iter().map(MemberView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |m| m.user_id.to_string())))
}

pub async fn remove_organization_member(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (resource_id, user_id) = path.into_inner();
    state
        .permissions
        .check(&principal, resource_id, Permission::OrgMemberDelete)
        .await?;
    state.tenancy.remove_organization_member(resource_id, user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// PROJECTS
// =============================================================================

pub async fn create_project(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let organization_id = path.into_inner();
    state
        .permissions
        .check(&principal, organization_id, Permission::ProjectCreate)
        .await?;
    let project = state
        .tenancy
        .create_project(NewProject {
            organization_id,
            name: body.name.clone(),
            metadata: body.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
        })
        .await?;
    Ok(HttpResponse::Created().json(ProjectView::from(project)))
}

pub async fn get_project(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (_organization_id, project_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectGet)
        .await?;
    let project = state.tenancy.get_project(project_id).await?;
    Ok(HttpResponse::Ok().json(ProjectView::from(project)))
}

pub async fn list_projects(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let organization_id = path.into_inner();
    state
        .permissions
        .check(&principal, organization_id, Permission::ProjectList)
        .await?;
    let (projects, has_more) = state
        .tenancy
        .list_projects_by_organization(
            organization_id,
            None,
            query.limit_or_default(),
            query.order_or_default(),
        )
        .await?;
    let views: Vec<ProjectView> = projects.into_iter().map(ProjectView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |p| p.id.to_string())))
}

pub async fn update_project(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateProjectRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let (_organization_id, project_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectUpdate)
        .await?;
    let project = state
        .tenancy
        .update_project(project_id, body.name.as_deref(), body.metadata.clone())
        .await?;
    Ok(HttpResponse::Ok().json(ProjectView::from(project)))
}

pub async fn set_project_disabled(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<SetDisabledRequest>,
) -> Result<HttpResponse, ApiError> {
    let (_organization_id, project_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectDisable)
        .await?;
    state.tenancy.set_project_disabled(project_id, body.disabled).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_project_member(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<AddMemberRequest>,
) -> Result<HttpResponse, ApiError> {
    let (_organization_id, project_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectMemberCreate)
        .await?;
    let member = state
        .tenancy
        .add_project_member(NewMember {
            resource_id: project_id,
            user_id: body.user_id,
            metadata: body.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
        })
        .await?;
    Ok(HttpResponse::Created().json(MemberView::from(member)))
}

pub async fn list_project_members(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid)>,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let (_organization_id, project_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectMemberList)
        .await?;
    let (members, has_more) = state
        .tenancy
        .list_project_members(project_id, None, query.limit_or_default())
        .await?;
    let views: Vec<MemberView> = members.into_iter().map(MemberView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |m| m.user_id.to_string())))
}

pub async fn remove_project_member(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<(Uuid, Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (_organization_id, project_id, user_id) = path.into_inner();
    state
        .permissions
        .check(&principal, project_id, Permission::ProjectMemberDelete)
        .await?;
    state.tenancy.remove_project_member(project_id, user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// ROLES
// =============================================================================

pub async fn create_role(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<CreateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamRolesCreate)
        .await?;
    let role = state
        .roles
        .create(NewRole {
            name: body.name.clone(),
            permissions: body.permissions.clone(),
            parent_id: body.parent_id,
        })
        .await?;
    Ok(HttpResponse::Created().json(RoleView::from(role)))
}

pub async fn get_role(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamRolesGet)
        .await?;
    let role = state.roles.find(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(RoleView::from(role)))
}

pub async fn list_roles(state: web::Data<AppState>, principal: Principal) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamRolesList)
        .await?;
    let roles = state.roles.list_all().await?;
    let views: Vec<RoleView> = roles.into_iter().map(RoleView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, false, |r| r.id.to_string())))
}

pub async fn update_role(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamRolesUpdate)
        .await?;
    let role = state
        .roles
        .update(
            path.into_inner(),
            body.name.as_deref(),
            body.permissions.clone(),
            body.parent_id,
        )
        .await?;
    Ok(HttpResponse::Ok().json(RoleView::from(role)))
}

pub async fn set_role_disabled(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<SetDisabledRequest>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamRolesDelete)
        .await?;
    state.roles.set_disabled(path.into_inner(), body.disabled).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// ROLE ASSIGNMENTS
// =============================================================================

pub async fn create_role_assignment(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<CreateRoleAssignmentRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let assignment = state
        .role_assignments
        .create(
            &principal,
            NewRoleAssignment {
                target_id: body.target_id,
                role_id: body.role_id,
                resource_id: body.resource_id,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(RoleAssignmentView::from(assignment)))
}

pub async fn list_role_assignments(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<ListRoleAssignmentsQuery>,
) -> Result<HttpResponse, ApiError> {
    state
        .permissions
        .check(&principal, query.resource_id, Permission::IamGetPolicy)
        .await?;
    let (assignments, has_more) = state
        .role_assignments
        .list_for_resource(query.resource_id, None, query.page.limit_or_default())
        .await?;
    let views: Vec<RoleAssignmentView> = assignments.into_iter().map(RoleAssignmentView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |a| a.id.to_string())))
}

pub async fn delete_role_assignment(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state.role_assignments.delete(&principal, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// API KEYS
// =============================================================================

pub async fn create_api_key(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<CreateApiKeyRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, body.resource_id, Permission::ApiKeyCreate)
        .await?;
    let expires_at = body
        .expires_at
        .map(|ts| chrono::DateTime::from_timestamp(ts, 0).unwrap_or_else(chrono::Utc::now));
    let created = state
        .api_keys
        .create(principal.user_id(), body.resource_id, &body.decorator, expires_at)
        .await?;
    Ok(HttpResponse::Created().json(ApiKeyCreatedView {
        key: ApiKeyView::from(created.record),
        secret: created.plaintext,
    }))
}

pub async fn get_api_key(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let key = state.api_keys.get(path.into_inner()).await?;
    state
        .permissions
        .check(&principal, key.resource_id, Permission::ApiKeyGet)
        .await?;
    Ok(HttpResponse::Ok().json(ApiKeyView::from(key)))
}

pub async fn list_api_keys(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let (keys, has_more) = state
        .api_keys
        .list_for_user(
            principal.user_id(),
            None,
            query.limit_or_default(),
            query.order_or_default(),
        )
        .await?;
    let views: Vec<ApiKeyView> = keys.into_iter().map(ApiKeyView::from).collect();
    Ok(HttpResponse::Ok().json(ListResponse::new(views, has_more, |k| k.id.to_string())))
}

pub async fn revoke_api_key(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let key = state.api_keys.get(id).await?;
    state
        .permissions
        .check(&principal, key.resource_id, Permission::ApiKeyDelete)
        .await?;
    state.api_keys.revoke(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// INVITES
// =============================================================================

pub async fn create_invite(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<CreateInviteRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let resource_id = path.into_inner();
    state
        .permissions
        .check(&principal, resource_id, Permission::UserInvite)
        .await?;
    let invite = state
        .invites
        .create(
            resource_id,
            body.email.clone(),
            principal.user_id(),
            generate_opaque_token(),
            chrono::Duration::days(7),
        )
        .await?;
    Ok(HttpResponse::Created().json(InviteView::from(invite)))
}

/// Accepts an invite for the currently authenticated user — `POST /verify`.
pub async fn verify_invite(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<AcceptInviteRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state.invites.accept(&body.token, principal.user_id()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// CONSOLE SESSIONS
// =============================================================================

pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let result = state
        .sessions
        .login(&body.identifier, &body.password, "console")
        .await?;
    Ok(HttpResponse::Ok()
        .cookie(
            Cookie::build("session", result.session.cookie_value)
                .http_only(true)
                .path("/")
                .finish(),
        )
        .json(LoginResponse {
            user: UserView::from(result.user),
            expires_at: result.session.expires_at.timestamp(),
        }))
}

fn session_cookie(req: &HttpRequest) -> Result<String, ApiError> {
    req.cookie("session")
        .map(|c| c.value().to_string())
        .ok_or(ApiError::MissingAuth)
}

pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let cookie = session_cookie(&req)?;
    state.sessions.logout(&cookie).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn logout_all(state: web::Data<AppState>, principal: Principal) -> Result<HttpResponse, ApiError> {
    state.sessions.logout_all(principal.user_id()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// =============================================================================
// /me
// =============================================================================

pub async fn get_me(principal: Principal) -> Result<HttpResponse, ApiError> {
    let (kind, restricted_to) = match &principal {
        Principal::User(_) => ("user", None),
        Principal::ApiKey(key) => ("api_key", Some(key.resource_id)),
    };
    Ok(HttpResponse::Ok().json(PrincipalView {
        kind,
        user_id: principal.user_id(),
        restricted_to,
    }))
}

pub async fn get_me_permissions(
    state: web::Data<AppState>,
    principal: Principal,
) -> Result<HttpResponse, ApiError> {
    let mut granted = Vec::new();
    for permission in Permission::ALL {
        if state
            .permissions
            .check(&principal, PLATFORM_ID, *permission)
            .await
            .is_ok()
        {
            granted.push(permission.as_str());
        }
    }
    Ok(HttpResponse::Ok().json(granted))
}

pub async fn evaluate_me_permission(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<EvaluatePermissionRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    let permission = Permission::from_str(&body.permission).ok_or_else(|| ApiError::BadRequest {
        message: format!("unknown permission: {}", body.permission),
    })?;
    let allowed = state
        .permissions
        .check(&principal, body.resource_id, permission)
        .await
        .is_ok();
    Ok(HttpResponse::Ok().json(EvaluatePermissionResponse { allowed }))
}

// =============================================================================
// OAUTH2 CLIENTS (administrative)
// =============================================================================

pub async fn register_oauth_client(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<RegisterOAuthClientRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate().map_err(ApiError::ValidationError)?;
    state
        .permissions
        .check(&principal, PLATFORM_ID, Permission::IamSetPolicy)
        .await?;

    let client_type: ClientType = body.client_type.parse().map_err(|_| ApiError::BadRequest {
        message: "clientType must be \"public\" or \"confidential\"".to_string(),
    })?;
    let client_secret = match client_type {
        ClientType::Confidential => Some(generate_opaque_token()),
        ClientType::Public => None,
    };

    let client = state
        .oauth_clients
        .create(NewOAuthClient {
            client_id: generate_opaque_token(),
            client_secret: client_secret.clone(),
            client_type,
            name: body.name.clone(),
            redirect_uris: body.redirect_uris.clone(),
            allowed_scopes: body.allowed_scopes.clone(),
            allowed_grant_types: body.allowed_grant_types.clone(),
            project_id: body.project_id,
        })
        .await?;

    Ok(HttpResponse::Created().json(OAuthClientCreatedView {
        client: OAuthClientView::from(client),
        client_secret,
    }))
}

// =============================================================================
// OAUTH2 / OIDC PROTOCOL SURFACE
// =============================================================================

/// Renders an `ApiError` as the RFC 6749 JSON error body — used whenever
/// there's no validated `redirect_uri` to carry the error instead (every
/// `/oauth2/token`, `/oauth2/revoke`, `/oauth2/introspect`, and
/// `/oauth2/userinfo` failure, plus `/oauth2/authorize` failures discovered
/// before its `redirect_uri` is validated).
fn oauth_json_error(error: &ApiError, state: Option<String>) -> HttpResponse {
    let body = OAuthErrorBody::from_error(error, state);
    HttpResponse::build(error.status_code()).json(body)
}

pub async fn authorize(
    state: web::Data<AppState>,
    principal: Principal,
    query: web::Query<AuthorizeQuery>,
) -> HttpResponse {
    let req = AuthorizeRequest {
        client_id: query.client_id.clone(),
        redirect_uri: query.redirect_uri.clone(),
        response_type: query.response_type.clone(),
        scope: query.scope.clone(),
        state: query.state.clone(),
        code_challenge: query.code_challenge.clone(),
        code_challenge_method: query.code_challenge_method.clone(),
        nonce: query.nonce.clone(),
        user_id: principal.user_id(),
    };

    match state.oauth.authorize(req).await {
        Ok(redirect) => HttpResponse::Found()
            .append_header(("Location", redirect.redirect_uri))
            .finish(),
        Err(AuthorizeFailure::BeforeRedirectValidated(error)) => oauth_json_error(&error, None),
        Err(AuthorizeFailure::AfterRedirectValidated {
            redirect_uri,
            error,
            state: oauth_state,
        }) => {
            let location = OAuthErrorBody::from_error(&error, oauth_state).into_redirect_query(&redirect_uri);
            HttpResponse::Found().append_header(("Location", location)).finish()
        }
    }
}

fn basic_auth(req: &HttpRequest) -> Option<(String, String)> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}

pub async fn token(state: web::Data<AppState>, req: HttpRequest, form: web::Form<TokenForm>) -> HttpResponse {
    let form = form.into_inner();
    let token_req = TokenRequest {
        grant_type: form.grant_type,
        code: form.code,
        redirect_uri: form.redirect_uri,
        code_verifier: form.code_verifier,
        refresh_token: form.refresh_token,
        scope: form.scope,
        client_id: form.client_id,
        client_secret: form.client_secret,
        basic_auth: basic_auth(&req),
    };

    match state.oauth.token(token_req).await {
        Ok(response) => HttpResponse::Ok().json(TokenResponseDto {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            refresh_token: response.refresh_token,
            scope: response.scope,
        }),
        Err(error) => oauth_json_error(&error, None),
    }
}

pub async fn revoke(state: web::Data<AppState>, req: HttpRequest, form: web::Form<RevokeForm>) -> HttpResponse {
    let form = form.into_inner();
    let token_req = TokenRequest {
        grant_type: String::new(),
        code: None,
        redirect_uri: None,
        code_verifier: None,
        refresh_token: None,
        scope: None,
        client_id: form.client_id,
        client_secret: form.client_secret,
        basic_auth: basic_auth(&req),
    };
    match state.oauth.revoke(&token_req, &form.token).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(error) => oauth_json_error(&error, None),
    }
}

pub async fn introspect(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<IntrospectForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let token_req = TokenRequest {
        grant_type: String::new(),
        code: None,
        redirect_uri: None,
        code_verifier: None,
        refresh_token: None,
        scope: None,
        client_id: form.client_id,
        client_secret: form.client_secret,
        basic_auth: basic_auth(&req),
    };
    match state.oauth.introspect(&token_req, &form.token).await {
        Ok(response) => HttpResponse::Ok().json(IntrospectResponseDto {
            active: response.active,
            scope: response.scope,
            client_id: response.client_id,
            token_type: response.token_type,
            exp: response.exp,
            iat: response.iat,
            sub: response.sub.map(|id| id.to_string()),
        }),
        Err(error) => oauth_json_error(&error, None),
    }
}

pub async fn userinfo(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let auth_header = match req.headers().get("Authorization").and_then(|h| h.to_str().ok()) {
        Some(header) => header,
        None => return oauth_json_error(&ApiError::MissingAuth, None),
    };
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(token) => token,
        None => return oauth_json_error(&ApiError::MissingAuth, None),
    };

    match state.oauth.userinfo(token).await {
        Ok(claims) => HttpResponse::Ok().json(UserInfoResponseDto {
            sub: claims.sub.to_string(),
            preferred_username: claims.preferred_username,
            email: claims.email,
            phone_number: claims.phone_number,
            name: claims.name,
        }),
        Err(error) => oauth_json_error(&error, None),
    }
}

pub async fn discovery_document(state: web::Data<AppState>) -> HttpResponse {
    let issuer = state.jwt.issuer().to_string();
    HttpResponse::Ok().json(DiscoveryDocument {
        authorization_endpoint: format!("{issuer}/oauth2/authorize"),
        token_endpoint: format!("{issuer}/oauth2/token"),
        userinfo_endpoint: format!("{issuer}/oauth2/userinfo"),
        revocation_endpoint: format!("{issuer}/oauth2/revoke"),
        introspection_endpoint: format!("{issuer}/oauth2/introspect"),
        jwks_uri: format!("{issuer}/oauth2/.well-known/jwks.json"),
        issuer,
        response_types_supported: vec!["code"],
        grant_types_supported: vec!["authorization_code", "refresh_token"],
        subject_types_supported: vec!["public"],
        id_token_signing_alg_values_supported: vec![state.jwt.algorithm_name().to_string()],
        scopes_supported: shared::rbac::scope::KNOWN_SCOPES.to_vec(),
        token_endpoint_auth_methods_supported: vec!["client_secret_basic", "client_secret_post", "none"],
        code_challenge_methods_supported: vec!["plain", "S256"],
    })
}

pub async fn jwks(state: web::Data<AppState>) -> HttpResponse {
    match state.jwt.jwks() {
        Some(document) => HttpResponse::Ok().json(document),
        None => HttpResponse::Ok().json(serde_json::json!({ "keys": [] })),
    }
}
