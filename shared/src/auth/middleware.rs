//! # Principal Resolution
//!
//! Generalizes a single `AuthenticatedUser` extractor into a tagged
//! [`Principal`] that can be a user, an API key, or (console
//! routes only) a session. Resolution is a short ordered list of matchers —
//! the first one that claims the presented credential decides — rather than
//! a single JWT-only path:
//!
//! 1. Parses as a locally-issued, signature-valid, unexpired JWT → look up
//!    the subject in the user store, reject if disabled → [`Principal::User`].
//! 2. Has the API-key plaintext shape (`<decorator>-<secret>`) → hash and
//!    look up by prefix, reject if disabled or expired → [`Principal::ApiKey`].
//! 3. Otherwise unauthenticated.
//!
//! Console routes additionally accept a session cookie; see
//! [`PrincipalResolver::resolve_session_cookie`].
//!
//! The user/API-key/session lookups are behind traits (same pattern as
//! `shared::rbac::evaluator`'s `RoleAssignmentLookup`/`ResourceHierarchy`) so
//! this module stays free of a direct `sqlx` dependency; `auth-service`
//! implements them against Postgres.

use crate::auth::api_key;
use crate::auth::jwt::JwtService;
use crate::errors::ApiError;
use crate::revocation::RevocationSet;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// A resolved user principal: a human account authenticated via JWT or
/// session cookie.
#[derive(Debug, Clone, Copy)]
pub struct UserPrincipal {
    pub user_id: Uuid,
}

/// A resolved API-key principal: a machine credential scoped to exactly one
/// resource (organization or project). [`crate::rbac::PermissionEvaluator`]
/// enforces that scope; this type just carries it.
#[derive(Debug, Clone, Copy)]
pub struct ApiKeyPrincipal {
    pub key_id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
}

/// Whatever presented a valid credential on this request.
#[derive(Debug, Clone, Copy)]
pub enum Principal {
    User(UserPrincipal),
    ApiKey(ApiKeyPrincipal),
}

impl Principal {
    /// The id used to look up role assignments: the user's id, or the
    /// key's own id for API-key principals (assignments target either
    /// `User.id` or `APIKey.id`, per the data model).
    pub fn assignment_target_id(&self) -> Uuid {
        match self {
            Principal::User(u) => u.user_id,
            Principal::ApiKey(k) => k.key_id,
        }
    }

    /// The human account behind this principal (the key's creator, for API
    /// keys), for audit logging and `user_id`-scoped queries.
    pub fn user_id(&self) -> Uuid {
        match self {
            Principal::User(u) => u.user_id,
            Principal::ApiKey(k) => k.user_id,
        }
    }

    /// The resource an API-key principal is confined to. `None` for user
    /// principals, which aren't scope-restricted at this layer.
    pub fn restricted_to(&self) -> Option<Uuid> {
        match self {
            Principal::User(_) => None,
            Principal::ApiKey(k) => Some(k.resource_id),
        }
    }
}

/// Whether a user account is currently usable as a principal.
#[async_trait]
pub trait PrincipalUserStore: Send + Sync {
    async fn is_active_user(&self, user_id: Uuid) -> Result<bool, ApiError>;
}

/// One API key row whose stored prefix matched the presented secret's
/// prefix; the resolver still must verify the full secret against `salt`
/// and `hashed_key` before trusting this candidate.
#[derive(Debug, Clone)]
pub struct ApiKeyCandidate {
    pub key_id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub salt: Vec<u8>,
    pub hashed_key: Vec<u8>,
    pub disabled: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PrincipalApiKeyStore: Send + Sync {
    async fn candidates_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKeyCandidate>, ApiError>;
}

/// Resolves a session cookie to the user it's pinned to, after confirming
/// the session's embedded token is still live. Returns `None` (not an
/// error) for an unknown cookie value so the caller can collapse it to the
/// same `unauthenticated` outcome as every other failed match.
#[async_trait]
pub trait PrincipalSessionStore: Send + Sync {
    async fn resolve_session(&self, cookie_value: &str) -> Result<Option<Uuid>, ApiError>;
}

/// Runs the ordered credential-matching procedure described at module level.
pub struct PrincipalResolver {
    jwt: Arc<JwtService>,
    revocation: Arc<dyn RevocationSet>,
    users: Arc<dyn PrincipalUserStore>,
    api_keys: Arc<dyn PrincipalApiKeyStore>,
    sessions: Arc<dyn PrincipalSessionStore>,
}

impl PrincipalResolver {
    pub fn new(
        jwt: Arc<JwtService>,
        revocation: Arc<dyn RevocationSet>,
        users: Arc<dyn PrincipalUserStore>,
        api_keys: Arc<dyn PrincipalApiKeyStore>,
        sessions: Arc<dyn PrincipalSessionStore>,
    ) -> Self {
        Self {
            jwt,
            revocation,
            users,
            api_keys,
            sessions,
        }
    }

    /// Resolves an `Authorization: Bearer <credential>` value: JWT first,
    /// then API-key shape. Never attempts session resolution — that's a
    /// separate, cookie-keyed path for console routes only.
    pub async fn resolve_bearer(&self, credential: &str) -> Result<Principal, ApiError> {
        if let Ok(claims) = self.jwt.validate_access_token(credential) {
            if self
                .revocation
                .is_token_blacklisted(&claims.jti.to_string())
                .await?
            {
                return Err(ApiError::InvalidToken);
            }
            if !self.users.is_active_user(claims.sub).await? {
                return Err(ApiError::InvalidToken);
            }
            return Ok(Principal::User(UserPrincipal {
                user_id: claims.sub,
            }));
        }

        if let Some((_decorator, secret)) = api_key::split_plaintext(credential) {
            let prefix = api_key::prefix_of(secret);
            let candidates = self.api_keys.candidates_by_prefix(&prefix).await?;
            let now = Utc::now();

            for candidate in candidates {
                if candidate.disabled {
                    continue;
                }
                if candidate.expires_at.is_some_and(|exp| exp <= now) {
                    continue;
                }
                if api_key::verify(secret, &candidate.salt, &candidate.hashed_key)? {
                    return Ok(Principal::ApiKey(ApiKeyPrincipal {
                        key_id: candidate.key_id,
                        user_id: candidate.user_id,
                        resource_id: candidate.resource_id,
                    }));
                }
            }

            return Err(ApiError::MissingAuth);
        }

        Err(ApiError::MissingAuth)
    }

    /// Resolves a console session cookie to a [`Principal::User`].
    pub async fn resolve_session_cookie(&self, cookie_value: &str) -> Result<Principal, ApiError> {
        let user_id = self
            .sessions
            .resolve_session(cookie_value)
            .await?
            .ok_or(ApiError::MissingAuth)?;

        if !self.users.is_active_user(user_id).await? {
            return Err(ApiError::MissingAuth);
        }

        Ok(Principal::User(UserPrincipal { user_id }))
    }

    /// Runs the full procedure for an inbound request: bearer header if
    /// present, else the console session cookie.
    pub async fn resolve_request(&self, req: &HttpRequest) -> Result<Principal, ApiError> {
        if let Some(header) = req.headers().get("Authorization") {
            let header_str = header.to_str().map_err(|_| ApiError::MissingAuth)?;
            let credential = JwtService::extract_from_header(header_str)
                .unwrap_or(header_str.trim_start_matches("Bearer ").trim());
            return self.resolve_bearer(credential).await;
        }

        if let Some(cookie) = req.cookie("session") {
            return self.resolve_session_cookie(cookie.value()).await;
        }

        Err(ApiError::MissingAuth)
    }
}

/// Extracts an already-resolved [`Principal`] from request extensions.
///
/// Mirrors a plain `AuthenticatedUser: FromRequest` shape: the actual
/// async resolution happens once per request (here, inline in
/// `from_request`, via the `PrincipalResolver` registered as app data)
/// rather than being duplicated by every handler that needs the principal.
impl FromRequest for Principal {
    type Error = ApiError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let resolver = req
                .app_data::<actix_web::web::Data<PrincipalResolver>>()
                .cloned()
                .ok_or_else(|| ApiError::InternalError {
                    message: "PrincipalResolver not configured".to_string(),
                })?;
            resolver.resolve_request(&req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtAlgorithm, JwtConfig};
    use crate::revocation::InMemoryRevocationSet;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn jwt_service() -> Arc<JwtService> {
        Arc::new(JwtService::new(JwtConfig {
            secret: "test-secret-at-least-32-bytes-long".to_string(),
            algorithm: JwtAlgorithm::Hs256,
            kid: None,
            private_key_path: None,
            public_key_path: None,
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 604_800,
            issuer: "https://auth.example.test".to_string(),
            audience: "default".to_string(),
        }))
    }

    struct FakeUsers(Mutex<HashMap<Uuid, bool>>);

    #[async_trait]
    impl PrincipalUserStore for FakeUsers {
        async fn is_active_user(&self, user_id: Uuid) -> Result<bool, ApiError> {
            Ok(*self.0.lock().unwrap().get(&user_id).unwrap_or(&false))
        }
    }

    struct FakeApiKeys(Vec<ApiKeyCandidate>);

    #[async_trait]
    impl PrincipalApiKeyStore for FakeApiKeys {
        async fn candidates_by_prefix(
            &self,
            _prefix: &str,
        ) -> Result<Vec<ApiKeyCandidate>, ApiError> {
            // Real backends filter by stored prefix in SQL; the fake just
            // returns every candidate and lets `verify` do the real work.
            Ok(self.0.clone())
        }
    }

    struct NoSessions;

    #[async_trait]
    impl PrincipalSessionStore for NoSessions {
        async fn resolve_session(&self, _cookie_value: &str) -> Result<Option<Uuid>, ApiError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_resolve_bearer_jwt_for_active_user() {
        let jwt = jwt_service();
        let user_id = Uuid::new_v4();
        let (token, _jti, _exp) = jwt.issue_access_token(user_id, "client", "openid").unwrap();

        let users = Arc::new(FakeUsers(Mutex::new(HashMap::from([(user_id, true)]))));
        let resolver = PrincipalResolver::new(
            jwt,
            Arc::new(InMemoryRevocationSet::new()),
            users,
            Arc::new(FakeApiKeys(vec![])),
            Arc::new(NoSessions),
        );

        let principal = resolver.resolve_bearer(&token).await.unwrap();
        assert_eq!(principal.user_id(), user_id);
        assert!(matches!(principal, Principal::User(_)));
    }

    #[tokio::test]
    async fn test_resolve_bearer_rejects_disabled_user() {
        let jwt = jwt_service();
        let user_id = Uuid::new_v4();
        let (token, _jti, _exp) = jwt.issue_access_token(user_id, "client", "openid").unwrap();

        let users = Arc::new(FakeUsers(Mutex::new(HashMap::from([(user_id, false)]))));
        let resolver = PrincipalResolver::new(
            jwt,
            Arc::new(InMemoryRevocationSet::new()),
            users,
            Arc::new(FakeApiKeys(vec![])),
            Arc::new(NoSessions),
        );

        assert!(resolver.resolve_bearer(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_bearer_api_key_shape() {
        let generated = api_key::generate("sk");
        let key_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let resource_id = Uuid::new_v4();

        let candidate = ApiKeyCandidate {
            key_id,
            user_id,
            resource_id,
            salt: generated.salt.clone(),
            hashed_key: generated.hashed_key.clone(),
            disabled: false,
            expires_at: None,
        };

        let resolver = PrincipalResolver::new(
            jwt_service(),
            Arc::new(InMemoryRevocationSet::new()),
            Arc::new(FakeUsers(Mutex::new(HashMap::new()))),
            Arc::new(FakeApiKeys(vec![candidate])),
            Arc::new(NoSessions),
        );

        let principal = resolver.resolve_bearer(&generated.plaintext).await.unwrap();
        match principal {
            Principal::ApiKey(k) => {
                assert_eq!(k.key_id, key_id);
                assert_eq!(k.resource_id, resource_id);
            }
            _ => panic!("expected api key principal"),
        }
    }

    #[tokio::test]
    async fn test_resolve_bearer_rejects_garbage() {
        let resolver = PrincipalResolver::new(
            jwt_service(),
            Arc::new(InMemoryRevocationSet::new()),
            Arc::new(FakeUsers(Mutex::new(HashMap::new()))),
            Arc::new(FakeApiKeys(vec![])),
            Arc::new(NoSessions),
        );

        assert!(resolver.resolve_bearer("not-a-credential").await.is_err());
    }
}
