//! # OAuth2 / OIDC State Machine
//!
//! Implements the `/oauth2/{authorize,token,revoke,introspect,userinfo}`
//! protocol surface against the repositories: client and `redirect_uri`
//! validation, PKCE, the `authorization_code` and `refresh_token` grants,
//! and RFC 7009/7662 revocation and introspection. Discovery and JWKS
//! documents are static per deployment and are served directly from
//! [`JwtService`] by the API layer, not through this service.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use shared::auth::JwtService;
use shared::errors::ApiError;
use shared::rbac::scope::validate_scope_string;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::{NewAuthorizationCode, NewOAuth2Token, OAuthClient};
use crate::repository::{AuthorizationCodeRepository, OAuth2TokenRepository, OAuthClientRepository, UserRepository};
use crate::service::session_service::generate_opaque_token;

/// How long an authorization code lives between issuance and redemption.
/// Not configurable per client — a code is meant to be redeemed within one
/// browser redirect, not held.
const AUTHORIZATION_CODE_TTL: chrono::Duration = chrono::Duration::minutes(10);

#[derive(Clone)]
pub struct OAuthService {
    clients: Arc<OAuthClientRepository>,
    codes: Arc<AuthorizationCodeRepository>,
    tokens: Arc<OAuth2TokenRepository>,
    users: Arc<UserRepository>,
    jwt: Arc<JwtService>,
}

/// A request to `/oauth2/authorize`. Field names match the RFC 6749 query
/// parameters except `user_id`, which the API layer supplies from the
/// caller's already-established console session (the endpoint itself never
/// authenticates a user — principal resolution must have done that already).
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scope: String,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub user_id: Uuid,
}

/// The URI the caller must 302 to, success or failure: both are encoded as
/// query parameters on the client's `redirect_uri`.
pub struct AuthorizeRedirect {
    pub redirect_uri: String,
}

/// An authorize failure's rendering depends on *when* it was discovered.
/// Before `redirect_uri` is validated there is nowhere safe to send the
/// browser, so the error is JSON; after, it rides along in the redirect.
pub enum AuthorizeFailure {
    BeforeRedirectValidated(ApiError),
    AfterRedirectValidated {
        redirect_uri: String,
        error: ApiError,
        state: Option<String>,
    },
}

/// A request to `/oauth2/token`, already parsed out of the
/// `application/x-www-form-urlencoded` body plus whatever client
/// authentication the API layer found (HTTP Basic or form fields).
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub basic_auth: Option<(String, String)>,
}

pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// RFC 7662 introspection response. `active: false` is the entire body for
/// an unknown, expired, or revoked token — every other field stays `None`.
#[derive(Default)]
pub struct IntrospectionResponse {
    pub active: bool,
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub token_type: Option<&'static str>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub sub: Option<Uuid>,
}

/// Claims gated by the scopes an access token actually carries, per
/// `/oauth2/userinfo`.
pub struct UserInfoClaims {
    pub sub: Uuid,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub name: Option<String>,
}

impl OAuthService {
    pub fn new(
        clients: Arc<OAuthClientRepository>,
        codes: Arc<AuthorizationCodeRepository>,
        tokens: Arc<OAuth2TokenRepository>,
        users: Arc<UserRepository>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self {
            clients,
            codes,
            tokens,
            users,
            jwt,
        }
    }

    /// Validates the request and, on success, mints an authorization code
    /// and returns the redirect target. Failures before the redirect URI is
    /// validated surface as [`AuthorizeFailure::BeforeRedirectValidated`];
    /// everything after rides along in the redirect query string instead.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<AuthorizeRedirect, AuthorizeFailure> {
        let client = self
            .clients
            .find_by_client_id(&req.client_id)
            .await
            .map_err(AuthorizeFailure::BeforeRedirectValidated)?
            .ok_or(AuthorizeFailure::BeforeRedirectValidated(ApiError::InvalidClient))?;

        if client.disabled {
            return Err(AuthorizeFailure::BeforeRedirectValidated(ApiError::InvalidClient));
        }
        if !client.registers_redirect_uri(&req.redirect_uri) {
            return Err(AuthorizeFailure::BeforeRedirectValidated(ApiError::InvalidRequest {
                description: "redirect_uri is not registered for this client".to_string(),
            }));
        }

        let fail = |error: ApiError, state: Option<String>| AuthorizeFailure::AfterRedirectValidated {
            redirect_uri: req.redirect_uri.clone(),
            error,
            state,
        };

        if req.response_type != "code" {
            return Err(fail(ApiError::UnsupportedResponseType, req.state.clone()));
        }
        if !client.allows_grant("authorization_code") {
            return Err(fail(ApiError::UnsupportedGrantType, req.state.clone()));
        }
        if req.scope.trim().is_empty() || !validate_scope_string(&req.scope) {
            return Err(fail(ApiError::InvalidScope, req.state.clone()));
        }
        if req.code_challenge.is_some() && req.code_challenge_method.is_none() {
            return Err(fail(
                ApiError::InvalidRequest {
                    description: "code_challenge_method is required when code_challenge is present"
                        .to_string(),
                },
                req.state.clone(),
            ));
        }

        let now = Utc::now();
        let code = self
            .codes
            .create(NewAuthorizationCode {
                code: generate_opaque_token(),
                client_id: client.client_id.clone(),
                redirect_uri: req.redirect_uri.clone(),
                scope: req.scope.clone(),
                user_id: req.user_id,
                nonce: req.nonce.clone(),
                code_challenge: req.code_challenge.clone(),
                code_challenge_method: req.code_challenge_method.clone(),
                auth_time: now,
                expires_at: now + AUTHORIZATION_CODE_TTL,
            })
            .await
            .map_err(|e| fail(e, req.state.clone()))?;

        tracing::info!(
            user_id = %req.user_id,
            client_id = %client.client_id,
            scope = %req.scope,
            "oauth2 authorization code issued"
        );

        let mut url = url::Url::parse(&req.redirect_uri).map_err(|_| {
            fail(
                ApiError::InvalidRequest {
                    description: "redirect_uri is not a valid URL".to_string(),
                },
                req.state.clone(),
            )
        })?;
        url.query_pairs_mut().append_pair("code", &code.code);
        if let Some(state) = &req.state {
            url.query_pairs_mut().append_pair("state", state);
        }
        Ok(AuthorizeRedirect {
            redirect_uri: url.to_string(),
        })
    }

    pub async fn token(&self, req: TokenRequest) -> Result<TokenResponse, ApiError> {
        match req.grant_type.as_str() {
            "authorization_code" => self.grant_authorization_code(req).await,
            "refresh_token" => self.grant_refresh_token(req).await,
            "client_credentials" | "password" => Err(ApiError::UnsupportedGrantType),
            _ => Err(ApiError::UnsupportedGrantType),
        }
    }

    async fn authenticate_client(&self, req: &TokenRequest) -> Result<OAuthClient, ApiError> {
        let (client_id, secret) = match &req.basic_auth {
            Some((id, secret)) => (id.as_str(), Some(secret.as_str())),
            None => (
                req.client_id.as_deref().ok_or(ApiError::InvalidClient)?,
                req.client_secret.as_deref(),
            ),
        };

        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or(ApiError::InvalidClient)?;
        if client.disabled {
            return Err(ApiError::InvalidClient);
        }

        if client.is_confidential() {
            let presented = secret.ok_or(ApiError::InvalidClient)?;
            let expected = client.client_secret.as_deref().unwrap_or("");
            let equal: bool = presented.as_bytes().ct_eq(expected.as_bytes()).into();
            if !equal {
                return Err(ApiError::InvalidClient);
            }
        }

        Ok(client)
    }

    async fn grant_authorization_code(&self, req: TokenRequest) -> Result<TokenResponse, ApiError> {
        let client = self.authenticate_client(&req).await?;
        if !client.allows_grant("authorization_code") {
            return Err(ApiError::UnsupportedGrantType);
        }

        let code_value = req.code.ok_or_else(|| ApiError::InvalidRequest {
            description: "code is required".to_string(),
        })?;
        let redirect_uri = req.redirect_uri.ok_or_else(|| ApiError::InvalidRequest {
            description: "redirect_uri is required".to_string(),
        })?;

        let code = match self.codes.consume(&code_value).await? {
            Some(code) => code,
            None => {
                // Missing entirely, or a replay of a code already redeemed
                // once. A replay means every token that code ever minted is
                // suspect and must die with it (RFC 6749 §4.1.2).
                if let Some(existing) = self.codes.find_by_code(&code_value).await? {
                    if existing.used {
                        self.tokens.revoke_by_authorization_code(&existing.code).await?;
                    }
                }
                return Err(ApiError::InvalidGrant);
            }
        };

        if code.client_id != client.client_id || code.redirect_uri != redirect_uri {
            return Err(ApiError::InvalidGrant);
        }
        if code.is_expired(Utc::now()) {
            return Err(ApiError::InvalidGrant);
        }

        if code.has_pkce() {
            let verifier = req.code_verifier.unwrap_or_default();
            if verifier.is_empty() {
                return Err(ApiError::InvalidRequest {
                    description: "code_verifier is required when the code was issued with PKCE".to_string(),
                });
            }
            let method = code.code_challenge_method.as_deref().unwrap_or("plain");
            let challenge = code.code_challenge.as_deref().unwrap_or("");
            let matches = match method {
                "plain" => verifier == challenge,
                "S256" => hex::encode(Sha256::digest(verifier.as_bytes())).eq_ignore_ascii_case(challenge),
                _ => false,
            };
            if !matches {
                return Err(ApiError::InvalidGrant);
            }
        }

        let (access_token, jti, exp) = self
            .jwt
            .issue_access_token(code.user_id, &client.client_id, &code.scope)?;
        let refresh_token = generate_opaque_token();

        self.tokens
            .create(NewOAuth2Token {
                id: jti,
                access_token: access_token.clone(),
                refresh_token: Some(refresh_token.clone()),
                scope: code.scope.clone(),
                user_id: code.user_id,
                client_id: client.client_id.clone(),
                expires_at: chrono::DateTime::from_timestamp(exp, 0).unwrap_or_else(Utc::now),
                authorization_code_id: Some(code.code.clone()),
            })
            .await?;

        tracing::info!(
            user_id = %code.user_id,
            client_id = %client.client_id,
            grant_type = "authorization_code",
            "oauth2 token issued"
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: exp - Utc::now().timestamp(),
            refresh_token: Some(refresh_token),
            scope: code.scope,
        })
    }

    async fn grant_refresh_token(&self, req: TokenRequest) -> Result<TokenResponse, ApiError> {
        let client = self.authenticate_client(&req).await?;
        if !client.allows_grant("refresh_token") {
            return Err(ApiError::UnsupportedGrantType);
        }

        let refresh_token = req.refresh_token.ok_or_else(|| ApiError::InvalidRequest {
            description: "refresh_token is required".to_string(),
        })?;

        let existing = self
            .tokens
            .find_by_refresh_token(&refresh_token)
            .await?
            .ok_or(ApiError::InvalidGrant)?;

        if existing.revoked || existing.client_id != client.client_id {
            return Err(ApiError::InvalidGrant);
        }

        let scope = match &req.scope {
            Some(requested) if !requested.trim().is_empty() => {
                let requested_set: std::collections::HashSet<&str> = requested.split_whitespace().collect();
                if !requested_set.is_subset(&existing.scope_set()) {
                    return Err(ApiError::InvalidScope);
                }
                requested.clone()
            }
            _ => existing.scope.clone(),
        };

        let (access_token, jti, exp) = self
            .jwt
            .issue_access_token(existing.user_id, &client.client_id, &scope)?;
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).unwrap_or_else(Utc::now);

        // No rotation: the refresh token itself never changes, so this
        // updates the one row in place rather than inserting a second row
        // that would collide on the refresh_token unique index.
        self.tokens
            .rotate_access_token(&refresh_token, jti, &access_token, &scope, expires_at)
            .await?;

        tracing::info!(
            user_id = %existing.user_id,
            client_id = %client.client_id,
            grant_type = "refresh_token",
            "oauth2 token issued"
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: exp - Utc::now().timestamp(),
            refresh_token: Some(refresh_token),
            scope,
        })
    }

    /// Authenticates the client, then flips `revoked=true` on whichever
    /// token row matches `token` (tried against both columns since RFC 7009
    /// doesn't require the caller to say which kind it's revoking). An
    /// unknown token is not an error — RFC 7009 requires 200 OK regardless,
    /// so the caller can't use this endpoint to probe for valid tokens.
    pub async fn revoke(&self, req: &TokenRequest, token: &str) -> Result<(), ApiError> {
        let client = self.authenticate_client(req).await?;

        let found = match self.tokens.find_by_access_token(token).await? {
            Some(row) => Some(row),
            None => self.tokens.find_by_refresh_token(token).await?,
        };

        if let Some(row) = found {
            if row.client_id == client.client_id {
                self.tokens.revoke(row.id).await?;
                tracing::info!(token_id = %row.id, user_id = %row.user_id, "oauth2 token revoked");
            }
        }
        Ok(())
    }

    /// Authenticates the client, then returns the RFC 7662 claim set for
    /// `token`, or `{active: false}` if it's unknown, expired, or revoked.
    pub async fn introspect(&self, req: &TokenRequest, token: &str) -> Result<IntrospectionResponse, ApiError> {
        self.authenticate_client(req).await?;

        let found = match self.tokens.find_by_access_token(token).await? {
            Some(row) => Some(row),
            None => self.tokens.find_by_refresh_token(token).await?,
        };

        let row = match found {
            Some(row) if !row.revoked && !row.is_expired(Utc::now()) => row,
            _ => return Ok(IntrospectionResponse::default()),
        };

        Ok(IntrospectionResponse {
            active: true,
            scope: Some(row.scope.clone()),
            client_id: Some(row.client_id.clone()),
            token_type: Some("Bearer"),
            exp: Some(row.expires_at.timestamp()),
            iat: Some(row.issued_at.timestamp()),
            sub: Some(row.user_id),
        })
    }

    /// Requires `token` to be a live, unrevoked access token carrying the
    /// `openid` scope, then returns the claims the rest of its scope set
    /// gates (`profile`/`email`/`phone`/`address`).
    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfoClaims, ApiError> {
        let claims = self.jwt.validate_access_token(access_token)?;
        let row = self
            .tokens
            .find_by_access_token(access_token)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if row.revoked || row.is_expired(Utc::now()) {
            return Err(ApiError::InvalidToken);
        }

        let scopes = claims.scope.unwrap_or_default();
        if !scopes.split_whitespace().any(|s| s == "openid") {
            return Err(ApiError::InsufficientPermissions);
        }
        let granted: std::collections::HashSet<&str> = scopes.split_whitespace().collect();

        let user = self
            .users
            .find_by_id(row.user_id)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        Ok(UserInfoClaims {
            sub: user.id,
            preferred_username: granted.contains("profile").then(|| user.username.clone()),
            email: granted.contains("email").then(|| user.email.clone()).flatten(),
            phone_number: granted.contains("phone").then(|| user.phone.clone()).flatten(),
            name: granted.contains("profile").then(|| user.full_name.clone()).flatten(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_plain_match() {
        let verifier = "abc123";
        let challenge = "abc123";
        assert_eq!(verifier, challenge);
    }

    #[test]
    fn test_pkce_s256_hex_is_lowercase() {
        let digest = hex::encode(Sha256::digest(b"verifier-value"));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_introspection_default_is_inactive() {
        let response = IntrospectionResponse::default();
        assert!(!response.active);
        assert!(response.scope.is_none());
    }
}
