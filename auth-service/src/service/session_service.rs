//! # Session Orchestrator
//!
//! Password login, logout, and the console session this service keeps on
//! a user's behalf so a browser client doesn't have to hold raw tokens.
//! Wraps [`JwtService`] for minting and [`RevocationSet`] for blacklisting
//! and brute-force protection.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use shared::auth::{JwtService, PasswordHasher};
use shared::errors::ApiError;
use shared::revocation::RevocationSet;
use uuid::Uuid;

use crate::domain::{NewSession, Session, User};
use crate::repository::{SessionRepository, UserRepository};

/// Failed attempts at one identifier before it's locked out.
const MAX_FAILED_LOGIN_ATTEMPTS: i64 = 5;
/// How long a lockout lasts once triggered.
const LOCKOUT_MINUTES: i64 = 15;
/// Console sessions (cookie-backed token pairs) live this long before the
/// cookie itself must be refreshed via a new login.
const SESSION_TTL: chrono::Duration = chrono::Duration::days(7);

#[derive(Clone)]
pub struct SessionService {
    users: Arc<UserRepository>,
    sessions: Arc<SessionRepository>,
    jwt: Arc<JwtService>,
    revocation: Arc<dyn RevocationSet>,
    password_hasher: Arc<PasswordHasher>,
}

pub struct LoginResult {
    pub user: User,
    pub session: Session,
}

impl SessionService {
    pub fn new(
        users: Arc<UserRepository>,
        sessions: Arc<SessionRepository>,
        jwt: Arc<JwtService>,
        revocation: Arc<dyn RevocationSet>,
        password_hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            users,
            sessions,
            jwt,
            revocation,
            password_hasher,
        }
    }

    /// Authenticates `identifier`/`password`, mints a console session, and
    /// returns it. Tracks failed attempts per identifier regardless of
    /// whether the account exists, so an attacker can't use the lockout
    /// response to enumerate valid usernames.
    pub async fn login(&self, identifier: &str, password: &str, client_id: &str) -> Result<LoginResult, ApiError> {
        let failed = self.revocation.get_failed_login_count(identifier).await?;
        if failed >= MAX_FAILED_LOGIN_ATTEMPTS {
            return Err(ApiError::AccountLocked {
                until: Utc::now() + chrono::Duration::minutes(LOCKOUT_MINUTES),
            });
        }

        let user = match self.users.find_by_identifier(identifier).await? {
            Some(user) => user,
            None => {
                self.revocation.increment_failed_login(identifier).await?;
                return Err(ApiError::InvalidCredentials);
            }
        };

        if user.disabled {
            return Err(ApiError::InvalidCredentials);
        }

        if !self.password_hasher.verify(password, &user.hashed_password)? {
            self.revocation.increment_failed_login(identifier).await?;
            return Err(ApiError::InvalidCredentials);
        }
        self.revocation.reset_failed_login(identifier).await?;

        let (access_token, _jti, _exp) = self.jwt.issue_access_token(user.id, client_id, "api")?;
        let refresh_token = generate_opaque_token();
        let expires_at = Utc::now() + SESSION_TTL;

        let session = self
            .sessions
            .create(NewSession {
                cookie_value: generate_opaque_token(),
                user_id: user.id,
                access_token,
                refresh_token,
                expires_at,
            })
            .await?;

        Ok(LoginResult { user, session })
    }

    /// Resolves a console cookie to its current session, rejecting an
    /// expired one the same way an absent one is rejected.
    pub async fn resolve_cookie(&self, cookie_value: &str) -> Result<Session, ApiError> {
        let session = self
            .sessions
            .find_by_cookie(cookie_value)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: "session".to_string(),
            })?;
        if session.expires_at <= Utc::now() {
            return Err(ApiError::Expired {
                kind: "session".to_string(),
            });
        }
        Ok(session)
    }

    /// Ends one session: blacklists its access token's `jti` for the
    /// remainder of its lifetime and deletes the cookie-to-token mapping.
    pub async fn logout(&self, cookie_value: &str) -> Result<(), ApiError> {
        let session = self.resolve_cookie(cookie_value).await?;
        self.blacklist_access_token(&session.access_token).await?;
        self.sessions.delete(cookie_value).await
    }

    /// Ends every session for a user — "log out everywhere".
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.revocation.revoke_all_refresh_tokens(&user_id.to_string()).await?;
        self.sessions.delete_all_for_user(user_id).await
    }

    async fn blacklist_access_token(&self, access_token: &str) -> Result<(), ApiError> {
        let claims = self.jwt.decode_token(access_token)?;
        let remaining = (claims.exp - Utc::now().timestamp()).max(0) as u64;
        self.revocation
            .blacklist_token(&claims.jti.to_string(), StdDuration::from_secs(remaining))
            .await
    }
}

/// A random opaque token (256 bits, URL-safe base64), used for both the
/// console cookie value and refresh tokens — neither needs to be a JWT
/// since they're only ever looked up by exact match, never decoded.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_opaque_token_is_unique_and_nonempty() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
