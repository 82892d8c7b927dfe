//! # Authorization Code Repository
//!
//! CRUD over `authorization_codes`. The token endpoint's single-use
//! requirement is enforced here, not in the service layer: [`Self::consume`]
//! is a compare-and-swap that only flips `used` if it was still `false`,
//! so two concurrent redemptions of the same code race safely in Postgres
//! rather than both reading `used = false` and both succeeding.

use shared::errors::ApiError;
use sqlx::PgPool;

use crate::domain::{AuthorizationCode, NewAuthorizationCode};

#[derive(Debug, Clone)]
pub struct AuthorizationCodeRepository {
    pool: PgPool,
}

impl AuthorizationCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        new_code: NewAuthorizationCode,
    ) -> Result<AuthorizationCode, ApiError> {
        sqlx::query_as::<_, AuthorizationCode>(
            r#"
            INSERT INTO authorization_codes
                (code, client_id, redirect_uri, scope, user_id, nonce,
                 code_challenge, code_challenge_method, auth_time, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&new_code.code)
        .bind(&new_code.client_id)
        .bind(&new_code.redirect_uri)
        .bind(&new_code.scope)
        .bind(new_code.user_id)
        .bind(&new_code.nonce)
        .bind(&new_code.code_challenge)
        .bind(&new_code.code_challenge_method)
        .bind(new_code.auth_time)
        .bind(new_code.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        sqlx::query_as::<_, AuthorizationCode>(
            "SELECT * FROM authorization_codes WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Atomically marks `code` used and returns the row (now `used = true`).
    /// `Ok(None)` means the code doesn't exist or was already redeemed — the
    /// caller can't distinguish the two, which is intentional: both map to
    /// the same `invalid_grant` response.
    pub async fn consume(&self, code: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        sqlx::query_as::<_, AuthorizationCode>(
            r#"
            UPDATE authorization_codes
            SET used = true
            WHERE code = $1 AND used = false
            RETURNING *
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_authorization_code_carries_pkce_fields() {
        let new_code = NewAuthorizationCode {
            code: "abc".to_string(),
            client_id: "client1".to_string(),
            redirect_uri: "https://example.com/cb".to_string(),
            scope: "openid".to_string(),
            user_id: uuid::Uuid::new_v4(),
            nonce: None,
            code_challenge: Some("deadbeef".to_string()),
            code_challenge_method: Some("S256".to_string()),
            auth_time: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(new_code.code_challenge.is_some());
    }
}
