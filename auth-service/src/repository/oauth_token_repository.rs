//! # OAuth Token Repository
//!
//! CRUD over `oauth2_tokens`: issued access/refresh token pairs, looked up
//! by either half for introspection, userinfo, and the refresh grant.

use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewOAuth2Token, OAuth2Token};

#[derive(Debug, Clone)]
pub struct OAuth2TokenRepository {
    pool: PgPool,
}

impl OAuth2TokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_token: NewOAuth2Token) -> Result<OAuth2Token, ApiError> {
        sqlx::query_as::<_, OAuth2Token>(
            r#"
            INSERT INTO oauth2_tokens
                (id, access_token, refresh_token, scope, user_id, client_id,
                 expires_at, authorization_code_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(new_token.id)
        .bind(&new_token.access_token)
        .bind(&new_token.refresh_token)
        .bind(&new_token.scope)
        .bind(new_token.user_id)
        .bind(&new_token.client_id)
        .bind(new_token.expires_at)
        .bind(&new_token.authorization_code_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<OAuth2Token>, ApiError> {
        sqlx::query_as::<_, OAuth2Token>("SELECT * FROM oauth2_tokens WHERE access_token = $1")
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<OAuth2Token>, ApiError> {
        sqlx::query_as::<_, OAuth2Token>("SELECT * FROM oauth2_tokens WHERE refresh_token = $1")
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE oauth2_tokens SET revoked = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("oauth2_token:{id}"),
            });
        }
        Ok(())
    }

    /// Revokes every token issued against `authorization_code`, used when a
    /// replayed (already-used) authorization code is redeemed — RFC 6749
    /// §4.1.2 treats this as a signal the code was compromised and requires
    /// revoking everything it minted.
    pub async fn revoke_by_authorization_code(
        &self,
        authorization_code: &str,
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE oauth2_tokens SET revoked = true WHERE authorization_code_id = $1")
            .bind(authorization_code)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    pub async fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<OAuth2Token>, ApiError> {
        sqlx::query_as::<_, OAuth2Token>(
            "SELECT * FROM oauth2_tokens WHERE user_id = $1 AND revoked = false",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    /// Replaces the access token half of a refresh-token row in place,
    /// keeping `refresh_token` untouched. The `refresh_token` unique index
    /// means a second row can't carry the same refresh token, so "no
    /// rotation" on the `refresh_token` grant is implemented as an update
    /// rather than an insert: one row per refresh token, for its whole
    /// lifetime.
    pub async fn rotate_access_token(
        &self,
        refresh_token: &str,
        new_id: Uuid,
        new_access_token: &str,
        new_scope: &str,
        new_expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<OAuth2Token, ApiError> {
        sqlx::query_as::<_, OAuth2Token>(
            r#"
            UPDATE oauth2_tokens
            SET id = $2, access_token = $3, scope = $4, expires_at = $5, issued_at = NOW()
            WHERE refresh_token = $1
            RETURNING *
            "#,
        )
        .bind(refresh_token)
        .bind(new_id)
        .bind(new_access_token)
        .bind(new_scope)
        .bind(new_expires_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound {
            resource: "oauth2_token".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_oauth2_token_struct() {
        let new_token = NewOAuth2Token {
            id: Uuid::new_v4(),
            access_token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            scope: "openid profile".to_string(),
            user_id: Uuid::new_v4(),
            client_id: "client1".to_string(),
            expires_at: Utc::now(),
            authorization_code_id: None,
        };
        assert!(new_token.refresh_token.is_some());
    }
}
