//! # Session Repository
//!
//! CRUD over `sessions`: server-stored cookie -> token-pair mappings for
//! console clients, plus the [`PrincipalSessionStore`] implementation the
//! bearer/cookie resolver uses to turn a cookie value into a user id.

use async_trait::async_trait;
use chrono::Utc;
use shared::auth::PrincipalSessionStore;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewSession, Session};

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_session: NewSession) -> Result<Session, ApiError> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (cookie_value, user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&new_session.cookie_value)
        .bind(new_session.user_id)
        .bind(&new_session.access_token)
        .bind(&new_session.refresh_token)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_cookie(&self, cookie_value: &str) -> Result<Option<Session>, ApiError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE cookie_value = $1")
            .bind(cookie_value)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    /// Replaces the embedded token pair for a cookie, used after a
    /// refresh-on-behalf-of-the-console-client cycle.
    pub async fn update_tokens(
        &self,
        cookie_value: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<Session, ApiError> {
        sqlx::query_as::<_, Session>(
            r#"
            UPDATE sessions
            SET access_token = $1, refresh_token = $2, expires_at = $3
            WHERE cookie_value = $4
            RETURNING *
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(cookie_value)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound {
            resource: format!("session:{cookie_value}"),
        })
    }

    pub async fn delete(&self, cookie_value: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM sessions WHERE cookie_value = $1")
            .bind(cookie_value)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }
}

#[async_trait]
impl PrincipalSessionStore for SessionRepository {
    async fn resolve_session(&self, cookie_value: &str) -> Result<Option<Uuid>, ApiError> {
        let session = self.find_by_cookie(cookie_value).await?;
        Ok(session
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_struct() {
        let new_session = NewSession {
            cookie_value: "cookie-abc".to_string(),
            user_id: Uuid::new_v4(),
            access_token: "tok".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now(),
        };
        assert_eq!(new_session.cookie_value, "cookie-abc");
    }
}
