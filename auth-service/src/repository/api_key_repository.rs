//! # API Key Repository
//!
//! CRUD over `api_keys`, plus the [`PrincipalApiKeyStore`] implementation
//! the bearer-credential resolver uses to narrow a presented key down to
//! the handful of rows sharing its 8-character prefix before verifying the
//! PBKDF2 hash against each candidate.

use async_trait::async_trait;
use shared::auth::{ApiKeyCandidate, PrincipalApiKeyStore};
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Cursor, Order};
use crate::domain::{ApiKey, NewApiKey};

#[derive(Debug, Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, ApiError> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys
                (user_id, resource_id, prefix, salt, hashed_key, decorator, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(new_key.user_id)
        .bind(new_key.resource_id)
        .bind(&new_key.prefix)
        .bind(&new_key.salt)
        .bind(&new_key.hashed_key)
        .bind(&new_key.decorator)
        .bind(new_key.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ApiKey>, ApiError> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<ApiKey>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, ApiKey>(
                    r#"SELECT * FROM api_keys
                       WHERE user_id = $1 AND (created_at, id) < ($2, $3)
                       ORDER BY created_at DESC, id DESC LIMIT $4"#,
                )
                .bind(user_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Desc, None) => {
                sqlx::query_as::<_, ApiKey>(
                    r#"SELECT * FROM api_keys WHERE user_id = $1
                       ORDER BY created_at DESC, id DESC LIMIT $2"#,
                )
                .bind(user_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, ApiKey>(
                    r#"SELECT * FROM api_keys
                       WHERE user_id = $1 AND (created_at, id) > ($2, $3)
                       ORDER BY created_at ASC, id ASC LIMIT $4"#,
                )
                .bind(user_id)
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, None) => {
                sqlx::query_as::<_, ApiKey>(
                    r#"SELECT * FROM api_keys WHERE user_id = $1
                       ORDER BY created_at ASC, id ASC LIMIT $2"#,
                )
                .bind(user_id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(ApiError::DatabaseError)?;

        let has_more = rows.len() as i64 > limit;
        let mut rows = rows;
        rows.truncate(limit as usize);
        Ok((rows, has_more))
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE api_keys SET disabled = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("api_key:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(key: &ApiKey) -> Cursor {
        Cursor {
            created_at: key.created_at,
            id: key.id,
        }
    }
}

#[async_trait]
impl PrincipalApiKeyStore for ApiKeyRepository {
    async fn candidates_by_prefix(&self, prefix: &str) -> Result<Vec<ApiKeyCandidate>, ApiError> {
        let rows = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE prefix = $1")
            .bind(prefix)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        Ok(rows
            .into_iter()
            .map(|key| ApiKeyCandidate {
                key_id: key.id,
                user_id: key.user_id,
                resource_id: key.resource_id,
                salt: key.salt,
                hashed_key: key.hashed_key,
                disabled: key.disabled,
                expires_at: key.expires_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_api_key_struct() {
        let new_key = NewApiKey {
            user_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            prefix: "abcd1234".to_string(),
            salt: vec![1, 2, 3],
            hashed_key: vec![4, 5, 6],
            decorator: "prod".to_string(),
            expires_at: None,
        };
        assert_eq!(new_key.prefix.len(), 8);
    }
}
