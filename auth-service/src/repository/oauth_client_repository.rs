//! # OAuth Client Repository
//!
//! CRUD over `oauth_clients`. `client_id` is the lookup key the `/oauth2/*`
//! endpoints use on every request; `id` only matters for administrative
//! listing and updates.

use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{map_unique_violation, Cursor, Order};
use crate::domain::{NewOAuthClient, OAuthClient};

#[derive(Debug, Clone)]
pub struct OAuthClientRepository {
    pool: PgPool,
}

impl OAuthClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_client: NewOAuthClient) -> Result<OAuthClient, ApiError> {
        sqlx::query_as::<_, OAuthClient>(
            r#"
            INSERT INTO oauth_clients
                (client_id, client_secret, client_type, name, redirect_uris,
                 allowed_scopes, allowed_grant_types, project_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&new_client.client_id)
        .bind(&new_client.client_secret)
        .bind(new_client.client_type.as_str())
        .bind(&new_client.name)
        .bind(&new_client.redirect_uris)
        .bind(&new_client.allowed_scopes)
        .bind(&new_client.allowed_grant_types)
        .bind(new_client.project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_oauth_clients_client_id", "oauth_client"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OAuthClient>, ApiError> {
        sqlx::query_as::<_, OAuthClient>("SELECT * FROM oauth_clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuthClient>, ApiError> {
        sqlx::query_as::<_, OAuthClient>("SELECT * FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn list(
        &self,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<OAuthClient>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, OAuthClient>(
                    r#"SELECT * FROM oauth_clients
                       WHERE (created_at, id) < ($1, $2)
                       ORDER BY created_at DESC, id DESC LIMIT $3"#,
                )
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Desc, None) => {
                sqlx::query_as::<_, OAuthClient>(
                    "SELECT * FROM oauth_clients ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, OAuthClient>(
                    r#"SELECT * FROM oauth_clients
                       WHERE (created_at, id) > ($1, $2)
                       ORDER BY created_at ASC, id ASC LIMIT $3"#,
                )
                .bind(c.created_at)
                .bind(c.id)
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, None) => {
                sqlx::query_as::<_, OAuthClient>(
                    "SELECT * FROM oauth_clients ORDER BY created_at ASC, id ASC LIMIT $1",
                )
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

    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE oauth_clients SET disabled = $1 WHERE id = $2")
            .bind(disabled)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("oauth_client:{id}"),
            });
        }
        Ok(())
    }

    pub fn timestamp_cursor(client: &OAuthClient) -> Cursor {
        Cursor {
            created_at: client.created_at,
            id: client.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClientType;

    #[test]
    fn test_new_oauth_client_defaults_to_public() {
        let new_client = NewOAuthClient {
            client_id: "abc123".to_string(),
            client_secret: None,
            client_type: ClientType::Public,
            name: "CLI".to_string(),
            redirect_uris: vec![],
            allowed_scopes: vec!["openid".to_string()],
            allowed_grant_types: vec!["authorization_code".to_string()],
            project_id: None,
        };
        assert_eq!(new_client.client_type.as_str(), "public");
    }
}
