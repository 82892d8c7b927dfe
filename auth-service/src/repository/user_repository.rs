//! # User Repository
//!
//! CRUD over the `users` table plus the [`PrincipalUserStore`] implementation
//! principal resolution uses to decide whether a JWT's `sub` or a session's
//! pinned user is still a usable principal.

use async_trait::async_trait;
use shared::auth::middleware::PrincipalUserStore;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Cursor, Order};
use crate::domain::{NewUser, User};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, phone, hashed_password, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.phone)
        .bind(&new_user.hashed_password)
        .bind(&new_user.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("idx_users_username") {
                    return ApiError::Conflict {
                        resource: "username".to_string(),
                    };
                }
                if db_err.constraint() == Some("idx_users_email") {
                    return ApiError::Conflict {
                        resource: "email".to_string(),
                    };
                }
            }
            ApiError::DatabaseError(e)
        })
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    /// Login identifier lookup heuristic: `@` in the identifier means
    /// email, otherwise username.
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, ApiError> {
        if identifier.contains('@') {
            self.find_by_email(identifier).await
        } else {
            self.find_by_username(identifier).await
        }
    }

    pub async fn list(
        &self,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<User>, bool), ApiError> {
        let fetch_limit = limit + 1;
        let rows = match (order, cursor) {
            (Order::Desc, Some(c)) => {
                sqlx::query_as::<_, User>(
                    r#"SELECT * FROM users
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
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT $1",
                )
                .bind(fetch_limit)
                .fetch_all(&self.pool)
                .await
            }
            (Order::Asc, Some(c)) => {
                sqlx::query_as::<_, User>(
                    r#"SELECT * FROM users
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
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users ORDER BY created_at ASC, id ASC LIMIT $1",
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

    pub async fn update_password(
        &self,
        user_id: Uuid,
        new_hashed_password: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE users SET hashed_password = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(new_hashed_password)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("user:{user_id}"),
            });
        }
        Ok(())
    }

    pub async fn set_disabled(&self, user_id: Uuid, disabled: bool) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE users SET disabled = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(disabled)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("user:{user_id}"),
            });
        }
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET full_name = $1, phone = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(full_name)
        .bind(phone)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound {
            resource: format!("user:{user_id}"),
        })
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool, ApiError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::DatabaseError)?;
        Ok(exists)
    }

    pub fn timestamp_cursor(user: &User) -> Cursor {
        Cursor {
            created_at: user.created_at,
            id: user.id,
        }
    }
}

#[async_trait]
impl PrincipalUserStore for UserRepository {
    async fn is_active_user(&self, user_id: Uuid) -> Result<bool, ApiError> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT disabled FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        Ok(row.is_some_and(|(disabled,)| !disabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_struct() {
        let new_user = NewUser {
            username: "grace".to_string(),
            email: Some("grace@example.com".to_string()),
            full_name: None,
            phone: None,
            hashed_password: "$argon2id$...".to_string(),
            metadata: serde_json::json!({}),
        };
        assert_eq!(new_user.username, "grace");
    }

    #[test]
    fn test_identifier_heuristic_picks_email_lookup() {
        assert!("grace@example.com".contains('@'));
        assert!(!"grace".contains('@'));
    }
}
