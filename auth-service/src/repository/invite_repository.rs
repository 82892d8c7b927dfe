//! # Invite Repository
//!
//! CRUD over `invites`. Acceptance is a multi-table write (membership +
//! baseline role assignment + invite deletion); this repository only
//! provides the building blocks, the orchestrator wraps them in one
//! `sqlx::Transaction` so a partial failure leaves the invite intact.

use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use super::map_unique_violation;
use crate::domain::{Invite, NewInvite};

#[derive(Debug, Clone)]
pub struct InviteRepository {
    pool: PgPool,
}

impl InviteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_invite: NewInvite) -> Result<Invite, ApiError> {
        sqlx::query_as::<_, Invite>(
            r#"
            INSERT INTO invites
                (resource_id, email, invited_by, temporary_token, expires_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_invite.resource_id)
        .bind(&new_invite.email)
        .bind(new_invite.invited_by)
        .bind(&new_invite.temporary_token)
        .bind(new_invite.expires_at)
        .bind(&new_invite.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "idx_invites_email_resource", "invite"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Invite>, ApiError> {
        sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_token(&self, temporary_token: &str) -> Result<Option<Invite>, ApiError> {
        sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE temporary_token = $1")
            .bind(temporary_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)
    }

    pub async fn find_by_email_and_resource(
        &self,
        email: &str,
        resource_id: Uuid,
    ) -> Result<Option<Invite>, ApiError> {
        sqlx::query_as::<_, Invite>(
            "SELECT * FROM invites WHERE email = $1 AND resource_id = $2",
        )
        .bind(email)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::DatabaseError)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound {
                resource: format!("invite:{id}"),
            });
        }
        Ok(())
    }

    /// Deletes an invite within an already-open transaction, used by the
    /// orchestrator's atomic accept path.
    pub async fn delete_in_transaction(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(ApiError::DatabaseError)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_new_invite_struct() {
        let new_invite = NewInvite {
            resource_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            invited_by: Uuid::new_v4(),
            temporary_token: "tok".to_string(),
            expires_at: Utc::now(),
            metadata: serde_json::json!({}),
        };
        assert_eq!(new_invite.email, "a@example.com");
    }
}
