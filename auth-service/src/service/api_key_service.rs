//! # API Key Service
//!
//! Issues, lists, and revokes API keys. Hashing and prefix derivation are
//! `shared::auth::api_key`'s job; this service only decides which resource
//! a key is scoped to and persists the result.

use std::sync::Arc;

use shared::auth::api_key;
use shared::errors::ApiError;
use uuid::Uuid;

use crate::domain::{ApiKey, NewApiKey};
use crate::repository::{ApiKeyRepository, Cursor, Order};

#[derive(Clone)]
pub struct ApiKeyService {
    api_keys: Arc<ApiKeyRepository>,
}

/// An API key's plaintext is only ever available at creation time.
pub struct CreatedApiKey {
    pub record: ApiKey,
    pub plaintext: String,
}

impl ApiKeyService {
    pub fn new(api_keys: Arc<ApiKeyRepository>) -> Self {
        Self { api_keys }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        decorator: &str,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<CreatedApiKey, ApiError> {
        let generated = api_key::generate(decorator);
        let record = self
            .api_keys
            .create(NewApiKey {
                user_id,
                resource_id,
                prefix: generated.prefix,
                salt: generated.salt,
                hashed_key: generated.hashed_key,
                decorator: decorator.to_string(),
                expires_at,
            })
            .await?;
        Ok(CreatedApiKey {
            record,
            plaintext: generated.plaintext,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<ApiKey, ApiError> {
        self.api_keys
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("api_key:{id}"),
            })
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
        order: Order,
    ) -> Result<(Vec<ApiKey>, bool), ApiError> {
        self.api_keys.list_for_user(user_id, cursor, limit, order).await
    }

    pub async fn revoke(&self, id: Uuid) -> Result<(), ApiError> {
        self.api_keys.revoke(id).await
    }
}
