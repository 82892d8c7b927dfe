//! # Revocation Set
//!
//! Abstracts the storage backing token blacklisting, refresh-token tracking
//! and failed-login counters behind one trait, so the rest of the crate
//! doesn't care whether `CACHE_URL` was configured.
//!
//! When it is, [`RedisClient`] backs the set. When it isn't, we fall back to
//! an in-process, TTL-swept store so the service still starts and behaves
//! correctly on a single node (tests, local dev, small deployments).
//!
//! ## Key naming convention
//!
//! Both backends use the same key shape, inherited from the Redis client:
//!
//! | Pattern | Purpose |
//! |---------|---------|
//! | `blacklist:token:{jti}` | Invalidated JWTs |
//! | `refresh:{user_id}:{token_id}` | Refresh tokens |
//! | `failed_login:{identifier}` | Brute force protection |

use crate::config::CacheConfig;
use crate::errors::ApiError;
use crate::redis_client::RedisClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Storage for token blacklisting, refresh-token tracking and failed-login
/// counters. Implemented by [`RedisClient`] and [`InMemoryRevocationSet`].
#[async_trait]
pub trait RevocationSet: Send + Sync {
    async fn blacklist_token(&self, jti: &str, ttl: Duration) -> Result<(), ApiError>;
    async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, ApiError>;
    async fn store_refresh_token(
        &self,
        user_id: &str,
        token_id: &str,
        ttl: Duration,
    ) -> Result<(), ApiError>;
    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<(), ApiError>;
    async fn increment_failed_login(&self, identifier: &str) -> Result<i64, ApiError>;
    async fn get_failed_login_count(&self, identifier: &str) -> Result<i64, ApiError>;
    async fn reset_failed_login(&self, identifier: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl RevocationSet for RedisClient {
    async fn blacklist_token(&self, jti: &str, ttl: Duration) -> Result<(), ApiError> {
        RedisClient::blacklist_token(self, jti, ttl).await
    }

    async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, ApiError> {
        RedisClient::is_token_blacklisted(self, jti).await
    }

    async fn store_refresh_token(
        &self,
        user_id: &str,
        token_id: &str,
        ttl: Duration,
    ) -> Result<(), ApiError> {
        RedisClient::store_refresh_token(self, user_id, token_id, ttl).await
    }

    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<(), ApiError> {
        RedisClient::revoke_all_refresh_tokens(self, user_id).await
    }

    async fn increment_failed_login(&self, identifier: &str) -> Result<i64, ApiError> {
        RedisClient::increment_failed_login(self, identifier).await
    }

    async fn get_failed_login_count(&self, identifier: &str) -> Result<i64, ApiError> {
        RedisClient::get_failed_login_count(self, identifier).await
    }

    async fn reset_failed_login(&self, identifier: &str) -> Result<(), ApiError> {
        RedisClient::reset_failed_login(self, identifier).await
    }
}

/// Single-process fallback used when `CACHE_URL` is not configured.
///
/// Expired entries are swept lazily on access rather than via a background
/// task, which keeps this safe to use from tests without a runtime timer.
#[derive(Default)]
pub struct InMemoryRevocationSet {
    blacklist: Mutex<HashMap<String, Instant>>,
    refresh_tokens: Mutex<HashMap<String, Instant>>,
    failed_logins: Mutex<HashMap<String, (i64, Instant)>>,
}

impl InMemoryRevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(map: &mut HashMap<String, Instant>) {
        let now = Instant::now();
        map.retain(|_, expires_at| *expires_at > now);
    }
}

#[async_trait]
impl RevocationSet for InMemoryRevocationSet {
    async fn blacklist_token(&self, jti: &str, ttl: Duration) -> Result<(), ApiError> {
        let mut map = self.blacklist.lock().expect("revocation set lock poisoned");
        Self::sweep(&mut map);
        map.insert(jti.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn is_token_blacklisted(&self, jti: &str) -> Result<bool, ApiError> {
        let mut map = self.blacklist.lock().expect("revocation set lock poisoned");
        Self::sweep(&mut map);
        Ok(map.contains_key(jti))
    }

    async fn store_refresh_token(
        &self,
        user_id: &str,
        token_id: &str,
        ttl: Duration,
    ) -> Result<(), ApiError> {
        let mut map = self
            .refresh_tokens
            .lock()
            .expect("revocation set lock poisoned");
        Self::sweep(&mut map);
        map.insert(format!("{user_id}:{token_id}"), Instant::now() + ttl);
        Ok(())
    }

    async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<(), ApiError> {
        let mut map = self
            .refresh_tokens
            .lock()
            .expect("revocation set lock poisoned");
        let prefix = format!("{user_id}:");
        map.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn increment_failed_login(&self, identifier: &str) -> Result<i64, ApiError> {
        let mut map = self
            .failed_logins
            .lock()
            .expect("revocation set lock poisoned");
        let now = Instant::now();
        let entry = map.entry(identifier.to_string()).or_insert((0, now + Duration::from_secs(15 * 60)));
        if entry.1 <= now {
            *entry = (0, now + Duration::from_secs(15 * 60));
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn get_failed_login_count(&self, identifier: &str) -> Result<i64, ApiError> {
        let map = self
            .failed_logins
            .lock()
            .expect("revocation set lock poisoned");
        Ok(map
            .get(identifier)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(count, _)| *count)
            .unwrap_or(0))
    }

    async fn reset_failed_login(&self, identifier: &str) -> Result<(), ApiError> {
        let mut map = self
            .failed_logins
            .lock()
            .expect("revocation set lock poisoned");
        map.remove(identifier);
        Ok(())
    }
}

/// Builds the configured [`RevocationSet`] backend.
///
/// `Some(cache)` connects to Redis via [`RedisClient`]; `None` selects
/// [`InMemoryRevocationSet`] so the service still boots without an external
/// cache (see Open Question 2 in `DESIGN.md`).
pub async fn build_revocation_set(
    cache: &Option<CacheConfig>,
) -> Result<std::sync::Arc<dyn RevocationSet>, ApiError> {
    match cache {
        Some(cache) => {
            let client = RedisClient::new(cache).await?;
            Ok(std::sync::Arc::new(client))
        }
        None => {
            info!("CACHE_URL not set, using in-process revocation set");
            Ok(std::sync::Arc::new(InMemoryRevocationSet::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blacklist_round_trip() {
        let set = InMemoryRevocationSet::new();
        assert!(!set.is_token_blacklisted("abc").await.unwrap());
        set.blacklist_token("abc", Duration::from_secs(60)).await.unwrap();
        assert!(set.is_token_blacklisted("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_all_refresh_tokens_scoped_to_user() {
        let set = InMemoryRevocationSet::new();
        set.store_refresh_token("user-1", "tok-a", Duration::from_secs(60))
            .await
            .unwrap();
        set.store_refresh_token("user-2", "tok-b", Duration::from_secs(60))
            .await
            .unwrap();
        set.revoke_all_refresh_tokens("user-1").await.unwrap();

        let map = set.refresh_tokens.lock().unwrap();
        assert!(!map.contains_key("user-1:tok-a"));
        assert!(map.contains_key("user-2:tok-b"));
    }

    #[tokio::test]
    async fn test_failed_login_counter_increments_and_resets() {
        let set = InMemoryRevocationSet::new();
        assert_eq!(set.increment_failed_login("u@example.com").await.unwrap(), 1);
        assert_eq!(set.increment_failed_login("u@example.com").await.unwrap(), 2);
        set.reset_failed_login("u@example.com").await.unwrap();
        assert_eq!(set.get_failed_login_count("u@example.com").await.unwrap(), 0);
    }
}
